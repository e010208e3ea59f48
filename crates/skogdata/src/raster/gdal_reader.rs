//! Raster reading through GDAL (MRF tiles and anything else GDAL opens).

use super::{GeoTransform, Raster};
use crate::{Result, SkogError};
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// Read band 1 of any GDAL-readable raster.
pub(crate) fn read_with_gdal(path: &Path) -> Result<Raster> {
    log::debug!("Opening {} with GDAL", path.display());
    let dataset = Dataset::open(path)?;

    let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let (width, height) = dataset.raster_size();

    let band = dataset.rasterband(1)?;
    let nodata = band.no_data_value().map(|v| v as f32);
    let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    let data = Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| SkogError::InvalidGeoTiff(format!("{}: {}", path.display(), e)))?;

    let projection = dataset.projection();
    let crs = if projection.is_empty() {
        None
    } else {
        Some(projection)
    };

    Ok(Raster {
        data,
        transform,
        nodata,
        crs,
    })
}
