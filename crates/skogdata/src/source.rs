//! Dataset capabilities and the shapefile loader.
//!
//! A dataset is described by what it can produce: a [`RasterSource`]
//! assembles a raster for a query polygon and a [`VectorSource`] yields
//! features. Loaders compose a [`LocalCache`] rather than inherit from a
//! common base.

use crate::cache::LocalCache;
use crate::geometry::{AttributeValue, Feature, QueryGeometry};
use crate::raster::GeoTransform;
use crate::{Result, SkogError};
use geo::{Geometry, LineString, MultiPolygon, Polygon};
use ndarray::Array2;
use shapefile::dbase::{FieldValue, Record};
use shapefile::PolygonRing;
use std::path::{Path, PathBuf};

/// A dataset that can assemble raster data for a polygon.
pub trait RasterSource: Send + Sync {
    /// Pixels and geotransform covering the query's bounding box expanded
    /// by `padding` metres.
    fn fetch(&self, query: &QueryGeometry, padding: f64) -> Result<(Array2<f32>, GeoTransform)>;
}

/// A dataset of vector features.
pub trait VectorSource: Send + Sync {
    /// Read every feature.
    fn open(&self) -> Result<Vec<Feature>>;
}

/// A shapefile stored in the archive, read through the local cache.
#[derive(Debug, Clone)]
pub struct ShapefileSource {
    relative: PathBuf,
    auxiliary: Vec<String>,
    columns: Vec<String>,
    cache: LocalCache,
}

impl ShapefileSource {
    /// Create a loader for the `.shp` at `relative` with its sibling files.
    pub fn new<P: AsRef<Path>>(relative: P, auxiliary: &[&str], cache: LocalCache) -> Self {
        Self {
            relative: relative.as_ref().to_path_buf(),
            auxiliary: auxiliary.iter().map(|s| s.to_string()).collect(),
            columns: Vec::new(),
            cache,
        }
    }

    /// Attribute columns to read into each feature.
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Archive-relative path of the `.shp` file.
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    /// Local path of the `.shp`, downloading it and its siblings if needed.
    pub fn path(&self) -> Result<PathBuf> {
        let auxiliary: Vec<&str> = self.auxiliary.iter().map(String::as_str).collect();
        self.cache.ensure_present(&self.relative, &auxiliary)
    }
}

impl VectorSource for ShapefileSource {
    fn open(&self) -> Result<Vec<Feature>> {
        let path = self.path()?;
        log::info!("Reading features from {}", path.display());

        let rows = shapefile::read_as::<_, shapefile::Polygon, Record>(&path)?;
        let mut features = Vec::with_capacity(rows.len());

        for (index, (shape, record)) in rows.into_iter().enumerate() {
            let geometry = polygon_to_geo(&shape).map_err(|reason| {
                SkogError::InvalidGeometry(format!("{} feature {index}: {reason}", path.display()))
            })?;

            let mut feature = Feature::new(Some(geometry));
            for column in &self.columns {
                let value = record.get(column).map_or(AttributeValue::Null, to_attribute);
                feature.properties.insert(column.clone(), value);
            }
            features.push(feature);
        }

        log::debug!("Read {} feature(s)", features.len());
        Ok(features)
    }
}

/// Outer rings start a new polygon; inner rings are holes of the last one.
fn polygon_to_geo(shape: &shapefile::Polygon) -> std::result::Result<Geometry<f64>, String> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for ring in shape.rings() {
        let line: LineString<f64> = ring.points().iter().map(|p| (p.x, p.y)).collect();
        match ring {
            PolygonRing::Outer(_) => polygons.push(Polygon::new(line, Vec::new())),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some(polygon) => polygon.interiors_push(line),
                None => return Err("hole before any outer ring".to_string()),
            },
        }
    }

    match polygons.len() {
        0 => Err("polygon without rings".to_string()),
        1 => Ok(Geometry::Polygon(polygons.remove(0))),
        _ => Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

fn to_attribute(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => AttributeValue::Text(s.clone()),
        FieldValue::Numeric(Some(v)) | FieldValue::Double(v) | FieldValue::Currency(v) => {
            AttributeValue::Number(*v)
        }
        FieldValue::Float(Some(v)) => AttributeValue::Number(f64::from(*v)),
        FieldValue::Integer(v) => AttributeValue::Integer(i64::from(*v)),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(*b),
        _ => AttributeValue::Null,
    }
}
