//! Assembling Trädhöjd rasters for a query polygon.

use crate::cache::LocalCache;
use crate::geometry::{pad_rect, QueryGeometry};
use crate::index::TileIndex;
use crate::mosaic::{crop_to_rect, merge};
use crate::naming::TILE_AUXILIARY;
use crate::raster::{open_raster, GeoTransform, Raster};
use crate::source::RasterSource;
use crate::{Result, SkogError};
use ndarray::Array2;
use std::sync::Arc;

/// Default margin around the query's bounding box, in metres.
pub const DEFAULT_PADDING: f64 = 20.0;

/// Tree-height raster source backed by the tile archive.
#[derive(Debug, Clone)]
pub struct TradhojdSource {
    index: Arc<TileIndex>,
    cache: LocalCache,
}

impl TradhojdSource {
    /// Create a source resolving tiles through `index` and reading them
    /// from `cache`.
    pub fn new(index: Arc<TileIndex>, cache: LocalCache) -> Self {
        Self { index, cache }
    }

    /// The tile index.
    pub fn index(&self) -> &Arc<TileIndex> {
        &self.index
    }

    /// The local cache.
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Merged tiles cropped to the query's bounding box plus `padding`.
    ///
    /// Missing tiles are downloaded first in a single batch. Fails with
    /// [`SkogError::NoCoverage`] when any grid cell of the query has no tile.
    pub fn load_raster(&self, query: &QueryGeometry, padding: f64) -> Result<Raster> {
        let envelope = query.envelope()?;
        let bounds = envelope.bounds()?;

        let files = self.index.filenames(&envelope)?;
        if files.is_empty() {
            return Err(SkogError::NoCoverage);
        }

        let local = self.cache.ensure_all_present(&files, &TILE_AUXILIARY)?;
        let tiles = local
            .iter()
            .map(open_raster)
            .collect::<Result<Vec<_>>>()?;
        log::info!("Merging {} tile(s)", tiles.len());

        let mosaic = merge(&tiles)?;

        // Pixels are kept as decoded; the no-data marker is dropped so the
        // mask fills with zero.
        let in_memory = Raster::new(mosaic.data, mosaic.transform).with_crs(mosaic.crs);
        crop_to_rect(&in_memory, &pad_rect(&bounds, padding))
    }

    /// Pixels and geotransform of [`TradhojdSource::load_raster`].
    pub fn load(&self, query: &QueryGeometry, padding: f64) -> Result<(Array2<f32>, GeoTransform)> {
        let raster = self.load_raster(query, padding)?;
        Ok((raster.data, raster.transform))
    }
}

impl RasterSource for TradhojdSource {
    fn fetch(&self, query: &QueryGeometry, padding: f64) -> Result<(Array2<f32>, GeoTransform)> {
        self.load(query, padding)
    }
}
