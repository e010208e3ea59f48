//! Tile index: which archived tiles cover a query polygon.
//!
//! The metadata table is read from its [`VectorSource`] on first use and kept
//! for the lifetime of the index. Resolution works on the query's bounding
//! box: every grid cell it touches must have at least one tile, otherwise the
//! query is not covered and nothing is returned.

use crate::cache::LocalCache;
use crate::geometry::QueryGeometry;
use crate::grid::GridBounds;
use crate::metadata::TileMetadata;
use crate::naming::{lasnamn_to_path, TILE_AUXILIARY};
use crate::source::VectorSource;
use crate::{Result, SkogError};
use geo::MultiPolygon;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Resolves query polygons to tile identifiers and archive paths.
pub struct TileIndex {
    source: Option<Arc<dyn VectorSource>>,
    metadata: Mutex<Option<Arc<TileMetadata>>>,
    mapped_region: Mutex<Option<Arc<MultiPolygon<f64>>>>,
}

impl fmt::Debug for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded = self.metadata.lock().map(|m| m.is_some()).unwrap_or(false);
        f.debug_struct("TileIndex").field("loaded", &loaded).finish()
    }
}

impl TileIndex {
    /// Create an index reading its metadata from `source` on first use.
    pub fn new(source: Arc<dyn VectorSource>) -> Self {
        Self {
            source: Some(source),
            metadata: Mutex::new(None),
            mapped_region: Mutex::new(None),
        }
    }

    /// Create an index over an already loaded table.
    pub fn with_metadata(metadata: TileMetadata) -> Self {
        Self {
            source: None,
            metadata: Mutex::new(Some(Arc::new(metadata))),
            mapped_region: Mutex::new(None),
        }
    }

    /// The metadata table, loading it on first call.
    ///
    /// Concurrent first calls load once; a failed load is retried by the
    /// next call.
    pub fn metadata(&self) -> Result<Arc<TileMetadata>> {
        let mut guard = self.metadata.lock().map_err(|_| SkogError::LockPoisoned)?;
        if let Some(metadata) = guard.as_ref() {
            return Ok(Arc::clone(metadata));
        }

        let source = self
            .source
            .as_ref()
            .ok_or_else(|| SkogError::Config("tile index has no metadata source".to_string()))?;
        let metadata = Arc::new(TileMetadata::from_features(source.open()?)?);
        log::info!("Loaded tile metadata: {} record(s)", metadata.len());

        *guard = Some(Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Tile identifiers covering the query, one per grid cell.
    ///
    /// Returns an empty list unless every cell touched by the query's
    /// bounding box has a tile. Identifiers are ordered by cell key.
    pub fn resolve(&self, query: &QueryGeometry) -> Result<Vec<String>> {
        let bounds = query.bounds()?;
        let grid = GridBounds::from_rect(&bounds);
        let squares: Vec<String> = grid.cells().iter().map(|c| c.key()).collect();

        let metadata = self.metadata()?;
        if let Some(uncovered) = squares.iter().find(|s| !metadata.has_square(s)) {
            log::debug!(
                "Query spans {} cell(s); {} has no tiles",
                squares.len(),
                uncovered
            );
            return Ok(Vec::new());
        }

        let identifiers = metadata.latest_per_square(&squares);
        log::debug!("Resolved {} cell(s) to {:?}", squares.len(), identifiers);
        Ok(identifiers)
    }

    /// Archive paths of the tiles covering the query.
    pub fn filenames(&self, query: &QueryGeometry) -> Result<Vec<String>> {
        self.resolve(query)?
            .iter()
            .map(|id| lasnamn_to_path(id))
            .collect()
    }

    /// Whether every grid cell of the query has a tile.
    pub fn is_fully_covered(&self, query: &QueryGeometry) -> Result<bool> {
        Ok(!self.resolve(query)?.is_empty())
    }

    /// Whether every tile file the query resolves to is cached.
    ///
    /// Never touches the network. An uncovered query resolves to no files
    /// and is therefore available; pair with [`TileIndex::is_fully_covered`].
    pub fn is_available_in_cache(&self, query: &QueryGeometry, cache: &LocalCache) -> Result<bool> {
        let files = self.filenames(query)?;
        Ok(files
            .iter()
            .all(|f| cache.missing(f, &TILE_AUXILIARY).is_empty()))
    }

    /// Tile files (with their `.idx` and `.lrc` siblings) the query needs
    /// that are not cached, in file order.
    pub fn cache_misses(&self, query: &QueryGeometry, cache: &LocalCache) -> Result<Vec<PathBuf>> {
        Ok(self
            .filenames(query)?
            .iter()
            .flat_map(|f| cache.missing(f, &TILE_AUXILIARY))
            .collect())
    }

    /// Union of every tile footprint, computed once.
    pub fn mapped_region(&self) -> Result<Arc<MultiPolygon<f64>>> {
        let mut guard = self
            .mapped_region
            .lock()
            .map_err(|_| SkogError::LockPoisoned)?;
        if let Some(region) = guard.as_ref() {
            return Ok(Arc::clone(region));
        }

        let region = Arc::new(self.metadata()?.union_footprints());
        *guard = Some(Arc::clone(&region));
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Feature;
    use crate::metadata::TileRecord;
    use geo::{coord, Area, Rect};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cell_square(northing: f64, easting: f64) -> MultiPolygon<f64> {
        let rect = Rect::new(
            coord! { x: easting * 100.0, y: northing * 100.0 },
            coord! { x: (easting + 25.0) * 100.0, y: (northing + 25.0) * 100.0 },
        );
        MultiPolygon::new(vec![rect.to_polygon()])
    }

    fn record(square: &str, las_namn: &str, unixday: i64) -> TileRecord {
        let mut parts = square.split('_');
        let northing: f64 = parts.next().unwrap().parse().unwrap();
        let easting: f64 = parts.next().unwrap().parse().unwrap();
        TileRecord {
            square: square.to_string(),
            las_namn: las_namn.to_string(),
            unixday,
            footprint: cell_square(northing, easting),
        }
    }

    fn query(min: (f64, f64), max: (f64, f64)) -> QueryGeometry {
        Rect::new(coord! { x: min.0, y: min.1 }, coord! { x: max.0, y: max.1 }).into()
    }

    #[test]
    fn test_latest_flight_wins() {
        let index = TileIndex::with_metadata(TileMetadata::from_records(vec![
            record("69300_5475_25", "18E031_69300_5475_25", 17_500),
            record("69300_5475_25", "19E031_69300_5475_25", 18_000),
            record("69300_5475_25", "17E031_69300_5475_25", 17_000),
        ]));

        let ids = index.resolve(&query((548_000.0, 6_931_000.0), (549_000.0, 6_932_000.0))).unwrap();
        assert_eq!(ids, vec!["19E031_69300_5475_25"]);
    }

    #[test]
    fn test_equal_days_keep_first_record() {
        let index = TileIndex::with_metadata(TileMetadata::from_records(vec![
            record("69300_5475_25", "19A001_69300_5475_25", 18_000),
            record("69300_5475_25", "19B002_69300_5475_25", 18_000),
        ]));

        let ids = index.resolve(&query((548_000.0, 6_931_000.0), (549_000.0, 6_932_000.0))).unwrap();
        assert_eq!(ids, vec!["19A001_69300_5475_25"]);
    }

    #[test]
    fn test_partial_coverage_is_empty() {
        let index = TileIndex::with_metadata(TileMetadata::from_records(vec![record(
            "69300_5475_25",
            "19E031_69300_5475_25",
            18_000,
        )]));

        // Spills east into 69300_5500_25
        let q = query((549_000.0, 6_931_000.0), (551_000.0, 6_932_000.0));
        assert!(index.resolve(&q).unwrap().is_empty());
        assert!(!index.is_fully_covered(&q).unwrap());
        assert!(index.filenames(&q).unwrap().is_empty());
    }

    #[test]
    fn test_filenames() {
        let index = TileIndex::with_metadata(TileMetadata::from_records(vec![record(
            "69300_5475_25",
            "19E031_69300_5475_25",
            18_000,
        )]));

        let files = index
            .filenames(&query((548_000.0, 6_931_000.0), (549_000.0, 6_932_000.0)))
            .unwrap();
        assert_eq!(
            files,
            vec!["Tradhojd_LaserdataSkog/2019/69_5/THL_19E031_69300_5475_2019.mrf"]
        );
    }

    #[test]
    fn test_feature_without_geometry() {
        let index = TileIndex::with_metadata(TileMetadata::default());
        let err = index.resolve(&Feature::new(None).into()).unwrap_err();
        assert!(matches!(err, SkogError::InvalidGeometry(_)));
    }

    struct CountingSource {
        opens: AtomicUsize,
        features: Vec<Feature>,
    }

    impl VectorSource for CountingSource {
        fn open(&self) -> Result<Vec<Feature>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(self.features.clone())
        }
    }

    #[test]
    fn test_metadata_is_loaded_once() {
        let source = Arc::new(CountingSource {
            opens: AtomicUsize::new(0),
            features: Vec::new(),
        });
        let index = TileIndex::new(source.clone());

        let q = query((548_000.0, 6_931_000.0), (549_000.0, 6_932_000.0));
        index.resolve(&q).unwrap();
        index.resolve(&q).unwrap();
        index.metadata().unwrap();

        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mapped_region() {
        let index = TileIndex::with_metadata(TileMetadata::from_records(vec![
            record("69300_5475_25", "19E031_69300_5475_25", 18_000),
            record("69300_5500_25", "19E031_69300_5500_25", 18_000),
        ]));

        let region = index.mapped_region().unwrap();
        assert!((region.unsigned_area() - 2.0 * 2500.0 * 2500.0).abs() < 1e-3);
        assert!(Arc::ptr_eq(&region, &index.mapped_region().unwrap()));
    }
}
