//! Shared fixtures: a fake archive on disk and a small tile catalog.

#![allow(dead_code)]

use geo::{coord, MultiPolygon, Rect};
use ndarray::Array2;
use skogdata::{
    lasnamn_to_path, write_geotiff, GeoTransform, QueryGeometry, Raster, RemoteFetcher, Result,
    SkogError, TileMetadata, TileRecord, TILE_AUXILIARY,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tile pixel size in metres.
pub const PIXEL_SIZE: f64 = 50.0;

/// Cell width in metres.
pub const CELL_SIZE: f64 = 2500.0;

/// Serves files from a local directory laid out like the archive and
/// records every batch it is asked for.
pub struct DirectoryFetcher {
    remote: PathBuf,
    pub batches: Mutex<Vec<Vec<PathBuf>>>,
}

impl DirectoryFetcher {
    pub fn new<P: AsRef<Path>>(remote: P) -> Self {
        Self {
            remote: remote.as_ref().to_path_buf(),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl RemoteFetcher for DirectoryFetcher {
    fn fetch(&self, batch: &[PathBuf], cache_root: &Path) -> Result<()> {
        self.batches.lock().unwrap().push(batch.to_vec());
        for path in batch {
            let source = self.remote.join(path);
            if !source.is_file() {
                return Err(SkogError::RemoteNotFound { path: path.clone() });
            }
            let local = cache_root.join(path);
            if let Some(parent) = local.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &local)?;
        }
        Ok(())
    }
}

/// Footprint of the cell with the given key.
pub fn cell_footprint(square: &str) -> Rect<f64> {
    let mut parts = square.split('_');
    let northing: f64 = parts.next().unwrap().parse().unwrap();
    let easting: f64 = parts.next().unwrap().parse().unwrap();
    Rect::new(
        coord! { x: easting * 100.0, y: northing * 100.0 },
        coord! { x: easting * 100.0 + CELL_SIZE, y: northing * 100.0 + CELL_SIZE },
    )
}

pub fn record(square: &str, las_namn: &str, unixday: i64) -> TileRecord {
    TileRecord {
        square: square.to_string(),
        las_namn: las_namn.to_string(),
        unixday,
        footprint: MultiPolygon::new(vec![cell_footprint(square).to_polygon()]),
    }
}

/// Three cells along northing 69300; two of them flown twice.
pub fn fixture_records() -> Vec<TileRecord> {
    vec![
        record("69300_5425_25", "15C012_69300_5425_25", 16_500),
        record("69300_5425_25", "19E031_69300_5425_25", 18_000),
        record("69300_5450_25", "19E031_69300_5450_25", 18_000),
        record("69300_5475_25", "19E031_69300_5475_25", 18_000),
        record("69300_5475_25", "18E031_69300_5475_25", 17_600),
    ]
}

pub fn fixture_metadata() -> TileMetadata {
    TileMetadata::from_records(fixture_records())
}

/// A forestry parcel inside cell 69300_5475_25.
pub fn parcel() -> QueryGeometry {
    QueryGeometry::from_wkt(
        "POLYGON ((548991.9432 6932135.5817, 548992.0571 6932135.5601, 549002.1121 6932206.4122, \
         549012.3381 6932278.4681, 549209.933 6932191.5249, 549238.9379 6932178.7628, \
         549259.4271 6932169.7471, 549290.71 6932146.763, 549289.6811 6932144.9713, \
         549267.6601 6932106.8421, 549308.1981 6932079.5771, 549292.1961 6932020.5481, \
         549313.6969 6931991.6, 549339.3761 6931957.0261, 549244.8652 6931969.3602, \
         549217.6842 6931972.0, 548989.7802 6932133.4182, 548990.2002 6932135.9056, \
         548991.9432 6932135.5817))",
    )
    .unwrap()
}

/// A 4500 m by 50 m strip across cells 69300_5425_25 and 69300_5450_25.
pub fn strip() -> QueryGeometry {
    Rect::new(
        coord! { x: 542_501.0, y: 6_930_000.0 },
        coord! { x: 547_001.0, y: 6_930_050.0 },
    )
    .into()
}

/// Write a constant-valued tile and its sibling files into the archive
/// directory at the path the identifier maps to.
pub fn write_tile(remote: &Path, las_namn: &str, value: f32) -> PathBuf {
    let square = las_namn.splitn(2, '_').nth(1).unwrap();
    let footprint = cell_footprint(square);
    let size = (CELL_SIZE / PIXEL_SIZE) as usize;

    let raster = Raster::new(
        Array2::from_elem((size, size), value),
        GeoTransform::north_up(footprint.min().x, footprint.max().y, PIXEL_SIZE, PIXEL_SIZE),
    )
    .with_nodata(Some(-9999.0))
    .with_crs(Some("EPSG:3006".to_string()));

    let relative = PathBuf::from(lasnamn_to_path(las_namn).unwrap());
    let local = remote.join(&relative);
    fs::create_dir_all(local.parent().unwrap()).unwrap();
    write_geotiff(&raster, &local).unwrap();
    for ext in TILE_AUXILIARY {
        fs::write(local.with_extension(ext), b"aux").unwrap();
    }
    relative
}

/// Every file currently under `root`, relative to it, sorted.
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort();
    files
}
