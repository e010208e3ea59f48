//! # skogdata
//!
//! Tile resolution, caching and mosaicking for the Skogsstyrelsen Trädhöjd
//! (LiDAR tree height) raster archive.
//!
//! Given a polygon in SWEREF99 TM, this crate works out which archive tiles
//! cover it, makes sure they are in a local cache (downloading whatever is
//! missing), then merges the tiles and crops the mosaic to the polygon's
//! padded bounding box.
//!
//! ## Overview
//!
//! ### Grid and naming
//!
//! Tiles are bucketed into 2.5 km grid cells keyed `"{northing}_{easting}_25"`
//! in hundred-metre units, e.g. `69300_5475_25`. A cell can have several
//! flights; the most recent one is used. Tile identifiers such as
//! `19E031_69300_5475_25` map to archive paths like
//! `Tradhojd_LaserdataSkog/2019/69_5/THL_19E031_69300_5475_2019.mrf`.
//!
//! ### Cache and transports
//!
//! The cache mirrors the archive layout under a root directory. Misses are
//! fetched in one batch over implicit FTPS (feature `ftps`) or from an HTTP
//! mirror, with a minimum interval between transfers.
//!
//! ### Raster formats
//!
//! GeoTIFF is read and written with the `tiff` crate. The archive's MRF tiles
//! are read through GDAL (feature `gdal`).
//!
//! ## Examples
//!
//! ```no_run
//! use skogdata::{Config, DataSourceCatalog, QueryGeometry};
//!
//! let catalog = DataSourceCatalog::from_config(&Config::load("skogdata.yaml")?)?;
//! let parcel = QueryGeometry::from_wkt(
//!     "POLYGON((548989 6931957, 549339 6931957, 549339 6932278, 548989 6932278, 548989 6931957))",
//! )?;
//!
//! // Which tiles cover the parcel, and which of them still need downloading
//! let index = catalog.index();
//! println!("{:?}", index.resolve(&parcel)?);
//! println!("{:?}", index.cache_misses(&parcel, catalog.cache())?);
//!
//! // Merged and cropped tree heights
//! let (heights, transform) = catalog.tradhojd().load(&parcel, 20.0)?;
//! println!("{}x{} at {:?}", heights.ncols(), heights.nrows(), transform);
//! # Ok::<(), skogdata::SkogError>(())
//! ```

mod assembler;
mod cache;
mod catalog;
mod config;
mod error;
pub mod fetch;
mod geometry;
pub mod grid;
mod index;
pub mod metadata;
pub mod mosaic;
mod naming;
pub mod raster;
mod source;

pub use assembler::{TradhojdSource, DEFAULT_PADDING};
pub use cache::LocalCache;
pub use catalog::DataSourceCatalog;
pub use config::{Config, MetadataConfig, RemoteConfig, RemoteKind, CACHE_ENV_VAR};
pub use error::SkogError;
pub use fetch::{DownloadCallback, DownloadStats, HttpFetcher, OfflineFetcher, Pacer, RemoteFetcher};
pub use geometry::{pad_rect, AttributeValue, Feature, QueryGeometry};
pub use index::TileIndex;
pub use metadata::{TileMetadata, TileRecord};
pub use naming::{lasnamn_to_path, ARCHIVE_BASEDIR, TILE_AUXILIARY, TILE_EXTENSION};
pub use raster::{open_raster, read_geotiff, write_geotiff, GeoTransform, Raster};
pub use source::{RasterSource, ShapefileSource, VectorSource};

#[cfg(feature = "ftps")]
pub use fetch::{FtpsFetcher, FtpsParams};

/// Result type for skogdata operations.
pub type Result<T> = std::result::Result<T, SkogError>;
