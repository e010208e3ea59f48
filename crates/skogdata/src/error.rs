//! Error types for the skogdata crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when resolving, caching or assembling tiles.
#[derive(Debug, Error)]
pub enum SkogError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Tile identifier does not follow the archive naming convention.
    #[error("Malformed tile identifier: {0:?}")]
    MalformedIdentifier(String),

    /// Query geometry is missing or empty.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The query is not fully covered by the tile catalog.
    #[error("Data not available for this polygon")]
    NoCoverage,

    /// The remote archive lacks an expected file.
    #[error("File not found on remote: {}", path.display())]
    RemoteNotFound {
        /// Archive-relative path that was requested.
        path: PathBuf,
    },

    /// A transfer stalled past the connection timeout.
    #[error("Transfer of {} timed out", path.display())]
    TransferTimeout {
        /// Archive-relative path that was being transferred.
        path: PathBuf,
    },

    /// Any other failure while talking to the remote archive.
    #[error("Failed to transfer {}: {reason}", path.display())]
    Transfer {
        /// Archive-relative path that was being transferred.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Files still absent from the cache after a fetch attempt.
    #[error("Files missing from cache after download: {missing:?}")]
    CacheIncomplete {
        /// Archive-relative paths that are still absent.
        missing: Vec<PathBuf>,
    },

    /// A metadata feature lacks a required attribute or geometry.
    #[error("Metadata feature {index} has no usable {field:?}")]
    MissingAttribute {
        /// Position of the feature in the catalog.
        index: usize,
        /// Name of the attribute.
        field: String,
    },

    /// The crop region does not intersect the raster.
    #[error("Input shapes do not overlap raster")]
    NoOverlap,

    /// Rasters cannot be merged together.
    #[error("Incompatible rasters: {0}")]
    IncompatibleRasters(String),

    /// File format has no reader compiled in.
    #[error("Unsupported raster format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shapefile could not be read.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// HTTP request error when fetching tiles.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// FTP protocol error.
    #[cfg(feature = "ftps")]
    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    /// GDAL error.
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    /// Metadata lock was poisoned (a thread panicked while loading).
    #[error("Tile metadata lock was poisoned")]
    LockPoisoned,
}

impl From<serde_yaml::Error> for SkogError {
    fn from(err: serde_yaml::Error) -> Self {
        SkogError::Config(err.to_string())
    }
}
