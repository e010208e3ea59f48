//! Configuration for the archive connection, cache and metadata location.
//!
//! Loaded from YAML. Every field has a default, so an empty document (or no
//! file at all) yields a working configuration for the public archive.

use crate::{Result, SkogError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the cache root.
pub const CACHE_ENV_VAR: &str = "SKOGDATA_CACHE";

/// Directory name of the default cache, next to the executable.
pub const DEFAULT_CACHE_DIR_NAME: &str = "cache";

/// Archive-relative path of the tile metadata shapefile.
pub const DEFAULT_METADATA_PATH: &str =
    "Tradhojd_LaserdataSkog/Metadata/TradhojdLaserdataSkogMetadata_20250131.shp";

/// Transport used to reach the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// Implicit FTPS (requires the `ftps` feature).
    Ftps,
    /// HTTP(S) mirror of the archive layout.
    Http,
}

/// Remote archive settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Socket timeout in seconds.
    pub timeout_secs: u64,
    /// Base URL for [`RemoteKind::Http`].
    pub base_url: Option<String>,
    /// Minimum time between the start of two transfers.
    pub min_transfer_interval_secs: f64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        // Skogsstyrelsen publishes these credentials for anonymous use
        Self {
            kind: RemoteKind::Ftps,
            host: "ftpsks.skogsstyrelsen.se".to_string(),
            port: 990,
            user: "SGD".to_string(),
            password: "0N!nd=I9EJ".to_string(),
            timeout_secs: 15,
            base_url: None,
            min_transfer_interval_secs: 2.0,
        }
    }
}

impl RemoteConfig {
    /// Socket timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Minimum interval between transfers.
    pub fn min_transfer_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.min_transfer_interval_secs.max(0.0)).map_err(|e| {
            SkogError::Config(format!(
                "remote.min_transfer_interval_secs {} is out of range: {}",
                self.min_transfer_interval_secs, e
            ))
        })
    }
}

/// Location of the tile metadata shapefile inside the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub path: PathBuf,
    /// Sibling extensions fetched together with the `.shp`.
    pub auxiliary: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_METADATA_PATH),
            auxiliary: vec!["dbf".to_string(), "shx".to_string()],
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Cache root; see [`Config::cache_root`].
    pub cache_dir: Option<PathBuf>,
    /// Margin around query bounding boxes, in metres.
    pub padding: f64,
    pub remote: RemoteConfig,
    pub metadata: MetadataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            padding: crate::assembler::DEFAULT_PADDING,
            remote: RemoteConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Config {
    /// Load a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a YAML document. An empty document gives the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(SkogError::Config(format!(
                "padding must be a non-negative number, got {}",
                self.padding
            )));
        }
        if self.remote.kind == RemoteKind::Http && self.remote.base_url.is_none() {
            return Err(SkogError::Config(
                "remote.base_url is required for the http transport".to_string(),
            ));
        }
        if !self.remote.min_transfer_interval_secs.is_finite() {
            return Err(SkogError::Config(
                "remote.min_transfer_interval_secs must be finite".to_string(),
            ));
        }
        self.remote.min_transfer_interval()?;
        Ok(())
    }

    /// Cache root directory.
    ///
    /// `SKOGDATA_CACHE` wins over `cache_dir`; without either the cache is
    /// `cache/` next to the running executable.
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CACHE_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or_else(|| {
            SkogError::Config(format!("{} has no parent directory", exe.display()))
        })?;
        Ok(dir.join(DEFAULT_CACHE_DIR_NAME))
    }

    /// Metadata sibling extensions as string slices.
    pub fn metadata_auxiliary(&self) -> Vec<&str> {
        self.metadata.auxiliary.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        let config = Config::default();
        assert_eq!(config.padding, 20.0);
        assert_eq!(config.remote.port, 990);
        assert_eq!(config.remote.timeout(), Duration::from_secs(15));
        assert_eq!(config.remote.min_transfer_interval().unwrap(), Duration::from_secs(2));
        assert_eq!(config.metadata_auxiliary(), vec!["dbf", "shx"]);
    }

    #[test]
    fn test_partial_document() {
        let yaml = r#"
padding: 50
remote:
  kind: http
  base_url: "https://mirror.example.org/skog"
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.padding, 50.0);
        assert_eq!(config.remote.kind, RemoteKind::Http);
        assert_eq!(config.remote.port, 990);
        assert_eq!(config.metadata, MetadataConfig::default());
    }

    #[test]
    fn test_http_needs_base_url() {
        let err = Config::from_yaml_str("remote:\n  kind: http\n").unwrap_err();
        assert!(matches!(err, SkogError::Config(_)));
    }

    #[test]
    fn test_transfer_interval_out_of_range() {
        for value in ["1e30", ".nan", ".inf"] {
            let yaml = format!("remote:\n  min_transfer_interval_secs: {value}\n");
            let err = Config::from_yaml_str(&yaml).unwrap_err();
            assert!(matches!(err, SkogError::Config(_)), "{value}: {err:?}");
        }

        let remote = RemoteConfig {
            min_transfer_interval_secs: 1e30,
            ..RemoteConfig::default()
        };
        assert!(matches!(remote.min_transfer_interval(), Err(SkogError::Config(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_yaml_str("paddding: 3\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skogdata.yaml");
        std::fs::write(&path, "cache_dir: /data/skog\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/data/skog")));
    }

    #[test]
    #[serial]
    fn test_cache_root_resolution() {
        std::env::remove_var(CACHE_ENV_VAR);

        let mut config = Config::default();
        let beside_exe = config.cache_root().unwrap();
        assert!(beside_exe.ends_with(DEFAULT_CACHE_DIR_NAME));

        config.cache_dir = Some(PathBuf::from("/data/skog"));
        assert_eq!(config.cache_root().unwrap(), PathBuf::from("/data/skog"));

        std::env::set_var(CACHE_ENV_VAR, "/tmp/override");
        assert_eq!(config.cache_root().unwrap(), PathBuf::from("/tmp/override"));
        std::env::remove_var(CACHE_ENV_VAR);
    }
}
