//! The named datasets, wired to one cache and one fetcher.

use crate::assembler::TradhojdSource;
use crate::cache::LocalCache;
use crate::config::{Config, RemoteKind};
use crate::fetch::{HttpFetcher, Pacer, RemoteFetcher};
use crate::index::TileIndex;
use crate::metadata::{LASNAMN_COLUMN, SQUARE_COLUMN, UNIXDAY_COLUMN};
use crate::source::ShapefileSource;
use crate::{Result, SkogError};
use std::sync::Arc;

/// Context object holding every dataset loader.
///
/// # Example
///
/// ```no_run
/// use skogdata::{Config, DataSourceCatalog, QueryGeometry};
///
/// let catalog = DataSourceCatalog::from_config(&Config::default())?;
/// let query = QueryGeometry::from_wkt(
///     "POLYGON((548989 6931957, 549339 6931957, 549339 6932278, 548989 6932278, 548989 6931957))",
/// )?;
/// let (pixels, transform) = catalog.tradhojd().load(&query, 20.0)?;
/// println!("{}x{} pixels at {:?}", pixels.ncols(), pixels.nrows(), transform);
/// # Ok::<(), skogdata::SkogError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DataSourceCatalog {
    config: Config,
    cache: LocalCache,
    tradhojd_metadata: Arc<ShapefileSource>,
    tradhojd: TradhojdSource,
}

impl DataSourceCatalog {
    /// Build the catalog with the transport named in the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = build_fetcher(config)?;
        Self::new(config.clone(), fetcher)
    }

    /// Build the catalog around an existing fetcher.
    pub fn new(config: Config, fetcher: Arc<dyn RemoteFetcher>) -> Result<Self> {
        let root = config.cache_root()?;
        log::debug!("Using cache at {}", root.display());
        let cache = LocalCache::new(root, fetcher);

        let tradhojd_metadata = Arc::new(
            ShapefileSource::new(&config.metadata.path, &config.metadata_auxiliary(), cache.clone())
                .with_columns(&[SQUARE_COLUMN, UNIXDAY_COLUMN, LASNAMN_COLUMN]),
        );
        let index = Arc::new(TileIndex::new(tradhojd_metadata.clone()));
        let tradhojd = TradhojdSource::new(index, cache.clone());

        Ok(Self {
            config,
            cache,
            tradhojd_metadata,
            tradhojd,
        })
    }

    /// Configuration the catalog was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared cache.
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Tile metadata shapefile.
    pub fn tradhojd_metadata(&self) -> &Arc<ShapefileSource> {
        &self.tradhojd_metadata
    }

    /// Tree-height rasters.
    pub fn tradhojd(&self) -> &TradhojdSource {
        &self.tradhojd
    }

    /// Tile index behind [`DataSourceCatalog::tradhojd`].
    pub fn index(&self) -> &Arc<TileIndex> {
        self.tradhojd.index()
    }
}

fn build_fetcher(config: &Config) -> Result<Arc<dyn RemoteFetcher>> {
    let remote = &config.remote;
    let pacer = Pacer::new(remote.min_transfer_interval()?);

    match remote.kind {
        RemoteKind::Http => {
            let base_url = remote.base_url.as_deref().ok_or_else(|| {
                SkogError::Config("remote.base_url is required for the http transport".to_string())
            })?;
            let fetcher = HttpFetcher::new(base_url, remote.timeout())?.with_pacer(pacer);
            Ok(Arc::new(fetcher))
        }
        #[cfg(feature = "ftps")]
        RemoteKind::Ftps => {
            let params = crate::fetch::FtpsParams {
                host: remote.host.clone(),
                port: remote.port,
                user: remote.user.clone(),
                password: remote.password.clone(),
                timeout: remote.timeout(),
            };
            Ok(Arc::new(crate::fetch::FtpsFetcher::new(params).with_pacer(pacer)))
        }
        #[cfg(not(feature = "ftps"))]
        RemoteKind::Ftps => Err(SkogError::Config(
            "the ftps transport needs skogdata built with the `ftps` feature".to_string(),
        )),
    }
}
