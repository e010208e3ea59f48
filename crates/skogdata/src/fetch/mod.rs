//! Remote archive clients.
//!
//! A [`RemoteFetcher`] copies a batch of archive-relative paths into the
//! local cache, mirroring the archive layout. One session is opened per
//! batch and the first failure aborts the rest of the batch.
//!
//! Two transports are provided:
//! - [`FtpsFetcher`] (feature `ftps`): the Skogsstyrelsen implicit-FTPS server.
//! - [`HttpFetcher`]: a plain HTTP(S) mirror of the same layout.

mod http;

#[cfg(feature = "ftps")]
mod ftps;

pub use http::HttpFetcher;

#[cfg(feature = "ftps")]
pub use ftps::{FtpsFetcher, FtpsParams};

use crate::{Result, SkogError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default minimum time between the start of two transfers.
pub const DEFAULT_MIN_TRANSFER_INTERVAL: Duration = Duration::from_secs(2);

/// Callback for download progress messages.
pub type DownloadCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Copies archive files into a local cache directory.
pub trait RemoteFetcher: Send + Sync {
    /// Download every path in `batch` to the same relative location under
    /// `cache_root`, creating parent directories as needed.
    fn fetch(&self, batch: &[PathBuf], cache_root: &Path) -> Result<()>;

    /// Download statistics for this session.
    fn download_stats(&self) -> DownloadStats {
        DownloadStats::default()
    }
}

/// A fetcher that never reaches the network.
///
/// Used when the cache is expected to be complete; any miss is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

impl RemoteFetcher for OfflineFetcher {
    fn fetch(&self, batch: &[PathBuf], _cache_root: &Path) -> Result<()> {
        match batch.first() {
            Some(path) => Err(SkogError::Transfer {
                path: path.clone(),
                reason: "offline mode, file not in cache".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Download statistics for a fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Number of files downloaded this session.
    pub files_downloaded: usize,
    /// Total bytes downloaded this session.
    pub bytes_downloaded: u64,
}

/// Session counters shared by the fetcher implementations.
#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    files: AtomicUsize,
    bytes: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn record(&self, bytes: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DownloadStats {
        DownloadStats {
            files_downloaded: self.files.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Spaces out consecutive transfers against the remote service.
///
/// A transfer that finishes faster than the interval is followed by a sleep
/// for the remainder.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    /// Create a pacer with the given minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Time left to wait after a transfer that took `elapsed`.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Sleep out the rest of the interval for a transfer started at `started`.
    pub fn wait(&self, started: Instant, callback: Option<&DownloadCallback>) {
        let remaining = self.remaining(started.elapsed());
        if remaining.is_zero() {
            return;
        }
        let msg = format!(
            "Waiting for {:.2} seconds to avoid timeout.",
            remaining.as_secs_f64()
        );
        log::debug!("{}", msg);
        if let Some(cb) = callback {
            cb(&msg);
        }
        std::thread::sleep(remaining);
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TRANSFER_INTERVAL)
    }
}

/// Local destination of an archive path, with parent directories created.
pub(crate) fn prepare_destination(cache_root: &Path, remote: &Path) -> Result<PathBuf> {
    let local = cache_root.join(remote);
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(local)
}

/// Remove the partial copy left behind by a timed-out transfer.
pub(crate) fn discard_partial(local: &Path) {
    match fs::remove_file(local) {
        Ok(()) => log::warn!("Removed partial download {}", local.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial download {}: {}", local.display(), e),
    }
}
