//! HTTP(S) mirror client.

use super::{discard_partial, prepare_destination, DownloadCallback, DownloadStats, Pacer, RemoteFetcher, StatsCounter};
use crate::{Result, SkogError};
use reqwest::StatusCode;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Fetches archive files from an HTTP server exposing the archive layout.
///
/// `GET {base_url}/{relative path}`; the response body is streamed into the
/// cache.
pub struct HttpFetcher {
    /// Base URL of the mirror, without trailing slash.
    base_url: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
    /// Spacing between transfers.
    pacer: Pacer,
    /// Optional progress callback.
    callback: Option<DownloadCallback>,
    /// Session statistics.
    stats: StatsCounter,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("base_url", &self.base_url)
            .field("pacer", &self.pacer)
            .finish()
    }
}

impl HttpFetcher {
    /// Create a fetcher for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            pacer: Pacer::default(),
            callback: None,
            stats: StatsCounter::default(),
        })
    }

    /// Replace the transfer pacing.
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Install a progress callback.
    pub fn with_callback(mut self, callback: DownloadCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// URL of an archive path.
    pub fn url_for(&self, remote: &Path) -> String {
        let relative = remote
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.base_url, relative)
    }

    fn notify(&self, msg: &str) {
        log::info!("{}", msg);
        if let Some(cb) = &self.callback {
            cb(msg);
        }
    }

    fn download_single_file(&self, remote: &Path, cache_root: &Path) -> Result<u64> {
        let local = prepare_destination(cache_root, remote)?;
        let url = self.url_for(remote);

        let timed_out = |path: &Path| SkogError::TransferTimeout {
            path: path.to_path_buf(),
        };

        let mut response = match self.client.get(&url).send() {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(timed_out(remote)),
            Err(e) => return Err(e.into()),
        };

        if response.status() == StatusCode::NOT_FOUND {
            log::warn!("File not found on remote {}", remote.display());
            return Err(SkogError::RemoteNotFound {
                path: remote.to_path_buf(),
            });
        }
        if !response.status().is_success() {
            return Err(SkogError::Transfer {
                path: remote.to_path_buf(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        match response.content_length() {
            Some(size) => self.notify(&format!("Download {} ({} bytes) from {}.", remote.display(), size, self.base_url)),
            None => self.notify(&format!("Download {} from {}.", remote.display(), self.base_url)),
        }

        let mut file = fs::File::create(&local)?;
        match response.copy_to(&mut file) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.is_timeout() => {
                drop(file);
                discard_partial(&local);
                Err(timed_out(remote))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, batch: &[PathBuf], cache_root: &Path) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.notify(&format!("Connecting to {}.", self.base_url));

        for remote in batch {
            let started = Instant::now();
            let bytes = self.download_single_file(remote, cache_root)?;
            self.stats.record(bytes);
            self.pacer.wait(started, self.callback.as_ref());
        }
        Ok(())
    }

    fn download_stats(&self) -> DownloadStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer one request with `head` and `body`, then hold the socket open
    /// for `linger`.
    fn serve_once(head: &'static str, body: &'static [u8], linger: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
            let _ = stream.flush();
            thread::sleep(linger);
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_url_for() {
        let fetcher = HttpFetcher::new("https://mirror.example/archive/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            fetcher.url_for(Path::new("Tradhojd_LaserdataSkog/2021/66_5/THL_21D013_66600_5000_2021.mrf")),
            "https://mirror.example/archive/Tradhojd_LaserdataSkog/2021/66_5/THL_21D013_66600_5000_2021.mrf"
        );
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let fetcher = HttpFetcher::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        fetcher.fetch(&[], dir.path()).unwrap();
        assert_eq!(fetcher.download_stats(), DownloadStats::default());
    }

    #[test]
    fn test_not_found_aborts_batch() {
        let base = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            b"",
            Duration::ZERO,
        );
        let fetcher = HttpFetcher::new(&base, Duration::from_secs(5))
            .unwrap()
            .with_pacer(Pacer::new(Duration::ZERO));
        let dir = tempfile::tempdir().unwrap();

        let batch = [PathBuf::from("a/b/x.mrf"), PathBuf::from("a/b/x.idx")];
        let err = fetcher.fetch(&batch, dir.path()).unwrap_err();
        match err {
            SkogError::RemoteNotFound { path } => assert_eq!(path, PathBuf::from("a/b/x.mrf")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.path().join("a/b/x.mrf").exists());
        assert!(!dir.path().join("a/b/x.idx").exists());
        assert_eq!(fetcher.download_stats().files_downloaded, 0);
    }

    #[test]
    fn test_stalled_transfer_removes_partial_file() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n",
            b"hello world",
            Duration::from_secs(5),
        );
        let fetcher = HttpFetcher::new(&base, Duration::from_secs(1))
            .unwrap()
            .with_pacer(Pacer::new(Duration::ZERO));
        let dir = tempfile::tempdir().unwrap();

        let err = fetcher
            .fetch(&[PathBuf::from("a/b/x.mrf")], dir.path())
            .unwrap_err();
        match err {
            SkogError::TransferTimeout { path } => assert_eq!(path, PathBuf::from("a/b/x.mrf")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.path().join("a/b/x.mrf").exists());
    }
}
