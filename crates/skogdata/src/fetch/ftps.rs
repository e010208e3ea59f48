//! Implicit-FTPS client for the Skogsstyrelsen archive.
//!
//! The server only accepts TLS from the first byte (port 990), so the
//! session is opened with `connect_secure_implicit` and protected with
//! `PBSZ 0` / `PROT P` after login.

use super::{discard_partial, prepare_destination, DownloadCallback, DownloadStats, Pacer, RemoteFetcher, StatsCounter};
use crate::{Result, SkogError};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use suppaftp::native_tls::TlsConnector;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream, Status};

/// Connection parameters for the FTPS server.
#[derive(Debug, Clone)]
pub struct FtpsParams {
    /// Server host name.
    pub host: String,
    /// Server port (990 for implicit TLS).
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Socket timeout.
    pub timeout: Duration,
}

/// Downloads archive files over implicit FTPS.
pub struct FtpsFetcher {
    params: FtpsParams,
    pacer: Pacer,
    callback: Option<DownloadCallback>,
    stats: StatsCounter,
}

impl std::fmt::Debug for FtpsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpsFetcher")
            .field("host", &self.params.host)
            .field("port", &self.params.port)
            .field("user", &self.params.user)
            .finish()
    }
}

impl FtpsFetcher {
    /// Create a fetcher; no connection is made until the first batch.
    pub fn new(params: FtpsParams) -> Self {
        Self {
            params,
            pacer: Pacer::default(),
            callback: None,
            stats: StatsCounter::default(),
        }
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

    fn notify(&self, msg: &str) {
        log::info!("{}", msg);
        if let Some(cb) = &self.callback {
            cb(msg);
        }
    }

    fn connect(&self) -> Result<NativeTlsFtpStream> {
        let p = &self.params;
        self.notify(&format!("Connecting to {}.", p.host));

        let tls = TlsConnector::new().map_err(|e| SkogError::Transfer {
            path: PathBuf::new(),
            reason: format!("TLS setup failed: {e}"),
        })?;
        let mut ftps = NativeTlsFtpStream::connect_secure_implicit(
            (p.host.as_str(), p.port),
            NativeTlsConnector::from(tls),
            &p.host,
        )?;
        ftps.get_ref().set_read_timeout(Some(p.timeout))?;
        ftps.get_ref().set_write_timeout(Some(p.timeout))?;

        ftps.login(&p.user, &p.password)?;
        ftps.custom_command("PBSZ 0", &[Status::CommandOk])?;
        ftps.custom_command("PROT P", &[Status::CommandOk])?;
        Ok(ftps)
    }

    fn download_single_file(
        &self,
        ftps: &mut NativeTlsFtpStream,
        remote: &Path,
        cache_root: &Path,
    ) -> Result<u64> {
        let local = prepare_destination(cache_root, remote)?;
        let remote_str = remote.to_string_lossy().replace('\\', "/");

        let size = match ftps.size(&remote_str) {
            Ok(size) => size,
            Err(e) if is_permanent_miss(&e) => {
                log::warn!("File not found on remote {}: {}", remote_str, e);
                return Err(SkogError::RemoteNotFound {
                    path: remote.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        self.notify(&format!(
            "Download {} ({} bytes) from {}.",
            remote_str, size, self.params.host
        ));

        let mut file = fs::File::create(&local)?;
        let result = ftps.retr(&format!("/{remote_str}"), |reader: &mut dyn Read| {
            copy_with_progress(reader, &mut file).map_err(FtpError::ConnectionError)
        });

        match result {
            Ok(bytes) => Ok(bytes),
            Err(FtpError::ConnectionError(e)) if is_timeout(&e) => {
                drop(file);
                discard_partial(&local);
                Err(SkogError::TransferTimeout {
                    path: remote.to_path_buf(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn copy_with_progress(reader: &mut dyn Read, file: &mut fs::File) -> io::Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        file.write_all(&buf[..n])?;
        total += n as u64;
        log::trace!("received {} bytes", total);
    }
}

/// A permanent 55x reply: the file does not exist or cannot be served.
fn is_permanent_miss(err: &FtpError) -> bool {
    match err {
        FtpError::UnexpectedResponse(response) => (550..560).contains(&response.status.code()),
        _ => false,
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

impl RemoteFetcher for FtpsFetcher {
    fn fetch(&self, batch: &[PathBuf], cache_root: &Path) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut ftps = self.connect()?;
        std::thread::sleep(Duration::from_millis(100));

        for remote in batch {
            let started = Instant::now();
            let bytes = self.download_single_file(&mut ftps, remote, cache_root)?;
            self.stats.record(bytes);
            self.pacer.wait(started, self.callback.as_ref());
        }

        if let Err(e) = ftps.quit() {
            log::debug!("QUIT failed: {}", e);
        }
        Ok(())
    }

    fn download_stats(&self) -> DownloadStats {
        self.stats.snapshot()
    }
}
