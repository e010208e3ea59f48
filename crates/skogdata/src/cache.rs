//! Local mirror of the remote archive.
//!
//! Files live under the cache root at the same relative path they have in
//! the archive. Presence is the only state tracked: a file that exists is
//! assumed valid.

use crate::fetch::RemoteFetcher;
use crate::{Result, SkogError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A directory mirroring the archive, filled on demand by a fetcher.
#[derive(Clone)]
pub struct LocalCache {
    /// Root directory of the mirror.
    root: PathBuf,
    /// Fetcher used for cache misses.
    fetcher: Arc<dyn RemoteFetcher>,
}

impl fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCache").field("root", &self.root).finish()
    }
}

impl LocalCache {
    /// Create a cache rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            fetcher,
        }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The fetcher used on misses.
    pub fn fetcher(&self) -> &dyn RemoteFetcher {
        self.fetcher.as_ref()
    }

    /// Local path of an archive-relative path.
    pub fn local_path<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.root.join(relative)
    }

    /// Check if an archive file is present locally.
    pub fn is_cached<P: AsRef<Path>>(&self, relative: P) -> bool {
        self.local_path(relative).is_file()
    }

    /// Archive path of a file followed by its siblings with the auxiliary
    /// extensions, e.g. `x.shp` + `["dbf", "shx"]` → `x.shp`, `x.dbf`, `x.shx`.
    pub fn sibling_paths<P: AsRef<Path>>(relative: P, auxiliary: &[&str]) -> Vec<PathBuf> {
        let relative = relative.as_ref();
        let mut paths = Vec::with_capacity(auxiliary.len() + 1);
        paths.push(relative.to_path_buf());
        paths.extend(auxiliary.iter().map(|ext| relative.with_extension(ext)));
        paths
    }

    /// The file and auxiliary siblings that are not present locally.
    pub fn missing<P: AsRef<Path>>(&self, relative: P, auxiliary: &[&str]) -> Vec<PathBuf> {
        Self::sibling_paths(relative, auxiliary)
            .into_iter()
            .filter(|p| !self.is_cached(p))
            .collect()
    }

    /// Make sure a file and its auxiliary siblings are present, downloading
    /// whatever is missing in one batch.
    ///
    /// Returns the local path of the primary file.
    pub fn ensure_present<P: AsRef<Path>>(&self, relative: P, auxiliary: &[&str]) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let mut paths = self.ensure_all_present(&[relative], auxiliary)?;
        Ok(paths.remove(0))
    }

    /// Make sure every file and its auxiliary siblings are present.
    ///
    /// The misses of all files are fetched with a single call to the fetcher.
    /// Returns the local primary paths in input order.
    pub fn ensure_all_present<P: AsRef<Path>>(
        &self,
        relatives: &[P],
        auxiliary: &[&str],
    ) -> Result<Vec<PathBuf>> {
        let required: Vec<PathBuf> = relatives
            .iter()
            .flat_map(|r| Self::sibling_paths(r, auxiliary))
            .collect();

        let to_download: Vec<PathBuf> = required
            .iter()
            .filter(|p| !self.is_cached(p))
            .cloned()
            .collect();

        if !to_download.is_empty() {
            log::info!("{} file(s) missing from cache, downloading", to_download.len());
            self.fetcher.fetch(&to_download, &self.root)?;
        }

        let still_missing: Vec<PathBuf> = required
            .into_iter()
            .filter(|p| !self.is_cached(p))
            .collect();
        if !still_missing.is_empty() {
            return Err(SkogError::CacheIncomplete {
                missing: still_missing,
            });
        }

        Ok(relatives.iter().map(|r| self.local_path(r)).collect())
    }
}
