//! Artifact cache
//!
//! Maps remote URLs to files under a cache root shared by every invocation:
//!
//! ```text
//! <root>/
//! ├── https/
//! │   └── repo1.maven.org/
//! │       └── maven2/org/example/lib/1.0/
//! │           ├── lib-1.0.jar
//! │           └── lib-1.0.jar.meta.json
//! └── .tmp/
//! ```
//!
//! Files are written to `.tmp/` first and renamed into place, so readers in
//! other processes never observe partial content. Within one cache instance
//! at most one download per URL is in flight; later callers wait for it.

mod entry;
mod flight;

pub use entry::{compute_checksum, CacheEntry, EntryError};

use crate::transport::{FetchError, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flight::Flight;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors that can occur during cache operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Entry absent and network access disabled
    #[error("Offline mode: {0} is not in the cache")]
    Offline(String),

    /// Download failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Disk full, permissions, ...
    #[error("Failed to write cache entry {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// URL cannot be mapped to a cache location
    #[error("Cannot cache URL: {0}")]
    InvalidUrl(String),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Fetch(e) if e.is_not_found())
    }

    fn write(path: &Path, err: impl ToString) -> Self {
        CacheError::Write {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// How a lookup may use the network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Never touch the network; a cache miss is an error
    pub offline: bool,
    /// Always download, replacing any cached file
    pub force: bool,
}

impl CachePolicy {
    pub fn offline() -> Self {
        Self {
            offline: true,
            force: false,
        }
    }

    pub fn force() -> Self {
        Self {
            offline: false,
            force: true,
        }
    }
}

/// URL-keyed download cache
pub struct ArtifactCache {
    root: PathBuf,
    transport: Arc<dyn Transport>,
    in_flight: DashMap<String, Arc<Flight>>,
    tmp_counter: AtomicU64,
}

impl fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("root", &self.root)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl ArtifactCache {
    /// Create a cache rooted at `root`; directories are created lazily
    pub fn new(root: PathBuf, transport: Arc<dyn Transport>) -> Self {
        Self {
            root,
            transport,
            in_flight: DashMap::new(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Get the cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location a URL is cached at: `<root>/<scheme>/<host>[_port]/<path>`
    pub fn local_path(&self, url: &Url) -> Result<PathBuf, CacheError> {
        let invalid = || CacheError::InvalidUrl(url.to_string());

        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let host = match url.port() {
            Some(port) => format!("{}_{}", host, port),
            None => host.to_string(),
        };

        let mut path = self.root.join(url.scheme()).join(host);
        let mut segments = 0;
        for segment in url.path_segments().ok_or_else(invalid)? {
            if segment.is_empty() {
                continue;
            }
            if segment == "." || segment == ".." {
                return Err(invalid());
            }
            path.push(segment);
            segments += 1;
        }

        if segments == 0 {
            return Err(invalid());
        }
        Ok(path)
    }

    /// Check whether a URL is already cached
    pub fn contains(&self, url: &Url) -> bool {
        if url.scheme() == "file" {
            return url.to_file_path().is_ok_and(|p| p.is_file());
        }
        self.local_path(url).is_ok_and(|p| p.is_file())
    }

    /// Metadata recorded when the URL was downloaded
    pub fn entry(&self, url: &Url) -> Option<CacheEntry> {
        let path = self.local_path(url).ok()?;
        CacheEntry::load(&CacheEntry::sidecar_path(&path)).ok()
    }

    /// Resolve a URL to a local file, downloading it if needed
    ///
    /// `file://` URLs are returned in place and work offline.
    pub fn get(&self, url: &Url, policy: CachePolicy) -> Result<PathBuf, CacheError> {
        if url.scheme() == "file" {
            return Self::local_file(url);
        }

        let path = self.local_path(url)?;
        if !policy.force && path.is_file() {
            debug!(%url, "cache hit");
            return Ok(path);
        }

        if policy.offline {
            return Err(CacheError::Offline(url.to_string()));
        }

        let key = url.as_str().to_string();
        let flight = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(e) => {
                let flight = Arc::clone(e.get());
                drop(e);
                debug!(%url, "waiting for in-flight download");
                return flight.wait();
            }
            Entry::Vacant(e) => {
                let flight = Arc::new(Flight::new());
                e.insert(Arc::clone(&flight));
                flight
            }
        };
        let leader = Leader {
            in_flight: &self.in_flight,
            key,
            flight,
        };

        // A flight for this URL may have finished between the check above and
        // our registration
        let result = if !policy.force && path.is_file() {
            Ok(path)
        } else {
            self.download(url, path)
        };

        leader.flight.complete(result.clone());
        result
    }

    fn local_file(url: &Url) -> Result<PathBuf, CacheError> {
        let path = url
            .to_file_path()
            .map_err(|_| CacheError::InvalidUrl(url.to_string()))?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(FetchError::NotFound(url.to_string()).into())
        }
    }

    fn download(&self, url: &Url, path: PathBuf) -> Result<PathBuf, CacheError> {
        debug!(%url, "downloading");
        let content = self.transport.fetch(url)?;

        self.write_atomic(&path, &content)?;

        let entry = CacheEntry::new(url.as_str(), &content);
        let sidecar = CacheEntry::sidecar_path(&path);
        let written = entry
            .to_json()
            .map_err(|e| CacheError::write(&sidecar, e))
            .and_then(|json| self.write_atomic(&sidecar, &json));
        if let Err(e) = written {
            warn!(%url, error = %e, "could not record cache metadata");
        }

        Ok(path)
    }

    /// Write to a temporary file first, then move it into place
    fn write_atomic(&self, dest: &Path, content: &[u8]) -> Result<(), CacheError> {
        let tmp_dir = self.root.join(".tmp");
        fs::create_dir_all(&tmp_dir).map_err(|e| CacheError::write(&tmp_dir, e))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::write(parent, e))?;
        }

        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let name = compute_checksum(dest.to_string_lossy().as_bytes());
        let tmp_path = tmp_dir.join(format!("{}-{}-{}.part", &name[..16], std::process::id(), n));

        let written = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp_path, dest)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(CacheError::write(dest, e));
        }

        Ok(())
    }
}

/// Registration of the caller performing a download
///
/// Dropping it removes the URL from the in-flight map. If the download
/// unwound before publishing a result, waiters receive a transport error
/// instead of blocking forever.
struct Leader<'a> {
    in_flight: &'a DashMap<String, Arc<Flight>>,
    key: String,
    flight: Arc<Flight>,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        self.flight.complete(Err(CacheError::Fetch(FetchError::Transport {
            url: self.key.clone(),
            message: "download interrupted".to_string(),
        })));
        self.in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct Fixed {
        calls: AtomicUsize,
    }

    impl Transport for Fixed {
        fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.path().ends_with("missing.jar") {
                return Err(FetchError::NotFound(url.to_string()));
            }
            Ok(format!("content of {}", url).into_bytes())
        }
    }

    fn cache(temp: &TempDir) -> (ArtifactCache, Arc<Fixed>) {
        let transport = Arc::new(Fixed {
            calls: AtomicUsize::new(0),
        });
        let cache = ArtifactCache::new(temp.path().to_path_buf(), transport.clone());
        (cache, transport)
    }

    #[test]
    fn test_local_path_layout() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = cache(&temp);

        let url = Url::parse("https://repo.test:8443/maven2/a/lib/1.0/lib-1.0.jar").unwrap();
        assert_eq!(
            cache.local_path(&url).unwrap(),
            temp.path()
                .join("https")
                .join("repo.test_8443")
                .join("maven2/a/lib/1.0/lib-1.0.jar")
        );
    }

    #[test]
    fn test_local_path_rejects_bare_host() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = cache(&temp);
        let url = Url::parse("https://repo.test/").unwrap();
        assert!(matches!(cache.local_path(&url), Err(CacheError::InvalidUrl(_))));
    }

    #[test]
    fn test_second_get_is_a_hit() {
        let temp = TempDir::new().unwrap();
        let (cache, transport) = cache(&temp);
        let url = Url::parse("https://repo.test/a/lib.jar").unwrap();

        let first = cache.get(&url, CachePolicy::default()).unwrap();
        let second = cache.get(&url, CachePolicy::default()).unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&url));
        assert_eq!(cache.entry(&url).unwrap().url, url.as_str());
    }

    #[test]
    fn test_force_refetches() {
        let temp = TempDir::new().unwrap();
        let (cache, transport) = cache(&temp);
        let url = Url::parse("https://repo.test/a/lib.jar").unwrap();

        cache.get(&url, CachePolicy::default()).unwrap();
        cache.get(&url, CachePolicy::force()).unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_offline_miss() {
        let temp = TempDir::new().unwrap();
        let (cache, transport) = cache(&temp);
        let url = Url::parse("https://repo.test/a/lib.jar").unwrap();

        let result = cache.get(&url, CachePolicy::offline());
        assert!(matches!(result, Err(CacheError::Offline(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_not_found_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = cache(&temp);
        let url = Url::parse("https://repo.test/a/missing.jar").unwrap();

        let err = cache.get(&url, CachePolicy::default()).unwrap_err();
        assert!(err.is_not_found());
        assert!(!cache.contains(&url));
    }

    #[test]
    fn test_file_urls_are_served_in_place() {
        let temp = TempDir::new().unwrap();
        let (cache, transport) = cache(&temp);
        let file = temp.path().join("local.jar");
        fs::write(&file, b"local").unwrap();

        let url = Url::from_file_path(&file).unwrap();
        assert_eq!(cache.get(&url, CachePolicy::offline()).unwrap(), file);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_partial_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = cache(&temp);
        let url = Url::parse("https://repo.test/a/lib.jar").unwrap();

        cache.get(&url, CachePolicy::default()).unwrap();
        let leftovers = fs::read_dir(temp.path().join(".tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
