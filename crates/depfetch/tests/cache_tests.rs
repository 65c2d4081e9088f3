//! Integration tests for the shared artifact cache

mod common;

use common::MemoryTransport;
use depfetch::{ArtifactCache, CacheError, CachePolicy, DownloadScheduler, FetchError, Transport};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[test]
fn test_concurrent_requests_share_one_download() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::with_delay(Duration::from_millis(50)));
    let jar = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    transport.put(&jar, b"content");
    let cache = Arc::new(ArtifactCache::new(temp.path().to_path_buf(), transport.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let jar = jar.clone();
            thread::spawn(move || cache.get(&jar, CachePolicy::default()))
        })
        .collect();

    let paths: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(transport.calls_for(&jar), 1);
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(fs::read(&paths[0]).unwrap(), b"content");
}

#[test]
fn test_failed_download_reaches_every_waiter() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::with_delay(Duration::from_millis(50)));
    let missing = url("https://repo.test/maven2/a/lib/1.0/missing.jar");
    let cache = Arc::new(ArtifactCache::new(temp.path().to_path_buf(), transport.clone()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let missing = missing.clone();
            thread::spawn(move || cache.get(&missing, CachePolicy::default()))
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(err.is_not_found());
    }
    assert!(!cache.contains(&missing));
}

#[test]
fn test_force_overwrites_cached_file() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let jar = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    let cache = ArtifactCache::new(temp.path().to_path_buf(), transport.clone());

    transport.put(&jar, b"old");
    let path = cache.get(&jar, CachePolicy::default()).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"old");

    transport.put(&jar, b"new");
    cache.get(&jar, CachePolicy::default()).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"old");

    cache.get(&jar, CachePolicy::force()).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"new");
    assert_eq!(transport.calls_for(&jar), 2);
}

#[test]
fn test_offline_miss_and_hit() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let jar = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    transport.put(&jar, b"content");
    let cache = ArtifactCache::new(temp.path().to_path_buf(), transport.clone());

    assert_eq!(
        cache.get(&jar, CachePolicy::offline()),
        Err(CacheError::Offline(jar.to_string()))
    );
    assert_eq!(transport.calls(), 0);

    let online = cache.get(&jar, CachePolicy::default()).unwrap();
    assert_eq!(cache.get(&jar, CachePolicy::offline()).unwrap(), online);
    assert_eq!(transport.calls(), 1);
}

#[test]
fn test_cache_entry_recorded() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let jar = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    transport.put(&jar, b"content");
    let cache = ArtifactCache::new(temp.path().to_path_buf(), transport);

    assert!(cache.entry(&jar).is_none());
    cache.get(&jar, CachePolicy::default()).unwrap();

    let entry = cache.entry(&jar).unwrap();
    assert_eq!(entry.url, jar.as_str());
    assert_eq!(entry.size, 7);
}

#[test]
fn test_scheduler_reports_every_url() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let present = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    let absent = url("https://repo.test/maven2/b/lib/1.0/lib-1.0.jar");
    transport.put(&present, b"a");
    let cache = Arc::new(ArtifactCache::new(temp.path().to_path_buf(), transport.clone()));
    let scheduler = DownloadScheduler::new(cache, 2);

    let report = scheduler.fetch_all(
        &[present.clone(), absent.clone(), present.clone()],
        CachePolicy::default(),
    );

    assert_eq!(report.len(), 2);
    assert!(report[&present].is_ok());
    assert!(report[&absent].as_ref().unwrap_err().is_not_found());
    assert_eq!(transport.calls_for(&present), 1);
}

#[test]
fn test_unwritable_location_is_a_write_error() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let blocked = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    let open = url("https://repo.test/maven2/b/lib/1.0/lib-1.0.jar");
    transport.put(&blocked, b"a");
    transport.put(&open, b"b");

    // A regular file where the artifact's directory has to go
    let obstacle = temp.path().join("https/repo.test/maven2/a");
    fs::create_dir_all(obstacle.parent().unwrap()).unwrap();
    fs::write(&obstacle, b"").unwrap();

    let cache = Arc::new(ArtifactCache::new(temp.path().to_path_buf(), transport.clone()));
    let err = cache.get(&blocked, CachePolicy::default()).unwrap_err();
    assert!(matches!(err, CacheError::Write { .. }));
    assert!(!cache.contains(&blocked));

    let scheduler = DownloadScheduler::new(Arc::clone(&cache), 2);
    let report = scheduler.fetch_all(&[blocked.clone(), open.clone()], CachePolicy::default());
    assert_eq!(report.len(), 2);
    assert!(matches!(report[&blocked], Err(CacheError::Write { .. })));
    assert_eq!(fs::read(report[&open].as_ref().unwrap()).unwrap(), b"b");

    let leftovers = fs::read_dir(temp.path().join(".tmp")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_unusable_cache_root_fails_every_download() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let jar = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    transport.put(&jar, b"content");

    let root = temp.path().join("cache");
    fs::write(&root, b"not a directory").unwrap();
    let cache = ArtifactCache::new(root.clone(), transport);

    let err = cache.get(&jar, CachePolicy::default()).unwrap_err();
    assert!(matches!(err, CacheError::Write { .. }));
    assert_eq!(fs::read(&root).unwrap(), b"not a directory");
}

/// Panics on its first request, then serves a fixed body
struct PanicOnce {
    calls: AtomicUsize,
}

impl Transport for PanicOnce {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(200));
            panic!("transport failure for {}", url);
        }
        Ok(b"content".to_vec())
    }
}

#[test]
fn test_panicking_download_releases_waiters() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(PanicOnce {
        calls: AtomicUsize::new(0),
    });
    let jar = url("https://repo.test/maven2/a/lib/1.0/lib-1.0.jar");
    let cache = Arc::new(ArtifactCache::new(temp.path().to_path_buf(), transport.clone()));

    let leader = {
        let cache = Arc::clone(&cache);
        let jar = jar.clone();
        thread::spawn(move || cache.get(&jar, CachePolicy::default()))
    };
    thread::sleep(Duration::from_millis(50));
    let waiter = {
        let cache = Arc::clone(&cache);
        let jar = jar.clone();
        thread::spawn(move || cache.get(&jar, CachePolicy::default()))
    };

    assert!(leader.join().is_err());
    let err = waiter.join().unwrap().unwrap_err();
    assert!(matches!(err, CacheError::Fetch(FetchError::Transport { .. })));

    let path = cache.get(&jar, CachePolicy::default()).unwrap();
    assert_eq!(fs::read(path).unwrap(), b"content");
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}
