//! Shared fixtures: an in-memory counting transport and repository helpers

#![allow(dead_code)]

use depfetch::{
    ArtifactCache, Classifier, Descriptor, EngineContext, FetchError, Module, Repository,
    Transport, Version, VersionListing,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use url::Url;

/// Serves bytes from memory and counts every request
#[derive(Default)]
pub struct MemoryTransport {
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn put(&self, url: &Url, content: &[u8]) {
        self.files.lock().insert(url.to_string(), content.to_vec());
    }

    pub fn remove(&self, url: &Url) {
        self.files.lock().remove(url.as_str());
    }

    /// Total transport calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transport calls for one URL
    pub fn calls_for(&self, url: &Url) -> usize {
        self.requests.lock().get(url.as_str()).copied().unwrap_or(0)
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.requests.lock().entry(url.to_string()).or_insert(0) += 1;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        self.files
            .lock()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// A remote repository backed by a `MemoryTransport`
pub struct MemoryRepo {
    pub repository: Repository,
    pub transport: Arc<MemoryTransport>,
    listings: Mutex<BTreeMap<Module, Vec<String>>>,
}

impl MemoryRepo {
    pub fn new(id: &str, transport: Arc<MemoryTransport>) -> Self {
        let root = format!("https://{}.repo.test/maven2", id);
        Self {
            repository: Repository::maven(id, &root).unwrap(),
            transport,
            listings: Mutex::new(BTreeMap::new()),
        }
    }

    /// Publish a descriptor, its main artifact and an updated version listing
    pub fn publish(&self, descriptor: Descriptor) {
        let module = descriptor.module();
        let version = Version::parse(&descriptor.version).unwrap();

        let url = self.repository.descriptor_url(&module, &version).unwrap();
        self.transport.put(&url, &descriptor.to_json().unwrap());

        if let Some(extension) = descriptor.main_extension() {
            let jar = self
                .repository
                .artifact_url(&module, &version, Classifier::Main, extension)
                .unwrap();
            self.transport
                .put(&jar, format!("{}:{}", module, version).as_bytes());
        }

        let mut listings = self.listings.lock();
        let versions = listings.entry(module.clone()).or_default();
        versions.push(descriptor.version.clone());
        let listing = VersionListing {
            versions: versions.clone(),
        };
        let listing_url = self.repository.listing_url(&module).unwrap();
        self.transport
            .put(&listing_url, &serde_json::to_vec(&listing).unwrap());
    }

    pub fn descriptor_url(&self, org: &str, version: &str) -> Url {
        self.repository
            .descriptor_url(&Module::new(org, "lib"), &Version::parse(version).unwrap())
            .unwrap()
    }
}

/// Engine context over `transport`, caching under `cache_root`
pub fn context(
    cache_root: &Path,
    transport: Arc<dyn Transport>,
    repositories: Vec<Repository>,
) -> EngineContext {
    let cache = ArtifactCache::new(cache_root.to_path_buf(), transport);
    EngineContext::new(Arc::new(cache), repositories)
}

/// `org:lib` module
pub fn module(org: &str) -> Module {
    Module::new(org, "lib")
}

/// Write a descriptor and its main jar into a local Maven or Ivy repository
pub fn publish_local(repository: &Repository, descriptor: &Descriptor) {
    let module = descriptor.module();
    let version = Version::parse(&descriptor.version).unwrap();

    let url = repository.descriptor_url(&module, &version).unwrap();
    write(&url, &descriptor.to_json().unwrap());

    if let Some(extension) = descriptor.main_extension() {
        let jar = repository
            .artifact_url(&module, &version, Classifier::Main, extension)
            .unwrap();
        write(&jar, b"jar");
    }
}

fn write(url: &Url, content: &[u8]) {
    let path = url.to_file_path().unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
