//! Repository client
//!
//! Fetches descriptors and version listings through the artifact cache. One
//! call talks to one repository; falling back across repositories is the
//! resolver's job.

use super::{Repository, RepositoryError};
use crate::cache::{ArtifactCache, CacheError, CachePolicy};
use crate::coordinate::Module;
use crate::descriptor::{Descriptor, VersionListing};
use crate::transport::FetchError;
use crate::version::Version;
use std::fs;
use std::sync::Arc;
use tracing::debug;

/// Metadata client for a set of repositories sharing one cache
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    cache: Arc<ArtifactCache>,
}

impl RepositoryClient {
    pub fn new(cache: Arc<ArtifactCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Fetch and decode the descriptor of `module` at `version`
    pub fn fetch_descriptor(
        &self,
        module: &Module,
        version: &Version,
        repository: &Repository,
        policy: CachePolicy,
    ) -> Result<Descriptor, RepositoryError> {
        let url = repository.descriptor_url(module, version)?;
        debug!(repository = %repository.id, %module, %version, "fetching descriptor");

        let path = self.cache.get(&url, policy)?;
        let bytes = fs::read(&path).map_err(|e| RepositoryError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Descriptor::from_slice(&bytes, module).map_err(|e| RepositoryError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// List the versions of `module` published in `repository`, sorted
    /// ascending
    ///
    /// Local repositories without a listing document are listed by
    /// enumerating the module directory.
    pub fn list_versions(
        &self,
        module: &Module,
        repository: &Repository,
        policy: CachePolicy,
    ) -> Result<Vec<Version>, RepositoryError> {
        let url = repository.listing_url(module)?;

        let mut versions: Vec<Version> = match self.cache.get(&url, policy) {
            Ok(path) => {
                let bytes = fs::read(&path).map_err(|e| RepositoryError::Malformed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                let listing = VersionListing::from_slice(&bytes).map_err(|e| {
                    RepositoryError::Malformed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                listing
                    .versions
                    .iter()
                    .filter_map(|v| Version::parse(v).ok())
                    .collect()
            }
            Err(e) if e.is_not_found() && repository.is_local() => {
                self.list_directory(module, repository)?
            }
            Err(e) => return Err(e.into()),
        };

        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    fn list_directory(
        &self,
        module: &Module,
        repository: &Repository,
    ) -> Result<Vec<Version>, RepositoryError> {
        let url = repository.module_url(module)?;
        let not_found =
            || RepositoryError::Cache(CacheError::Fetch(FetchError::NotFound(url.to_string())));

        let dir = url.to_file_path().map_err(|_| not_found())?;
        let entries = fs::read_dir(&dir).map_err(|_| not_found())?;

        Ok(entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().and_then(|n| Version::parse(n).ok()))
            .collect())
    }
}
