//! Named repository shortcuts
//!
//! Repositories can be referred to by id. Two ids are built in (`central`
//! and `ivy2local`); more are added as `<root>/<id>.toml` files. The
//! `<root>/default` file lists, one id per line, the repositories used when
//! none are given explicitly.

use crate::repository::{Layout, Repository, RepositoryError};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Maven Central
pub const CENTRAL_ID: &str = "central";
pub const CENTRAL_URL: &str = "https://repo1.maven.org/maven2";

/// The local Ivy repository under the home directory
pub const IVY2_LOCAL_ID: &str = "ivy2local";

const DEFAULT_FILE: &str = "default";

/// Errors that can occur while reading or editing the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Empty repository id
    #[error("Repository id cannot be empty")]
    EmptyId,

    /// Id that cannot be used as a file name
    #[error("Invalid repository id {0:?}")]
    InvalidId(String),

    /// Id already taken
    #[error("Repository {0} already exists")]
    AlreadyExists(String),

    /// Id not registered
    #[error("Unknown repository: {0}")]
    Unknown(String),

    /// Registry directory not readable or writable
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Repository file is not valid TOML
    #[error("Failed to parse {path}: {error}")]
    ParseError {
        path: PathBuf,
        error: toml::de::Error,
    },

    /// Failed to serialize a repository file
    #[error("Failed to serialize repository: {0}")]
    SerializeError(String),

    /// Stored root is not usable
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// On-disk form of one repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredRepository {
    url: String,
    #[serde(default)]
    ivy: bool,
}

/// Where a registry entry comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    Builtin,
    File(PathBuf),
}

/// A registered repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: String,
    pub repository: Repository,
    pub source: EntrySource,
}

/// Repository registry rooted at a directory
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    root: PathBuf,
    home: PathBuf,
}

impl RepositoryRegistry {
    /// Registry at `root`; `home` locates the built-in local Ivy repository
    pub fn new(root: PathBuf, home: PathBuf) -> Self {
        Self { root, home }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register `base_url` under `id`
    pub fn add(&self, id: &str, base_url: &str, ivy_like: bool) -> Result<RegistryEntry, RegistryError> {
        validate_id(id)?;
        if self.get(id)?.is_some() {
            return Err(RegistryError::AlreadyExists(id.to_string()));
        }

        let layout = if ivy_like { Layout::Ivy } else { Layout::Maven };
        let repository = Repository::new(id, base_url, layout)?;
        let stored = StoredRepository {
            url: repository.root().to_string(),
            ivy: ivy_like,
        };
        let content = toml::to_string_pretty(&stored)
            .map_err(|e| RegistryError::SerializeError(e.to_string()))?;

        fs::create_dir_all(&self.root)?;
        let path = self.entry_path(id);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => RegistryError::AlreadyExists(id.to_string()),
                _ => RegistryError::IoError(e),
            })?;
        file.write_all(content.as_bytes())?;

        debug!(id, url = %repository.root(), "repository added");
        Ok(RegistryEntry {
            id: id.to_string(),
            repository,
            source: EntrySource::File(path),
        })
    }

    /// Every repository, built-ins first, then registered ones by id
    pub fn list(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let mut entries = self.builtins()?;

        let mut paths: Vec<PathBuf> = match fs::read_dir(&self.root) {
            Ok(dir) => dir
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        paths.sort();

        for path in paths {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if entries.iter().any(|e| e.id == id) {
                continue;
            }
            entries.push(self.load(&id, &path)?);
        }

        Ok(entries)
    }

    /// Look up one id
    pub fn get(&self, id: &str) -> Result<Option<RegistryEntry>, RegistryError> {
        if let Some(entry) = self.builtins()?.into_iter().find(|e| e.id == id) {
            return Ok(Some(entry));
        }
        if validate_id(id).is_err() {
            return Ok(None);
        }

        let path = self.entry_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        self.load(id, &path).map(Some)
    }

    /// Ids of the default repositories, in order
    ///
    /// Ids that are not registered are dropped unless `with_not_found` is
    /// set.
    pub fn default_ids(&self, with_not_found: bool) -> Result<Vec<String>, RegistryError> {
        let ids = match fs::read_to_string(self.root.join(DEFAULT_FILE)) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                vec![IVY2_LOCAL_ID.to_string(), CENTRAL_ID.to_string()]
            }
            Err(e) => return Err(e.into()),
        };

        if with_not_found {
            return Ok(ids);
        }

        let mut known = Vec::with_capacity(ids.len());
        for id in ids {
            if self.get(&id)?.is_some() {
                known.push(id);
            }
        }
        Ok(known)
    }

    /// Replace the default repository list
    pub fn set_default(&self, ids: &[String]) -> Result<(), RegistryError> {
        for id in ids {
            if self.get(id)?.is_none() {
                return Err(RegistryError::Unknown(id.clone()));
            }
        }

        fs::create_dir_all(&self.root)?;
        let mut content = ids.join("\n");
        content.push('\n');
        fs::write(self.root.join(DEFAULT_FILE), content)?;
        Ok(())
    }

    /// Repositories for `ids`, in the given order
    pub fn repositories(&self, ids: &[String]) -> Result<Vec<Repository>, RegistryError> {
        ids.iter()
            .map(|id| {
                self.get(id)?
                    .map(|e| e.repository)
                    .ok_or_else(|| RegistryError::Unknown(id.clone()))
            })
            .collect()
    }

    /// Repositories of the default list
    pub fn default_repositories(&self) -> Result<Vec<Repository>, RegistryError> {
        let ids = self.default_ids(false)?;
        self.repositories(&ids)
    }

    fn builtins(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let ivy_root = self.home.join(".ivy2").join("local");
        Ok(vec![
            RegistryEntry {
                id: CENTRAL_ID.to_string(),
                repository: Repository::maven(CENTRAL_ID, CENTRAL_URL)?,
                source: EntrySource::Builtin,
            },
            RegistryEntry {
                id: IVY2_LOCAL_ID.to_string(),
                repository: Repository::ivy(IVY2_LOCAL_ID, &ivy_root.to_string_lossy())?,
                source: EntrySource::Builtin,
            },
        ])
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.toml", id))
    }

    fn load(&self, id: &str, path: &Path) -> Result<RegistryEntry, RegistryError> {
        let content = fs::read_to_string(path)?;
        let stored: StoredRepository =
            toml::from_str(&content).map_err(|error| RegistryError::ParseError {
                path: path.to_path_buf(),
                error,
            })?;
        let layout = if stored.ivy { Layout::Ivy } else { Layout::Maven };

        Ok(RegistryEntry {
            id: id.to_string(),
            repository: Repository::new(id, &stored.url, layout)?,
            source: EntrySource::File(path.to_path_buf()),
        })
    }
}

fn validate_id(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() {
        return Err(RegistryError::EmptyId);
    }
    if id.contains(['/', '\\', std::path::MAIN_SEPARATOR]) || id == "." || id == ".." {
        return Err(RegistryError::InvalidId(id.to_string()));
    }
    Ok(())
}
