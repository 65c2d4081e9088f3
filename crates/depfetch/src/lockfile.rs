//! Lockfile management (depfetch.lock)
//!
//! Records the versions selected by a resolution so that a later run can pin
//! them.

use crate::coordinate::Module;
use crate::resolver::Resolution;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during lockfile operations
#[derive(Debug, Error)]
pub enum LockfileError {
    /// Failed to read lockfile
    #[error("Failed to read lockfile: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse lockfile: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize lockfile
    #[error("Failed to serialize lockfile: {0}")]
    SerializeError(String),

    /// Validation error
    #[error("Invalid lockfile: {0}")]
    ValidationError(String),
}

/// Lockfile format version
pub const LOCKFILE_VERSION: u32 = 1;

/// Default lockfile name
pub const LOCKFILE_NAME: &str = "depfetch.lock";

/// Lockfile (depfetch.lock)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lockfile {
    /// Lockfile format version
    pub version: u32,

    /// Locked modules, sorted by organization and name
    #[serde(default, rename = "module")]
    pub modules: Vec<LockedModule>,
}

/// A module pinned to one version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedModule {
    pub organization: String,
    pub name: String,
    pub version: String,

    /// Id of the repository that served the descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl LockedModule {
    pub fn module(&self) -> Module {
        Module::new(&self.organization, &self.name)
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            modules: Vec::new(),
        }
    }
}

impl Lockfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every module of a resolution that has a selected version
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let mut modules: Vec<LockedModule> = resolution
            .graph
            .nodes
            .iter()
            .filter_map(|node| {
                node.version.as_ref().map(|version| LockedModule {
                    organization: node.module.organization.clone(),
                    name: node.module.name.clone(),
                    version: version.to_string(),
                    repository: node.repository.as_ref().map(|r| r.id.clone()),
                })
            })
            .collect();
        modules.sort_by(|a, b| (&a.organization, &a.name).cmp(&(&b.organization, &b.name)));

        Self {
            version: LOCKFILE_VERSION,
            modules,
        }
    }

    /// Parse a lockfile from a file
    pub fn from_file(path: &Path) -> Result<Self, LockfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a lockfile from a string
    pub fn from_str(content: &str) -> Result<Self, LockfileError> {
        let lockfile: Lockfile = toml::from_str(content)?;
        lockfile.validate()?;
        Ok(lockfile)
    }

    /// Validate the lockfile
    pub fn validate(&self) -> Result<(), LockfileError> {
        if self.version != LOCKFILE_VERSION {
            return Err(LockfileError::ValidationError(format!(
                "Unsupported lockfile version: {} (expected {})",
                self.version, LOCKFILE_VERSION
            )));
        }

        let mut seen = BTreeMap::new();
        for locked in &self.modules {
            if locked.organization.is_empty() || locked.name.is_empty() {
                return Err(LockfileError::ValidationError(
                    "Module organization and name cannot be empty".to_string(),
                ));
            }

            Version::parse(&locked.version).map_err(|e| {
                LockfileError::ValidationError(format!(
                    "Module '{}' has invalid version: {}",
                    locked.module(),
                    e
                ))
            })?;

            if let Some(previous) = seen.insert(locked.module(), &locked.version) {
                return Err(LockfileError::ValidationError(format!(
                    "Module '{}' is locked twice ({} and {})",
                    locked.module(),
                    previous,
                    locked.version
                )));
            }
        }

        Ok(())
    }

    /// Write lockfile to a file
    pub fn to_file(&self, path: &Path) -> Result<(), LockfileError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LockfileError::SerializeError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get a locked module
    pub fn get(&self, module: &Module) -> Option<&LockedModule> {
        self.modules
            .iter()
            .find(|m| m.organization == module.organization && m.name == module.name)
    }

    /// Pinned versions, for `ResolveOptions::with_overrides`
    pub fn overrides(&self) -> BTreeMap<Module, String> {
        self.modules
            .iter()
            .map(|m| (m.module(), m.version.clone()))
            .collect()
    }
}
