//! Configuration and engine context
//!
//! Settings are read once, in this order, later sources winning:
//!
//! 1. built-in defaults under `~/.depfetch`
//! 2. `~/.depfetch/config.toml`
//! 3. `DEPFETCH_CACHE`, `DEPFETCH_REGISTRY` and `DEPFETCH_PARALLELISM`
//!
//! `EngineContext` carries the result into the resolver; nothing is global.

use crate::cache::ArtifactCache;
use crate::registry::{RegistryError, RepositoryRegistry};
use crate::repository::Repository;
use crate::scheduler::{DownloadScheduler, DEFAULT_PARALLELISM};
use crate::transport::{DefaultTransport, FetchError, Transport};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const ENV_CACHE: &str = "DEPFETCH_CACHE";
pub const ENV_REGISTRY: &str = "DEPFETCH_REGISTRY";
pub const ENV_PARALLELISM: &str = "DEPFETCH_PARALLELISM";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory to derive defaults from
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not readable
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("Failed to parse {path}: {error}")]
    ParseError {
        path: PathBuf,
        error: toml::de::Error,
    },

    /// Setting with an unusable value
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    /// Repository lookup failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// HTTP client could not be built
    #[error(transparent)]
    Transport(#[from] FetchError),
}

/// `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    cache: Option<PathBuf>,
    registry: Option<PathBuf>,
    parallelism: Option<usize>,
    repositories: Option<Vec<String>>,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub home: PathBuf,
    pub cache_root: PathBuf,
    pub registry_root: PathBuf,
    pub parallelism: usize,

    /// Repository ids to use instead of the registry default
    pub repositories: Option<Vec<String>>,
}

impl Config {
    /// Defaults relative to `home`
    pub fn defaults(home: &Path) -> Self {
        let base = home.join(".depfetch");
        Self {
            home: home.to_path_buf(),
            cache_root: base.join("cache"),
            registry_root: base.join("repositories"),
            parallelism: DEFAULT_PARALLELISM,
            repositories: None,
        }
    }

    /// Load from the user's home directory and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Self::from_home(&home, |key| std::env::var(key).ok())
    }

    /// Load relative to `home`, reading variables through `env`
    pub fn from_home(
        home: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(home);

        let path = home.join(".depfetch").join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file: ConfigFile = toml::from_str(&content)
                    .map_err(|error| ConfigError::ParseError { path, error })?;
                config.apply_file(file)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(cache) = env(ENV_CACHE).filter(|v| !v.is_empty()) {
            config.cache_root = PathBuf::from(cache);
        }
        if let Some(registry) = env(ENV_REGISTRY).filter(|v| !v.is_empty()) {
            config.registry_root = PathBuf::from(registry);
        }
        if let Some(value) = env(ENV_PARALLELISM) {
            config.parallelism = parse_parallelism(ENV_PARALLELISM, &value)?;
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) -> Result<(), ConfigError> {
        if let Some(cache) = file.cache {
            self.cache_root = cache;
        }
        if let Some(registry) = file.registry {
            self.registry_root = registry;
        }
        if let Some(parallelism) = file.parallelism {
            if parallelism == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "parallelism".to_string(),
                    value: "0".to_string(),
                });
            }
            self.parallelism = parallelism;
        }
        if file.repositories.is_some() {
            self.repositories = file.repositories;
        }
        Ok(())
    }

    pub fn registry(&self) -> RepositoryRegistry {
        RepositoryRegistry::new(self.registry_root.clone(), self.home.clone())
    }

    /// Configured repositories in order, falling back to the registry default
    pub fn repositories(&self) -> Result<Vec<Repository>, ConfigError> {
        let registry = self.registry();
        let repositories = match &self.repositories {
            Some(ids) => registry.repositories(ids)?,
            None => registry.default_repositories()?,
        };
        Ok(repositories)
    }
}

fn parse_parallelism(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Everything a resolution needs, passed in explicitly
#[derive(Debug, Clone)]
pub struct EngineContext {
    cache: Arc<ArtifactCache>,
    repositories: Vec<Repository>,
    parallelism: usize,
}

impl EngineContext {
    pub fn new(cache: Arc<ArtifactCache>, repositories: Vec<Repository>) -> Self {
        Self {
            cache,
            repositories,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Build the context described by `config` with the default transport
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let transport: Arc<dyn Transport> = Arc::new(DefaultTransport::new()?);
        Self::with_transport(config, transport)
    }

    /// Build the context described by `config` over `transport`
    pub fn with_transport(
        config: &Config,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let cache = ArtifactCache::new(config.cache_root.clone(), transport);
        Ok(Self::new(Arc::new(cache), config.repositories()?).with_parallelism(config.parallelism))
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Replace the repository list
    pub fn with_repositories(mut self, repositories: Vec<Repository>) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Artifact scheduler at the configured parallelism
    pub fn scheduler(&self) -> DownloadScheduler {
        DownloadScheduler::new(self.cache.clone(), self.parallelism)
    }
}
