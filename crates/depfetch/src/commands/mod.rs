//! Command implementations
//!
//! Implements the operations behind the command line: resolve, fetch and
//! repository management. Printing stays in the binary.

pub mod fetch;
pub mod repo;
pub mod resolve;

pub use fetch::fetch_classpath;
pub use repo::{add_repository, list_repositories, set_default_repositories};
pub use resolve::{engine_context, ensure_resolved, parse_seeds, resolve_seeds};

use crate::config::ConfigError;
use crate::coordinate::CoordinateError;
use crate::lockfile::LockfileError;
use crate::registry::RegistryError;
use crate::repository::RepositoryError;
use crate::resolver::{ResolutionError, ResolveError};
use thiserror::Error;

/// Errors that can occur while running a command
#[derive(Debug, Error)]
pub enum CommandError {
    /// Seed not of the form org:name:version
    #[error("Invalid coordinate: {0}")]
    InvalidSeed(#[from] CoordinateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Registry error
    #[error("Registry error: {0}")]
    RegistryError(#[from] RegistryError),

    /// Resolution could not run
    #[error("Resolution error: {0}")]
    ResolveError(#[from] ResolveError),

    /// Lockfile error
    #[error("Lockfile error: {0}")]
    LockfileError(#[from] LockfileError),

    /// Artifact URL could not be built
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),

    /// Iteration cap reached
    #[error("Resolution did not converge after {0} iterations")]
    NotConverged(usize),

    /// Required modules unavailable
    #[error("Resolution failed: {} module(s) unavailable", .0.len())]
    Failed(Vec<ResolutionError>),

    /// Some artifacts could not be downloaded
    #[error("{0} artifact(s) could not be fetched")]
    IncompleteClasspath(usize),
}
