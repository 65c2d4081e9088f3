//! depfetch library
//!
//! Resolves library coordinates against Maven and Ivy repositories and
//! fetches the resulting classpath. This crate provides:
//! - Version ordering and version constraints
//! - Repository layouts and descriptor fetching
//! - A shared on-disk artifact cache with single-flight downloads
//! - Bounded-parallelism download scheduling
//! - Iterative dependency graph resolution with conflict resolution
//! - Classpath projection
//! - Named repository registry, lockfile and configuration

pub mod cache;
pub mod classpath;
pub mod commands;
pub mod config;
pub mod coordinate;
pub mod descriptor;
pub mod lockfile;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod scheduler;
pub mod transport;
pub mod version;

pub use cache::{ArtifactCache, CacheEntry, CacheError, CachePolicy};
pub use classpath::{Artifact, Classpath};
pub use config::{Config, ConfigError, EngineContext};
pub use coordinate::{Coordinate, CoordinateError, Exclusion, Module, Scope, Seed};
pub use descriptor::{DependencySpec, Descriptor, DescriptorError, VersionListing};
pub use lockfile::{LockedModule, Lockfile, LockfileError};
pub use registry::{EntrySource, RegistryEntry, RegistryError, RepositoryRegistry};
pub use repository::{Classifier, Layout, Repository, RepositoryClient, RepositoryError};
pub use resolver::{
    max_iterations_from_signed, DependencyGraph, Edge, ErrorKind, Outcome, Resolution,
    ResolutionError, ResolveError, ResolveOptions, ResolvedNode, Resolver,
};
pub use scheduler::{AbortHandle, DownloadScheduler};
pub use transport::{DefaultTransport, FetchError, FileTransport, HttpTransport, Transport};
pub use version::{Version, VersionConstraint, VersionError};
