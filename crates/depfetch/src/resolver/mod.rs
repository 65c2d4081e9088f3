//! Dependency resolution
//!
//! Resolves seed coordinates into a conflict-free module graph. Resolution
//! is an iterative fixpoint: each iteration plans against everything fetched
//! so far, fetches the missing version listings and descriptors in parallel,
//! and hands the enlarged snapshot to the next iteration. It stops once a
//! plan needs nothing new and selects the same versions it was walked with.

mod graph;
mod plan;

pub use graph::{DependencyGraph, Edge, ResolvedNode};

use crate::cache::{CacheError, CachePolicy};
use crate::config::EngineContext;
use crate::coordinate::{Module, Scope, Seed};
use crate::repository::{Repository, RepositoryClient, RepositoryError};
use crate::scheduler::{AbortHandle, DownloadScheduler, DEFAULT_PARALLELISM};
use crate::version::Version;
use plan::{Fetched, Snapshot};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Errors that end a resolution run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Seed version constraint does not parse
    #[error("Invalid seed {seed}: {reason}")]
    InvalidSeed { seed: String, reason: String },

    /// Pinned version does not parse
    #[error("Invalid pinned version {version:?} for {module}: {reason}")]
    InvalidOverride {
        module: Module,
        version: String,
        reason: String,
    },

    /// Nothing to resolve against
    #[error("No repositories configured")]
    NoRepositories,

    /// Unbounded run revisited an earlier selection without fetching anything
    #[error("Resolution made no progress after {iterations} iterations")]
    NoProgress { iterations: usize },

    /// Cancelled through an `AbortHandle`
    #[error("Resolution aborted after {iterations} iterations")]
    Aborted { iterations: usize },
}

/// Why one module could not be resolved
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// Absent from every repository
    #[error("not found in {}", .tried.join(", "))]
    NotFound { tried: Vec<String> },

    /// Not cached and the network is disabled
    #[error("not available offline")]
    Offline,

    /// Network or IO failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Fetched but could not be stored
    #[error("cache write failed: {0}")]
    CacheWrite(String),

    /// Fetched but not decodable
    #[error("malformed metadata: {0}")]
    Malformed(String),

    /// A requirement carries a version that cannot be ordered
    #[error("unresolvable conflict: {0}")]
    ConflictUnresolvable(String),

    /// No listed version satisfies the requirements
    #[error("no version matches {}", .requirements.join(", "))]
    NoMatchingVersion { requirements: Vec<String> },
}

impl ErrorKind {
    fn from_repository(error: &RepositoryError) -> Self {
        match error {
            RepositoryError::Cache(CacheError::Offline(_)) => ErrorKind::Offline,
            RepositoryError::Cache(CacheError::Write { reason, .. }) => {
                ErrorKind::CacheWrite(reason.clone())
            }
            e if e.is_not_found() => ErrorKind::NotFound { tried: Vec::new() },
            RepositoryError::Malformed { .. } => ErrorKind::Malformed(error.to_string()),
            other => ErrorKind::Transport(other.to_string()),
        }
    }

    /// Which failure to report when every repository failed
    fn severity(&self) -> u8 {
        match self {
            ErrorKind::NotFound { .. } => 0,
            ErrorKind::Offline => 2,
            _ => 1,
        }
    }
}

/// A per-module failure recorded during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub module: Module,
    /// Version or requirement concerned, when known
    pub version: Option<String>,
    pub kind: ErrorKind,
}

impl ResolutionError {
    pub fn new(module: Module, version: Option<String>, kind: ErrorKind) -> Self {
        Self {
            module,
            version,
            kind,
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}: {}", self.module, version, self.kind),
            None => write!(f, "{}: {}", self.module, self.kind),
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to fetch; every required module resolved
    Converged,
    /// Iteration cap reached; the graph is partial
    NonConverged { iterations: usize },
    /// Converged, but a required module could not be fetched
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Converged => f.write_str("converged"),
            Outcome::NonConverged { iterations } => {
                write!(f, "not converged after {} iterations", iterations)
            }
            Outcome::Failed => f.write_str("failed"),
        }
    }
}

/// Resolution result
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: Outcome,
    pub graph: DependencyGraph,
    pub errors: Vec<ResolutionError>,
    pub iterations: usize,
}

impl Resolution {
    pub fn is_converged(&self) -> bool {
        self.outcome == Outcome::Converged
    }

    /// Selected version of every resolved module
    pub fn selected(&self) -> BTreeMap<Module, Version> {
        self.graph
            .nodes
            .iter()
            .filter_map(|n| n.version.clone().map(|v| (n.module.clone(), v)))
            .collect()
    }
}

/// Resolution options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Never touch the network
    pub offline: bool,

    /// Refetch metadata even when cached
    pub force: bool,

    /// Iteration cap, `None` for unbounded
    pub max_iterations: Option<usize>,

    /// Follow optional dependencies
    pub keep_optional: bool,

    /// Concurrent fetches
    pub parallelism: usize,

    /// Pinned versions; they win over every requirement
    pub overrides: BTreeMap<Module, String>,

    /// Scopes followed below the seeds
    pub scopes: BTreeSet<Scope>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            offline: false,
            force: false,
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            keep_optional: false,
            parallelism: DEFAULT_PARALLELISM,
            overrides: BTreeMap::new(),
            scopes: BTreeSet::from([Scope::Compile, Scope::Runtime]),
        }
    }
}

impl ResolveOptions {
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_keep_optional(mut self, keep_optional: bool) -> Self {
        self.keep_optional = keep_optional;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_override(mut self, module: Module, version: &str) -> Self {
        self.overrides.insert(module, version.to_string());
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<Module, String>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.insert(scope);
        self
    }

    /// Cache policy for metadata fetches
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            offline: self.offline,
            force: self.force,
        }
    }

    fn pinned(&self) -> Result<BTreeMap<Module, Version>, ResolveError> {
        self.overrides
            .iter()
            .map(|(module, version)| {
                Version::parse(version)
                    .map(|v| (module.clone(), v))
                    .map_err(|e| ResolveError::InvalidOverride {
                        module: module.clone(),
                        version: version.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

/// Map a signed iteration cap onto `ResolveOptions::max_iterations`;
/// negative means unbounded
pub fn max_iterations_from_signed(max_iterations: i64) -> Option<usize> {
    usize::try_from(max_iterations).ok()
}

/// Dependency resolver
#[derive(Debug, Clone)]
pub struct Resolver {
    client: RepositoryClient,
    repositories: Vec<Repository>,
    abort: AbortHandle,
}

impl Resolver {
    /// Create a resolver over the repositories of `context`, in order
    pub fn new(context: &EngineContext) -> Self {
        Self {
            client: RepositoryClient::new(context.cache().clone()),
            repositories: context.repositories().to_vec(),
            abort: AbortHandle::new(),
        }
    }

    /// Use a caller-held cancellation flag
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// Resolve `seeds` into a dependency graph
    pub fn resolve(
        &self,
        seeds: &[Seed],
        options: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        if self.repositories.is_empty() {
            return Err(ResolveError::NoRepositories);
        }
        for seed in seeds {
            seed.coordinate
                .constraint()
                .map_err(|e| ResolveError::InvalidSeed {
                    seed: seed.coordinate.to_string(),
                    reason: e.to_string(),
                })?;
        }
        let pinned = options.pinned()?;

        let scheduler = DownloadScheduler::new(self.client.cache().clone(), options.parallelism)
            .with_abort_handle(self.abort.clone());
        let policy = options.policy();

        let mut snapshot = Snapshot::default();
        let mut seen: BTreeSet<BTreeMap<Module, Version>> = BTreeSet::new();
        let mut iterations = 0;

        loop {
            if self.abort.is_aborted() {
                return Err(ResolveError::Aborted { iterations });
            }

            let mut step = plan::plan(seeds, &snapshot, options, &pinned);
            if step.is_complete() && step.selected == snapshot.selected {
                return Ok(finish(Outcome::Converged, step, &snapshot, iterations));
            }
            if options.max_iterations.is_some_and(|max| iterations >= max) {
                return Ok(finish(
                    Outcome::NonConverged { iterations },
                    step,
                    &snapshot,
                    iterations,
                ));
            }

            iterations += 1;
            info!(
                iteration = iterations,
                listings = step.missing_listings.len(),
                descriptors = step.missing_descriptors.len(),
                "resolution iteration"
            );

            let mut fetched = false;
            if !step.missing_listings.is_empty() {
                snapshot = self.fetch_listings(snapshot, &step.missing_listings, &scheduler, policy);
                if self.abort.is_aborted() {
                    return Err(ResolveError::Aborted { iterations });
                }
                fetched = true;
                step = plan::plan(seeds, &snapshot, options, &pinned);
            }
            if !step.missing_descriptors.is_empty() {
                snapshot =
                    self.fetch_descriptors(snapshot, &step.missing_descriptors, &scheduler, policy);
                if self.abort.is_aborted() {
                    return Err(ResolveError::Aborted { iterations });
                }
                fetched = true;
            }

            let fresh = seen.insert(step.selected.clone());
            if !fetched && !fresh && options.max_iterations.is_none() {
                return Err(ResolveError::NoProgress { iterations });
            }
            snapshot.selected = step.selected;
        }
    }

    fn fetch_descriptors(
        &self,
        mut snapshot: Snapshot,
        wanted: &[(Module, Version)],
        scheduler: &DownloadScheduler,
        policy: CachePolicy,
    ) -> Snapshot {
        let results = scheduler.run(wanted.to_vec(), |(module, version)| {
            let result = self.find_descriptor(&module, &version, policy);
            (module, version, result)
        });

        for (module, version, result) in results.into_iter().flatten() {
            match result {
                Ok(fetched) => {
                    snapshot.descriptors.insert((module, version), fetched);
                }
                Err(error) => {
                    warn!(%error, "descriptor unavailable");
                    snapshot.descriptor_errors.insert((module, version), error);
                }
            }
        }
        snapshot
    }

    fn fetch_listings(
        &self,
        mut snapshot: Snapshot,
        wanted: &[Module],
        scheduler: &DownloadScheduler,
        policy: CachePolicy,
    ) -> Snapshot {
        let results = scheduler.run(wanted.to_vec(), |module| {
            let result = self.find_versions(&module, policy);
            (module, result)
        });

        for (module, result) in results.into_iter().flatten() {
            match result {
                Ok(versions) => {
                    snapshot.listings.insert(module, versions);
                }
                Err(error) => {
                    warn!(%error, "version listing unavailable");
                    snapshot.listing_errors.insert(module, error);
                }
            }
        }
        snapshot
    }

    /// Try every repository in order; the first descriptor found wins
    fn find_descriptor(
        &self,
        module: &Module,
        version: &Version,
        policy: CachePolicy,
    ) -> Result<Fetched, ResolutionError> {
        let mut failures = Failures::default();

        for repository in &self.repositories {
            match self.client.fetch_descriptor(module, version, repository, policy) {
                Ok(descriptor) => {
                    debug!(%module, %version, repository = %repository.id, "descriptor found");
                    return Ok(Fetched {
                        descriptor,
                        repository: repository.clone(),
                    });
                }
                Err(e) => failures.record(repository, &e),
            }
        }

        Err(ResolutionError::new(
            module.clone(),
            Some(version.to_string()),
            failures.into_kind(),
        ))
    }

    /// Union of the versions listed by every repository
    fn find_versions(
        &self,
        module: &Module,
        policy: CachePolicy,
    ) -> Result<Vec<Version>, ResolutionError> {
        let mut versions = BTreeSet::new();
        let mut listed = false;
        let mut failures = Failures::default();

        for repository in &self.repositories {
            match self.client.list_versions(module, repository, policy) {
                Ok(found) => {
                    listed = true;
                    versions.extend(found);
                }
                Err(e) => failures.record(repository, &e),
            }
        }

        if listed {
            debug!(%module, count = versions.len(), "versions listed");
            Ok(versions.into_iter().collect())
        } else {
            Err(ResolutionError::new(module.clone(), None, failures.into_kind()))
        }
    }
}

/// Failures of one lookup across the repository chain
#[derive(Default)]
struct Failures {
    tried: Vec<String>,
    worst: Option<ErrorKind>,
}

impl Failures {
    fn record(&mut self, repository: &Repository, error: &RepositoryError) {
        debug!(repository = %repository.id, %error, "lookup failed");
        self.tried.push(repository.id.clone());

        let kind = ErrorKind::from_repository(error);
        if self
            .worst
            .as_ref()
            .map_or(true, |w| kind.severity() > w.severity())
        {
            self.worst = Some(kind);
        }
    }

    fn into_kind(self) -> ErrorKind {
        match self.worst {
            Some(ErrorKind::NotFound { .. }) | None => ErrorKind::NotFound { tried: self.tried },
            Some(kind) => kind,
        }
    }
}

/// Collect the errors of the final graph and settle the outcome
fn finish(
    outcome: Outcome,
    step: plan::Plan,
    snapshot: &Snapshot,
    iterations: usize,
) -> Resolution {
    let mut errors = Vec::new();
    let mut required_failed = false;

    for node in &step.graph.nodes {
        let error = match &node.version {
            Some(version) => snapshot
                .descriptor_errors
                .get(&(node.module.clone(), version.clone())),
            None => snapshot
                .listing_errors
                .get(&node.module)
                .or_else(|| step.conflicts.get(&node.module)),
        };

        if let Some(error) = error {
            errors.push(error.clone());
            required_failed |= node.required;
        }
    }

    let outcome = match outcome {
        Outcome::Converged if required_failed => Outcome::Failed,
        other => other,
    };
    info!(
        %outcome,
        iterations,
        modules = step.graph.len(),
        errors = errors.len(),
        "resolution finished"
    );

    Resolution {
        outcome,
        graph: step.graph,
        errors,
        iterations,
    }
}
