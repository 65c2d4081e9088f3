//! Resolve command
//!
//! Parses seeds, builds the engine context and runs the resolver, optionally
//! pinned by a lockfile.

use super::CommandError;
use crate::config::{Config, EngineContext};
use crate::coordinate::Seed;
use crate::lockfile::Lockfile;
use crate::resolver::{Outcome, Resolution, ResolveOptions, Resolver};
use std::path::Path;
use tracing::info;

/// Parse `org:name:version` strings
pub fn parse_seeds(seeds: &[String]) -> Result<Vec<Seed>, CommandError> {
    seeds
        .iter()
        .map(|s| Seed::parse(s).map_err(CommandError::from))
        .collect()
}

/// Engine context for `config`, using `repositories` instead of the
/// configured ones when not empty
pub fn engine_context(config: &Config, repositories: &[String]) -> Result<EngineContext, CommandError> {
    let context = EngineContext::from_config(config)?;
    if repositories.is_empty() {
        return Ok(context);
    }

    let chosen = config.registry().repositories(repositories)?;
    Ok(context.with_repositories(chosen))
}

/// Resolve `seeds`; versions in `lock` are pinned when it exists
pub fn resolve_seeds(
    context: &EngineContext,
    seeds: &[String],
    options: ResolveOptions,
    lock: Option<&Path>,
) -> Result<Resolution, CommandError> {
    let seeds = parse_seeds(seeds)?;

    let options = match lock.filter(|p| p.is_file()) {
        Some(path) => {
            let lockfile = Lockfile::from_file(path)?;
            info!(path = %path.display(), modules = lockfile.modules.len(), "using lockfile");
            options.with_overrides(lockfile.overrides())
        }
        None => options,
    };

    Ok(Resolver::new(context).resolve(&seeds, &options)?)
}

/// Turn a non-converged or failed resolution into an error
pub fn ensure_resolved(resolution: &Resolution) -> Result<(), CommandError> {
    match resolution.outcome {
        Outcome::Converged => Ok(()),
        Outcome::NonConverged { iterations } => Err(CommandError::NotConverged(iterations)),
        Outcome::Failed => Err(CommandError::Failed(resolution.errors.clone())),
    }
}
