//! Fetch command
//!
//! Downloads the classpath of a converged resolution.

use super::CommandError;
use crate::cache::CachePolicy;
use crate::classpath::{self, Classpath};
use crate::config::EngineContext;
use crate::repository::Classifier;
use crate::resolver::Resolution;
use tracing::info;

/// Download every artifact of `resolution` for `classifiers`
///
/// Artifacts are fetched with the same offline/force policy as the metadata.
pub fn fetch_classpath(
    context: &EngineContext,
    resolution: &Resolution,
    classifiers: &[Classifier],
    policy: CachePolicy,
) -> Result<Classpath, CommandError> {
    super::ensure_resolved(resolution)?;

    let classpath = classpath::fetch(&resolution.graph, classifiers, &context.scheduler(), policy)?;
    info!(
        artifacts = classpath.artifacts.len(),
        failed = classpath.errors.len(),
        "classpath fetched"
    );

    if !classpath.is_complete() {
        return Err(CommandError::IncompleteClasspath(classpath.errors.len()));
    }
    Ok(classpath)
}
