//! Classpath projection
//!
//! Turns a resolved graph into the ordered list of artifacts to put on a
//! classpath, and fetches them through the download scheduler.

use crate::cache::{CacheError, CachePolicy};
use crate::coordinate::Module;
use crate::descriptor::main_extension;
use crate::repository::{Classifier, RepositoryError};
use crate::resolver::DependencyGraph;
use crate::scheduler::DownloadScheduler;
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};
use url::Url;

/// One artifact of a resolved module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub module: Module,
    pub version: Version,
    pub classifier: Classifier,
    pub extension: String,
    pub url: Url,
}

/// Project `graph` onto `classifiers`
///
/// Artifacts follow the graph's first-discovery order, roots first, and
/// within one module the order of `classifiers`. Modules without a selected
/// version or without a serving repository are skipped, and `pom` packaging
/// contributes no main artifact.
pub fn project(
    graph: &DependencyGraph,
    classifiers: &[Classifier],
) -> Result<Vec<Artifact>, RepositoryError> {
    let mut seen: BTreeSet<(Module, Version, Classifier)> = BTreeSet::new();
    let mut artifacts = Vec::new();

    for node in &graph.nodes {
        let (Some(version), Some(repository)) = (&node.version, &node.repository) else {
            continue;
        };
        let packaging = node.packaging.as_deref().unwrap_or("jar");

        for &classifier in classifiers {
            let extension = match classifier {
                Classifier::Main => match main_extension(packaging) {
                    Some(ext) => ext,
                    None => continue,
                },
                _ => "jar",
            };
            if !seen.insert((node.module.clone(), version.clone(), classifier)) {
                continue;
            }

            let url = repository.artifact_url(&node.module, version, classifier, extension)?;
            artifacts.push(Artifact {
                module: node.module.clone(),
                version: version.clone(),
                classifier,
                extension: extension.to_string(),
                url,
            });
        }
    }

    Ok(artifacts)
}

/// Fetched classpath
#[derive(Debug, Clone, Default)]
pub struct Classpath {
    pub artifacts: Vec<Artifact>,

    /// Local files in projection order; failed artifacts are left out
    pub paths: Vec<PathBuf>,

    pub errors: BTreeMap<Url, CacheError>,
}

impl Classpath {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Paths joined with the platform path separator
    pub fn join(&self) -> String {
        std::env::join_paths(&self.paths)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|_| {
                self.paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(if cfg!(windows) { ";" } else { ":" })
            })
    }
}

/// Project `graph` and download every artifact
///
/// One failing artifact does not stop the others; failures are reported
/// per URL in `errors`.
pub fn fetch(
    graph: &DependencyGraph,
    classifiers: &[Classifier],
    scheduler: &DownloadScheduler,
    policy: CachePolicy,
) -> Result<Classpath, RepositoryError> {
    let artifacts = project(graph, classifiers)?;
    let urls: Vec<Url> = artifacts.iter().map(|a| a.url.clone()).collect();
    debug!(count = urls.len(), "fetching artifacts");

    let mut report = scheduler.fetch_all(&urls, policy);
    let mut paths = Vec::with_capacity(artifacts.len());
    let mut errors = BTreeMap::new();

    for artifact in &artifacts {
        match report.remove(&artifact.url) {
            Some(Ok(path)) => paths.push(path),
            Some(Err(error)) => {
                warn!(url = %artifact.url, %error, "artifact unavailable");
                errors.insert(artifact.url.clone(), error);
            }
            None => {}
        }
    }

    Ok(Classpath {
        artifacts,
        paths,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;
    use crate::resolver::ResolvedNode;

    fn node(org: &str, version: &str, packaging: &str) -> ResolvedNode {
        ResolvedNode {
            module: Module::new(org, "lib"),
            version: Some(Version::parse(version).unwrap()),
            repository: Some(Repository::maven("central", "https://repo.test/").unwrap()),
            packaging: Some(packaging.to_string()),
            required: true,
        }
    }

    fn graph(nodes: Vec<ResolvedNode>) -> DependencyGraph {
        DependencyGraph {
            roots: vec![nodes[0].module.clone()],
            nodes,
            edges: Vec::new(),
        }
    }

    #[test]
    fn test_project_keeps_discovery_order() {
        let graph = graph(vec![node("a", "1.0", "jar"), node("b", "1.5", "jar")]);
        let artifacts = project(&graph, &[Classifier::Main]).unwrap();

        let urls: Vec<&str> = artifacts.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://repo.test/a/lib/1.0/lib-1.0.jar",
                "https://repo.test/b/lib/1.5/lib-1.5.jar"
            ]
        );
    }

    #[test]
    fn test_project_classifiers() {
        let graph = graph(vec![node("a", "1.0", "jar")]);
        let artifacts =
            project(&graph, &[Classifier::Main, Classifier::Sources, Classifier::Main]).unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[1].classifier, Classifier::Sources);
        assert!(artifacts[1].url.as_str().ends_with("lib-1.0-sources.jar"));
    }

    #[test]
    fn test_pom_has_no_main_artifact() {
        let graph = graph(vec![node("parent", "3", "pom"), node("a", "1.0", "bundle")]);
        let artifacts = project(&graph, &[Classifier::Main, Classifier::Javadoc]).unwrap();

        let main: Vec<_> = artifacts
            .iter()
            .filter(|a| a.classifier == Classifier::Main)
            .collect();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].extension, "jar");
        assert_eq!(artifacts.len(), 3);
    }

    #[test]
    fn test_unresolved_nodes_are_skipped() {
        let mut missing = node("b", "1.0", "jar");
        missing.repository = None;
        let graph = graph(vec![node("a", "1.0", "jar"), missing]);

        assert_eq!(project(&graph, &[Classifier::Main]).unwrap().len(), 1);
    }
}
