//! End-to-end tests: resolve, then fetch the classpath

mod common;

use common::{context, module, publish_local, MemoryRepo, MemoryTransport};
use depfetch::commands::{self, CommandError};
use depfetch::{
    Classifier, CachePolicy, Config, DependencySpec, Descriptor, FileTransport, Lockfile,
    Outcome, Repository, ResolveOptions, Resolver, Seed, Version,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn lib(org: &str, version: &str) -> Descriptor {
    Descriptor::new(&module(org), version)
}

fn seeds(coordinates: &[&str]) -> Vec<String> {
    coordinates.iter().map(|c| c.to_string()).collect()
}

fn local_maven(root: &Path) -> Repository {
    Repository::maven("local", root.to_str().unwrap()).unwrap()
}

#[test]
fn test_local_maven_repository_classpath() {
    let temp = TempDir::new().unwrap();
    let repo = local_maven(&temp.path().join("repo"));
    publish_local(
        &repo,
        &lib("a", "1.0").with_dependency(DependencySpec::new("b", "lib", "[1.0,1.5]")),
    );
    publish_local(&repo, &lib("b", "1.2"));
    publish_local(&repo, &lib("b", "1.5"));
    publish_local(&repo, &lib("b", "2.0"));

    let ctx = context(&temp.path().join("cache"), Arc::new(FileTransport), vec![repo]);
    let resolution = commands::resolve_seeds(
        &ctx,
        &seeds(&["a:lib:1.0"]),
        ResolveOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(resolution.outcome, Outcome::Converged);

    let classpath = commands::fetch_classpath(
        &ctx,
        &resolution,
        &[Classifier::Main],
        CachePolicy::default(),
    )
    .unwrap();

    assert_eq!(classpath.paths.len(), 2);
    assert!(classpath.paths[0].ends_with("a/lib/1.0/lib-1.0.jar"));
    assert!(classpath.paths[1].ends_with("b/lib/1.5/lib-1.5.jar"));
    assert!(classpath.paths.iter().all(|p| p.starts_with(temp.path().join("repo"))));
    assert!(classpath.join().contains("lib-1.5.jar"));
}

#[test]
fn test_remote_artifacts_land_in_cache() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let repo = MemoryRepo::new("central", transport.clone());
    repo.publish(lib("a", "1.0").with_dependency(DependencySpec::new("b", "lib", "1.0")));
    repo.publish(lib("b", "1.0"));

    let cache_root = temp.path().join("cache");
    let ctx = context(&cache_root, transport, vec![repo.repository.clone()]);
    let resolution = Resolver::new(&ctx)
        .resolve(&[Seed::parse("a:lib:1.0").unwrap()], &ResolveOptions::default())
        .unwrap();

    let classpath = commands::fetch_classpath(
        &ctx,
        &resolution,
        &[Classifier::Main],
        CachePolicy::default(),
    )
    .unwrap();

    assert_eq!(classpath.paths.len(), 2);
    assert!(classpath.paths.iter().all(|p| p.starts_with(&cache_root)));
    assert_eq!(std::fs::read(&classpath.paths[1]).unwrap(), b"b:lib:1.0");
}

#[test]
fn test_missing_sources_make_classpath_incomplete() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let repo = MemoryRepo::new("central", transport.clone());
    repo.publish(lib("a", "1.0"));

    let ctx = context(temp.path(), transport, vec![repo.repository.clone()]);
    let resolution = Resolver::new(&ctx)
        .resolve(&[Seed::parse("a:lib:1.0").unwrap()], &ResolveOptions::default())
        .unwrap();

    let result = commands::fetch_classpath(
        &ctx,
        &resolution,
        &[Classifier::Main, Classifier::Sources],
        CachePolicy::default(),
    );
    assert!(matches!(result, Err(CommandError::IncompleteClasspath(1))));
}

#[test]
fn test_failed_resolution_is_not_fetched() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let repo = MemoryRepo::new("central", transport.clone());

    let ctx = context(temp.path(), transport.clone(), vec![repo.repository.clone()]);
    let resolution = Resolver::new(&ctx)
        .resolve(&[Seed::parse("a:lib:1.0").unwrap()], &ResolveOptions::default())
        .unwrap();
    let calls = transport.calls();

    let result = commands::fetch_classpath(
        &ctx,
        &resolution,
        &[Classifier::Main],
        CachePolicy::default(),
    );
    assert!(matches!(result, Err(CommandError::Failed(_))));
    assert_eq!(transport.calls(), calls);
}

#[test]
fn test_ivy_local_repository() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::defaults(temp.path());
    config.repositories = Some(vec!["ivy2local".to_string()]);

    let ivy_root = temp.path().join(".ivy2").join("local");
    let repo = Repository::ivy("ivy2local", ivy_root.to_str().unwrap()).unwrap();
    publish_local(
        &repo,
        &lib("a", "1.0").with_dependency(DependencySpec::new("b", "lib", "latest.release")),
    );
    publish_local(&repo, &lib("b", "0.9"));
    publish_local(&repo, &lib("b", "1.1"));

    let ctx = depfetch::EngineContext::with_transport(&config, Arc::new(FileTransport)).unwrap();
    let resolution = commands::resolve_seeds(
        &ctx,
        &seeds(&["a:lib:1.0"]),
        ResolveOptions::default(),
        None,
    )
    .unwrap();

    assert_eq!(resolution.outcome, Outcome::Converged);
    assert_eq!(
        resolution.graph.version_of(&module("b")),
        Some(&Version::parse("1.1").unwrap())
    );

    let classpath =
        commands::fetch_classpath(&ctx, &resolution, &[Classifier::Main], CachePolicy::default())
            .unwrap();
    assert_eq!(classpath.paths.len(), 2);
    assert!(classpath.paths.iter().all(|p| p.starts_with(&ivy_root)));
}

#[test]
fn test_lockfile_pins_versions() {
    let temp = TempDir::new().unwrap();
    let repo = local_maven(&temp.path().join("repo"));
    publish_local(
        &repo,
        &lib("a", "1.0").with_dependency(DependencySpec::new("b", "lib", "[1.0,2.0)")),
    );
    publish_local(&repo, &lib("b", "1.2"));

    let ctx = context(&temp.path().join("cache"), Arc::new(FileTransport), vec![repo.clone()]);
    let first = commands::resolve_seeds(
        &ctx,
        &seeds(&["a:lib:1.0"]),
        ResolveOptions::default(),
        None,
    )
    .unwrap();

    let lock_path = temp.path().join("depfetch.lock");
    Lockfile::from_resolution(&first).to_file(&lock_path).unwrap();

    publish_local(&repo, &lib("b", "1.5"));

    let unpinned = commands::resolve_seeds(
        &ctx,
        &seeds(&["a:lib:1.0"]),
        ResolveOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(
        unpinned.graph.version_of(&module("b")),
        Some(&Version::parse("1.5").unwrap())
    );

    let pinned = commands::resolve_seeds(
        &ctx,
        &seeds(&["a:lib:1.0"]),
        ResolveOptions::default(),
        Some(&lock_path),
    )
    .unwrap();
    assert_eq!(
        pinned.graph.version_of(&module("b")),
        Some(&Version::parse("1.2").unwrap())
    );
}

#[test]
fn test_registry_repositories_drive_resolution() {
    let temp = TempDir::new().unwrap();
    let repo_root = temp.path().join("repo");
    std::fs::create_dir_all(&repo_root).unwrap();

    let config = Config::defaults(temp.path());
    commands::add_repository(&config, "team", repo_root.to_str().unwrap(), false).unwrap();
    let defaults =
        commands::set_default_repositories(&config, &["team".to_string()], false).unwrap();
    assert_eq!(defaults, vec!["team".to_string()]);

    publish_local(&local_maven(&repo_root), &lib("a", "1.0"));

    let ctx = depfetch::EngineContext::with_transport(&config, Arc::new(FileTransport)).unwrap();
    assert_eq!(ctx.repositories().len(), 1);
    assert_eq!(ctx.repositories()[0].id, "team");

    let resolution = commands::resolve_seeds(
        &ctx,
        &seeds(&["a:lib:1.0"]),
        ResolveOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(resolution.outcome, Outcome::Converged);
    assert_eq!(
        resolution.graph.node(&module("a")).unwrap().repository.as_ref().unwrap().id,
        "team"
    );
}
