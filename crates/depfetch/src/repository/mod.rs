//! Repositories and their layouts
//!
//! A repository is a root URL plus a layout that maps module coordinates to
//! paths below it. Remote roots are `http(s)://`, local-filesystem
//! repositories use `file://` roots with either layout.

mod client;

pub use client::RepositoryClient;

use crate::cache::CacheError;
use crate::coordinate::Module;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while talking to a repository
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// Root is neither a URL nor a usable path
    #[error("Invalid repository root: {0}")]
    InvalidRoot(String),

    /// Path could not be joined onto the root
    #[error("Cannot build {path} under {root}")]
    InvalidPath { root: String, path: String },

    /// Fetch through the cache failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Document fetched but not decodable
    #[error("Malformed document at {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::Cache(e) if e.is_not_found())
    }
}

/// Path layout of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `org/with/slashes/name/version/name-version[-classifier].ext`
    Maven,
    /// `org/name/version/<type>s/name[-classifier].ext`
    Ivy,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Maven => f.write_str("maven"),
            Layout::Ivy => f.write_str("ivy"),
        }
    }
}

/// Artifact variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Classifier {
    Main,
    Sources,
    Javadoc,
}

impl Classifier {
    /// Filename suffix, `None` for the main artifact
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Classifier::Main => None,
            Classifier::Sources => Some("sources"),
            Classifier::Javadoc => Some("javadoc"),
        }
    }

    /// Ivy artifact type directory stem
    fn ivy_type(&self) -> &'static str {
        match self {
            Classifier::Main => "jar",
            Classifier::Sources => "src",
            Classifier::Javadoc => "doc",
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix().unwrap_or("main"))
    }
}

impl FromStr for Classifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "" => Ok(Classifier::Main),
            "sources" | "src" => Ok(Classifier::Sources),
            "javadoc" | "doc" => Ok(Classifier::Javadoc),
            other => Err(format!("unknown classifier: {}", other)),
        }
    }
}

/// A repository in registry order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub id: String,
    root: Url,
    pub layout: Layout,
}

impl Repository {
    /// Create a repository; `root` is an `http(s)://` or `file://` URL or a
    /// local path
    pub fn new(id: &str, root: &str, layout: Layout) -> Result<Self, RepositoryError> {
        Ok(Self {
            id: id.to_string(),
            root: parse_root(root)?,
            layout,
        })
    }

    pub fn maven(id: &str, root: &str) -> Result<Self, RepositoryError> {
        Self::new(id, root, Layout::Maven)
    }

    pub fn ivy(id: &str, root: &str) -> Result<Self, RepositoryError> {
        Self::new(id, root, Layout::Ivy)
    }

    /// Root URL, always ending with `/`
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Whether the repository lives on the local filesystem
    pub fn is_local(&self) -> bool {
        self.root.scheme() == "file"
    }

    /// Directory holding every version of `module`
    pub fn module_url(&self, module: &Module) -> Result<Url, RepositoryError> {
        let path = match self.layout {
            Layout::Maven => format!("{}/{}/", maven_org(module), module.name),
            Layout::Ivy => format!("{}/{}/", module.organization, module.name),
        };
        self.join(&path)
    }

    /// Location of the descriptor of `module` at `version`
    pub fn descriptor_url(&self, module: &Module, version: &Version) -> Result<Url, RepositoryError> {
        let path = match self.layout {
            Layout::Maven => format!(
                "{}/{}/{}/{}-{}.json",
                maven_org(module),
                module.name,
                version,
                module.name,
                version
            ),
            Layout::Ivy => format!(
                "{}/{}/{}/ivys/ivy.json",
                module.organization, module.name, version
            ),
        };
        self.join(&path)
    }

    /// Location of the version listing of `module`
    pub fn listing_url(&self, module: &Module) -> Result<Url, RepositoryError> {
        let path = match self.layout {
            Layout::Maven => format!("{}/{}/maven-metadata.json", maven_org(module), module.name),
            Layout::Ivy => format!("{}/{}/versions.json", module.organization, module.name),
        };
        self.join(&path)
    }

    /// Location of an artifact; pure, derived from the layout only
    pub fn artifact_url(
        &self,
        module: &Module,
        version: &Version,
        classifier: Classifier,
        extension: &str,
    ) -> Result<Url, RepositoryError> {
        let suffix = classifier
            .suffix()
            .map(|s| format!("-{}", s))
            .unwrap_or_default();

        let path = match self.layout {
            Layout::Maven => format!(
                "{}/{}/{}/{}-{}{}.{}",
                maven_org(module),
                module.name,
                version,
                module.name,
                version,
                suffix,
                extension
            ),
            Layout::Ivy => format!(
                "{}/{}/{}/{}s/{}{}.{}",
                module.organization,
                module.name,
                version,
                classifier.ivy_type(),
                module.name,
                suffix,
                extension
            ),
        };
        self.join(&path)
    }

    fn join(&self, path: &str) -> Result<Url, RepositoryError> {
        self.root
            .join(path)
            .map_err(|_| RepositoryError::InvalidPath {
                root: self.root.to_string(),
                path: path.to_string(),
            })
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.root, self.layout)
    }
}

fn maven_org(module: &Module) -> String {
    module.organization.replace('.', "/")
}

/// Parse a repository root into a directory URL
pub fn parse_root(root: &str) -> Result<Url, RepositoryError> {
    let invalid = || RepositoryError::InvalidRoot(root.to_string());
    let root = root.trim();
    if root.is_empty() {
        return Err(invalid());
    }

    let mut url = if root.starts_with("http://")
        || root.starts_with("https://")
        || root.starts_with("file:")
    {
        Url::parse(root).map_err(|_| invalid())?
    } else {
        let path = std::path::absolute(Path::new(root)).map_err(|_| invalid())?;
        Url::from_directory_path(&path).map_err(|_| invalid())?
    };

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_maven_paths() {
        let repo = Repository::maven("central", "https://repo1.maven.org/maven2").unwrap();
        let module = Module::new("org.example", "lib");

        assert_eq!(
            repo.descriptor_url(&module, &v("1.0")).unwrap().as_str(),
            "https://repo1.maven.org/maven2/org/example/lib/1.0/lib-1.0.json"
        );
        assert_eq!(
            repo.artifact_url(&module, &v("1.0"), Classifier::Main, "jar")
                .unwrap()
                .as_str(),
            "https://repo1.maven.org/maven2/org/example/lib/1.0/lib-1.0.jar"
        );
        assert_eq!(
            repo.artifact_url(&module, &v("1.0"), Classifier::Sources, "jar")
                .unwrap()
                .as_str(),
            "https://repo1.maven.org/maven2/org/example/lib/1.0/lib-1.0-sources.jar"
        );
        assert_eq!(
            repo.listing_url(&module).unwrap().as_str(),
            "https://repo1.maven.org/maven2/org/example/lib/maven-metadata.json"
        );
    }

    #[test]
    fn test_ivy_paths() {
        let repo = Repository::ivy("local", "file:///home/me/.ivy2/local/").unwrap();
        let module = Module::new("org.example", "lib");

        assert_eq!(
            repo.descriptor_url(&module, &v("2.1")).unwrap().as_str(),
            "file:///home/me/.ivy2/local/org.example/lib/2.1/ivys/ivy.json"
        );
        assert_eq!(
            repo.artifact_url(&module, &v("2.1"), Classifier::Main, "jar")
                .unwrap()
                .as_str(),
            "file:///home/me/.ivy2/local/org.example/lib/2.1/jars/lib.jar"
        );
        assert_eq!(
            repo.artifact_url(&module, &v("2.1"), Classifier::Javadoc, "jar")
                .unwrap()
                .as_str(),
            "file:///home/me/.ivy2/local/org.example/lib/2.1/docs/lib-javadoc.jar"
        );
        assert!(repo.is_local());
    }

    #[test]
    fn test_root_gets_trailing_slash() {
        let repo = Repository::maven("r", "https://repo.test/releases").unwrap();
        assert_eq!(repo.root().as_str(), "https://repo.test/releases/");
        assert!(!repo.is_local());
    }

    #[test]
    fn test_local_path_root() {
        let temp = tempfile::tempdir().unwrap();
        let repo = Repository::maven("local", temp.path().to_str().unwrap()).unwrap();
        assert!(repo.is_local());
        assert_eq!(repo.root().to_file_path().unwrap(), temp.path());
    }

    #[test]
    fn test_invalid_root() {
        assert!(matches!(
            Repository::maven("r", "  "),
            Err(RepositoryError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_classifier_parsing() {
        assert_eq!("sources".parse::<Classifier>().unwrap(), Classifier::Sources);
        assert_eq!("doc".parse::<Classifier>().unwrap(), Classifier::Javadoc);
        assert!("tests".parse::<Classifier>().is_err());
    }
}
