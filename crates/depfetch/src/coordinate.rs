//! Module coordinates
//!
//! `Module` is the conflict-resolution unit, `Coordinate` pairs it with a
//! version constraint, and `Seed` is a root coordinate as requested by the
//! caller (`org:name:version`).

use crate::version::{VersionConstraint, VersionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while parsing coordinates
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinateError {
    /// Not of the form `org:name:version`
    #[error("Malformed coordinate {0:?}, expected org:name:version")]
    Malformed(String),

    /// Version part does not parse
    #[error("Invalid version in {coordinate}: {error}")]
    InvalidVersion {
        coordinate: String,
        error: VersionError,
    },

    /// Unknown scope name
    #[error("Unknown scope: {0}")]
    UnknownScope(String),
}

/// Organization and name of a library
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Module {
    pub organization: String,
    pub name: String,
}

impl Module {
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.organization, self.name)
    }
}

/// A module together with a version constraint
///
/// The constraint is kept as written; a malformed constraint coming from a
/// descriptor is an error of the target module only, reported when the
/// resolver tries to order its versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    pub module: Module,
    pub version: String,
}

impl Coordinate {
    pub fn new(module: Module, version: impl Into<String>) -> Self {
        Self {
            module,
            version: version.into(),
        }
    }

    /// Parse an `org:name:version` string
    pub fn parse(s: &str) -> Result<Self, CoordinateError> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(CoordinateError::Malformed(s.to_string()));
        }

        let coordinate = Self::new(Module::new(parts[0].trim(), parts[1].trim()), parts[2].trim());
        coordinate
            .constraint()
            .map_err(|error| CoordinateError::InvalidVersion {
                coordinate: s.to_string(),
                error,
            })?;

        Ok(coordinate)
    }

    /// Parse the version constraint
    pub fn constraint(&self) -> Result<VersionConstraint, VersionError> {
        VersionConstraint::parse(&self.version)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Exclusion rule; `*` matches any organization or name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub organization: String,
    pub name: String,
}

impl Exclusion {
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
        }
    }

    /// Check whether this rule prunes `module`
    pub fn matches(&self, module: &Module) -> bool {
        (self.organization == "*" || self.organization == module.organization)
            && (self.name == "*" || self.name == module.name)
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.organization, self.name)
    }
}

/// Check a module against an exclusion set
pub fn is_excluded(exclusions: &BTreeSet<Exclusion>, module: &Module) -> bool {
    exclusions.iter().any(|e| e.matches(module))
}

/// Dependency scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Provided => "provided",
            Scope::Test => "test",
            Scope::System => "system",
        };
        f.write_str(s)
    }
}

impl FromStr for Scope {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile" => Ok(Scope::Compile),
            "runtime" => Ok(Scope::Runtime),
            "provided" => Ok(Scope::Provided),
            "test" => Ok(Scope::Test),
            "system" => Ok(Scope::System),
            other => Err(CoordinateError::UnknownScope(other.to_string())),
        }
    }
}

/// A root coordinate of a resolution, with the exclusions applied to
/// everything reached through it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub coordinate: Coordinate,
    pub exclusions: BTreeSet<Exclusion>,
}

impl Seed {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            exclusions: BTreeSet::new(),
        }
    }

    /// Parse an `org:name:version` string
    pub fn parse(s: &str) -> Result<Self, CoordinateError> {
        Coordinate::parse(s).map(Self::new)
    }

    /// Exclude `organization:name` below this root
    pub fn with_exclusion(mut self, organization: &str, name: &str) -> Self {
        self.exclusions.insert(Exclusion::new(organization, name));
        self
    }
}
