//! Module descriptors and version listings
//!
//! A descriptor lists the direct dependencies of one module version. Its
//! on-repository form is a JSON document:
//!
//! ```json
//! {
//!   "organization": "a", "name": "lib", "version": "1.0",
//!   "packaging": "jar",
//!   "dependencies": [
//!     { "organization": "b", "name": "lib", "version": "[1.0,1.5]",
//!       "scope": "compile", "optional": false,
//!       "exclusions": [ { "organization": "x", "name": "*" } ] }
//!   ]
//! }
//! ```

use crate::coordinate::{Coordinate, Exclusion, Module, Scope};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding descriptors
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// JSON decoding failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Descriptor describes another module than the one requested
    #[error("Descriptor is for {found}, expected {expected}")]
    ModuleMismatch { expected: Module, found: Module },
}

fn default_packaging() -> String {
    "jar".to_string()
}

/// Module descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub organization: String,
    pub name: String,
    pub version: String,

    /// Main artifact type; `pom` means the module has no main artifact
    #[serde(default = "default_packaging")]
    pub packaging: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencySpec>,
}

impl Descriptor {
    pub fn new(module: &Module, version: &str) -> Self {
        Self {
            organization: module.organization.clone(),
            name: module.name.clone(),
            version: version.to_string(),
            packaging: default_packaging(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: DependencySpec) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_packaging(mut self, packaging: &str) -> Self {
        self.packaging = packaging.to_string();
        self
    }

    pub fn module(&self) -> Module {
        Module::new(&self.organization, &self.name)
    }

    /// Decode a descriptor and check that it describes `expected`
    pub fn from_slice(bytes: &[u8], expected: &Module) -> Result<Self, DescriptorError> {
        let descriptor: Descriptor = serde_json::from_slice(bytes)?;
        let found = descriptor.module();
        if &found != expected {
            return Err(DescriptorError::ModuleMismatch {
                expected: expected.clone(),
                found,
            });
        }
        Ok(descriptor)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DescriptorError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Extension of the main artifact, `None` for aggregator modules
    pub fn main_extension(&self) -> Option<&str> {
        main_extension(&self.packaging)
    }
}

/// Map a packaging to the extension of the main artifact
pub fn main_extension(packaging: &str) -> Option<&str> {
    match packaging {
        "pom" => None,
        "bundle" | "maven-plugin" | "eclipse-plugin" | "" => Some("jar"),
        other => Some(other),
    }
}

/// A dependency entry in a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub organization: String,
    pub name: String,

    /// Version constraint as written
    pub version: String,

    #[serde(default)]
    pub scope: Scope,

    #[serde(default)]
    pub optional: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
}

impl DependencySpec {
    pub fn new(organization: &str, name: &str, version: &str) -> Self {
        Self {
            organization: organization.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn exclude(mut self, organization: &str, name: &str) -> Self {
        self.exclusions.push(Exclusion::new(organization, name));
        self
    }

    pub fn module(&self) -> Module {
        Module::new(&self.organization, &self.name)
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.module(), &self.version)
    }
}

/// Available versions of a module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionListing {
    #[serde(default)]
    pub versions: Vec<String>,
}

impl VersionListing {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
