//! Resolved dependency graph

use crate::coordinate::{Coordinate, Exclusion, Module, Scope};
use crate::repository::Repository;
use crate::version::Version;

/// A module in the resolved graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub module: Module,

    /// Selected version; `None` when no version could be chosen
    pub version: Option<Version>,

    /// Repository that served the descriptor of the selected version
    pub repository: Option<Repository>,

    /// Packaging declared by the descriptor
    pub packaging: Option<String>,

    /// Reachable from a root through non-optional edges only
    pub required: bool,
}

/// A dependency edge discovered in a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: Module,
    pub from_version: Version,
    pub to: Coordinate,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
}

/// Module-version assignment plus the edges it was derived from
///
/// Nodes are kept in first-discovery order, roots first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub roots: Vec<Module>,
    pub nodes: Vec<ResolvedNode>,
    pub edges: Vec<Edge>,
}

impl DependencyGraph {
    pub fn node(&self, module: &Module) -> Option<&ResolvedNode> {
        self.nodes.iter().find(|n| &n.module == module)
    }

    pub fn contains(&self, module: &Module) -> bool {
        self.node(module).is_some()
    }

    /// Selected version of `module`
    pub fn version_of(&self, module: &Module) -> Option<&Version> {
        self.node(module).and_then(|n| n.version.as_ref())
    }

    /// Outgoing edges of `module`
    pub fn dependencies_of<'a>(&'a self, module: &'a Module) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.from == module)
    }

    /// Incoming edges of `module`
    pub fn dependents_of<'a>(&'a self, module: &'a Module) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.to.module == module)
    }

    pub fn has_edge(&self, from: &Module, to: &Module) -> bool {
        self.edges.iter().any(|e| &e.from == from && &e.to.module == to)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `org:name:version` of every node with a selected version
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.nodes
            .iter()
            .filter_map(|n| {
                n.version
                    .as_ref()
                    .map(|v| Coordinate::new(n.module.clone(), v.as_str()))
            })
            .collect()
    }
}
