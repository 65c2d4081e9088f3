//! Graph walk and version selection over one resolution snapshot
//!
//! Planning is pure: it reads the descriptors and listings fetched so far,
//! walks the graph from the seeds under the current selection, selects a
//! version per reached module and reports what still has to be fetched.

use super::graph::{DependencyGraph, Edge, ResolvedNode};
use super::{ErrorKind, ResolutionError, ResolveOptions};
use crate::coordinate::{is_excluded, Exclusion, Module, Seed};
use crate::descriptor::Descriptor;
use crate::repository::Repository;
use crate::version::{Version, VersionConstraint};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A descriptor and the repository that served it
#[derive(Debug, Clone)]
pub(super) struct Fetched {
    pub descriptor: Descriptor,
    pub repository: Repository,
}

/// Everything learned so far; moved from one iteration to the next
#[derive(Debug, Default)]
pub(super) struct Snapshot {
    pub descriptors: BTreeMap<(Module, Version), Fetched>,
    pub listings: BTreeMap<Module, Vec<Version>>,
    pub descriptor_errors: BTreeMap<(Module, Version), ResolutionError>,
    pub listing_errors: BTreeMap<Module, ResolutionError>,
    pub selected: BTreeMap<Module, Version>,
}

impl Snapshot {
    fn descriptor(&self, module: &Module, version: &Version) -> Option<&Fetched> {
        self.descriptors.get(&(module.clone(), version.clone()))
    }

    fn attempted(&self, module: &Module, version: &Version) -> bool {
        let key = (module.clone(), version.clone());
        self.descriptors.contains_key(&key) || self.descriptor_errors.contains_key(&key)
    }
}

/// Result of planning one step
#[derive(Debug)]
pub(super) struct Plan {
    pub selected: BTreeMap<Module, Version>,
    pub graph: DependencyGraph,
    pub missing_listings: Vec<Module>,
    pub missing_descriptors: Vec<(Module, Version)>,
    pub conflicts: BTreeMap<Module, ResolutionError>,
}

impl Plan {
    /// Nothing left to fetch
    pub fn is_complete(&self) -> bool {
        self.missing_listings.is_empty() && self.missing_descriptors.is_empty()
    }
}

/// How a module was reached
struct Reach {
    /// Intersection of the exclusion sets inherited along every path
    exclusions: BTreeSet<Exclusion>,
    required: bool,
}

#[derive(Default)]
struct Walk {
    order: Vec<Module>,
    reach: BTreeMap<Module, Reach>,
    /// Requirement texts per module in discovery order
    requirements: BTreeMap<Module, Vec<String>>,
    queue: VecDeque<Module>,
}

impl Walk {
    /// Record a path to `module`; re-queue it when the path widens what it
    /// may pull in
    fn visit(&mut self, module: Module, exclusions: BTreeSet<Exclusion>, required: bool) {
        match self.reach.get_mut(&module) {
            None => {
                self.order.push(module.clone());
                self.reach.insert(module.clone(), Reach { exclusions, required });
                self.queue.push_back(module);
            }
            Some(reach) => {
                let narrowed: BTreeSet<Exclusion> =
                    reach.exclusions.intersection(&exclusions).cloned().collect();
                let promoted = required && !reach.required;

                if narrowed.len() != reach.exclusions.len() || promoted {
                    reach.exclusions = narrowed;
                    reach.required |= required;
                    self.queue.push_back(module);
                }
            }
        }
    }

    fn require(&mut self, module: &Module, version: &str) {
        let wanted = self.requirements.entry(module.clone()).or_default();
        if !wanted.iter().any(|w| w == version) {
            wanted.push(version.to_string());
        }
    }
}

enum Choice {
    Version(Version),
    NeedsListing,
    Failed(ResolutionError),
}

pub(super) fn plan(
    seeds: &[Seed],
    snapshot: &Snapshot,
    options: &ResolveOptions,
    pinned: &BTreeMap<Module, Version>,
) -> Plan {
    let mut walk = Walk::default();
    let mut roots: Vec<Module> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_keys: BTreeSet<(Module, Module)> = BTreeSet::new();

    for seed in seeds {
        let module = seed.coordinate.module.clone();
        walk.require(&module, &seed.coordinate.version);
        if !roots.contains(&module) {
            roots.push(module.clone());
        }
        walk.visit(module, seed.exclusions.clone(), true);
    }

    while let Some(module) = walk.queue.pop_front() {
        let Some(version) = snapshot.selected.get(&module) else {
            continue;
        };
        let Some(fetched) = snapshot.descriptor(&module, version) else {
            continue;
        };
        let (inherited, required) = match walk.reach.get(&module) {
            Some(reach) => (reach.exclusions.clone(), reach.required),
            None => continue,
        };

        for dependency in &fetched.descriptor.dependencies {
            if !options.scopes.contains(&dependency.scope) {
                continue;
            }
            if dependency.optional && !options.keep_optional {
                continue;
            }
            let target = dependency.module();
            if target == module || is_excluded(&inherited, &target) {
                continue;
            }

            if edge_keys.insert((module.clone(), target.clone())) {
                edges.push(Edge {
                    from: module.clone(),
                    from_version: version.clone(),
                    to: dependency.coordinate(),
                    scope: dependency.scope,
                    optional: dependency.optional,
                    exclusions: dependency.exclusions.clone(),
                });
            }
            walk.require(&target, &dependency.version);

            let mut exclusions = inherited.clone();
            exclusions.extend(dependency.exclusions.iter().cloned());
            walk.visit(target, exclusions, required && !dependency.optional);
        }
    }

    let mut selected = BTreeMap::new();
    let mut missing_listings = Vec::new();
    let mut conflicts = BTreeMap::new();

    for module in &walk.order {
        let wanted = walk.requirements.get(module).cloned().unwrap_or_default();
        match select(module, &wanted, snapshot, pinned) {
            Choice::Version(version) => {
                selected.insert(module.clone(), version);
            }
            Choice::NeedsListing => missing_listings.push(module.clone()),
            Choice::Failed(error) => {
                conflicts.insert(module.clone(), error);
            }
        }
    }

    // Edges out of a version that is no longer selected are stale, and so is
    // every module reached only through them
    edges.retain(|e| selected.get(&e.from) == Some(&e.from_version));
    let reachable = reachable_from(&roots, &edges);
    selected.retain(|module, _| reachable.contains(module));
    missing_listings.retain(|module| reachable.contains(module));
    conflicts.retain(|module, _| reachable.contains(module));
    edges.retain(|e| reachable.contains(&e.from));

    let missing_descriptors = selected
        .iter()
        .filter(|(module, version)| !snapshot.attempted(module, version))
        .map(|(module, version)| (module.clone(), version.clone()))
        .collect();

    let nodes = walk
        .order
        .iter()
        .filter(|module| reachable.contains(*module))
        .map(|module| {
            let version = selected.get(module).cloned();
            let fetched = version.as_ref().and_then(|v| snapshot.descriptor(module, v));
            ResolvedNode {
                module: module.clone(),
                repository: fetched.map(|f| f.repository.clone()),
                packaging: fetched.map(|f| f.descriptor.packaging.clone()),
                version,
                required: walk.reach.get(module).is_some_and(|r| r.required),
            }
        })
        .collect();

    Plan {
        selected,
        graph: DependencyGraph {
            roots,
            nodes,
            edges,
        },
        missing_listings,
        missing_descriptors,
        conflicts,
    }
}

/// Modules connected to a root over `edges`
fn reachable_from(roots: &[Module], edges: &[Edge]) -> BTreeSet<Module> {
    let mut reached: BTreeSet<Module> = roots.iter().cloned().collect();
    let mut queue: VecDeque<&Module> = roots.iter().collect();
    while let Some(module) = queue.pop_front() {
        for edge in edges.iter().filter(|e| &e.from == module) {
            if reached.insert(edge.to.module.clone()) {
                queue.push_back(&edge.to.module);
            }
        }
    }
    reached
}

/// Pick the version of one module from every requirement on it
///
/// A pinned version wins outright. Otherwise exact requirements are
/// candidates, and each flexible requirement not already met by an exact
/// candidate contributes the highest listed version it admits. The highest
/// candidate is selected.
///
/// Spellings such as `1.0` and `1.0.0` compare equal but address different
/// files. When the highest candidate is spelled more than one way, the
/// listing decides; if it is unavailable or carries none of the spellings,
/// the requirement discovered first wins.
fn select(
    module: &Module,
    wanted: &[String],
    snapshot: &Snapshot,
    pinned: &BTreeMap<Module, Version>,
) -> Choice {
    if let Some(version) = pinned.get(module) {
        return Choice::Version(version.clone());
    }

    let mut constraints = Vec::with_capacity(wanted.len());
    for requirement in wanted {
        match VersionConstraint::parse(requirement) {
            Ok(constraint) => constraints.push(constraint),
            Err(e) => {
                return Choice::Failed(ResolutionError::new(
                    module.clone(),
                    Some(requirement.clone()),
                    ErrorKind::ConflictUnresolvable(e.to_string()),
                ))
            }
        }
    }

    let exact: Vec<&Version> = constraints.iter().filter_map(|c| c.exact()).collect();
    let mut candidates: Vec<Version> = exact.iter().map(|v| (*v).clone()).collect();

    for constraint in constraints.iter().filter(|c| c.exact().is_none()) {
        let met = !matches!(constraint, VersionConstraint::Latest(_))
            && exact.iter().any(|v| constraint.matches(v));
        if met {
            continue;
        }

        match snapshot.listings.get(module) {
            Some(available) => {
                if let Some(version) = constraint.select(available) {
                    candidates.push(version.clone());
                }
            }
            None if snapshot.listing_errors.contains_key(module) => {}
            None => return Choice::NeedsListing,
        }
    }

    let Some(highest) = candidates.iter().max() else {
        return Choice::Failed(ResolutionError::new(
            module.clone(),
            None,
            ErrorKind::NoMatchingVersion {
                requirements: wanted.to_vec(),
            },
        ));
    };

    let spellings: Vec<&Version> = candidates.iter().filter(|c| *c == highest).collect();
    let first = spellings.first().copied().unwrap_or(highest);

    match snapshot.listings.get(module) {
        Some(available) => {
            let listed = spellings
                .iter()
                .find(|c| available.iter().any(|a| a.as_str() == c.as_str()));
            Choice::Version(listed.copied().unwrap_or(first).clone())
        }
        None if snapshot.listing_errors.contains_key(module) => Choice::Version(first.clone()),
        None if spellings.iter().any(|c| c.as_str() != first.as_str()) => Choice::NeedsListing,
        None => Choice::Version(first.clone()),
    }
}
