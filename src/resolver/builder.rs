// src/resolver/builder.rs

//! Breadth-first graph construction
//!
//! Roots are resolved first, then each chosen package is expanded in
//! discovery order. Every requirement is matched against already chosen
//! packages before the catalog is consulted, so diamonds converge on one
//! node. When a chosen package no longer satisfies a newly seen constraint
//! on its name, a replacement satisfying all recorded requirements is
//! selected and re-expanded in place. A name is reselected at most once per
//! candidate it has; past that the requirements on it are unresolvable.
//!
//! Conflicts are checked once, over the pruned graph, so packages dropped by
//! a replacement never cause a conflict.

use super::graph::{DependencyGraph, InstallReason, NodeId, Requirement};
use crate::catalog::{Catalog, Dependency};
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Knobs for one resolution run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Follow check dependencies of source packages
    pub check_depends: bool,
    /// Prefer a newer repository version over an installed one for roots
    pub upgrade_roots: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            check_depends: true,
            upgrade_roots: false,
        }
    }
}

/// Builds a `DependencyGraph` from root names against a catalog
pub struct GraphBuilder<'c, 'a> {
    catalog: &'c Catalog<'a>,
    options: ResolveOptions,
}

/// Mutable state of one `build` call
#[derive(Default)]
struct BuildState {
    graph: DependencyGraph,
    // BFS parent of each non-root node, used for error chains
    parent: HashMap<NodeId, NodeId>,
    queue: VecDeque<NodeId>,
    // Reselections per name, bounded by its candidate count
    reselected: HashMap<String, usize>,
}

impl BuildState {
    /// Package names from a root down to `id`
    fn chain(&self, id: NodeId) -> Vec<String> {
        let mut chain = vec![self.graph.node(id).name().to_string()];
        let mut current = id;
        while let Some(&parent) = self.parent.get(&current) {
            if chain.len() > self.graph.len() {
                break;
            }
            chain.push(self.graph.node(parent).name().to_string());
            current = parent;
        }
        chain.reverse();
        chain
    }

    fn record(&mut self, id: NodeId, from: Option<NodeId>, dep: &Dependency) {
        let by = from.map(|f| self.graph.node(f).name().to_string());
        self.graph.add_requirement(
            id,
            Requirement {
                by,
                dependency: dep.clone(),
            },
        );
    }
}

impl<'c, 'a> GraphBuilder<'c, 'a> {
    pub fn new(catalog: &'c Catalog<'a>) -> Self {
        Self {
            catalog,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `roots` and all their transitive dependencies
    ///
    /// Each root is a dependency string, so `foo>=2` may be requested.
    pub fn build(&self, roots: &[String]) -> Result<DependencyGraph> {
        let mut state = BuildState::default();

        for root in roots {
            let dep = Dependency::parse(root)?;
            self.require(&mut state, None, &dep)?;
        }

        while let Some(id) = state.queue.pop_front() {
            self.expand(&mut state, id)?;
        }

        state.graph.prune();
        check_conflicts(&state.graph)?;
        info!(
            "Resolved {} packages for {} requested",
            state.graph.len(),
            roots.len()
        );
        Ok(state.graph)
    }

    /// Link every requirement of a node to a chosen package
    fn expand(&self, state: &mut BuildState, id: NodeId) -> Result<()> {
        let package = Arc::clone(&state.graph.node(id).package);
        debug!("Expanding {}", package);

        for (kind, dep) in package.requirements(self.options.check_depends) {
            if package.satisfies(dep) {
                continue;
            }
            let target = self.require(state, Some(id), dep)?;

            // The node itself was replaced and re-queued; its old edges are gone
            if !Arc::ptr_eq(&state.graph.node(id).package, &package) {
                return Ok(());
            }
            if target != id {
                state.graph.add_edge(id, target, dep.clone(), kind);
            }
        }
        Ok(())
    }

    /// Find or choose the node that serves `dep`
    fn require(&self, state: &mut BuildState, from: Option<NodeId>, dep: &Dependency) -> Result<NodeId> {
        if let Some(existing) = state.graph.find_satisfier(dep) {
            state.record(existing, from, dep);
            return Ok(existing);
        }

        if let Some(existing) = state.graph.find(&dep.name) {
            return self.reselect(state, existing, from, dep);
        }

        let by = from.map(|f| state.graph.node(f).name().to_string());
        let chosen = match (from, self.options.upgrade_roots) {
            (None, true) => {
                let constraints: Vec<_> = dep.constraint.iter().cloned().collect();
                self.catalog.best_upgrade_candidate(&dep.name, &constraints, None)
            }
            _ => self.catalog.best_candidate(dep, by.as_deref()),
        };
        let package = match (chosen, from) {
            (Ok(package), _) => package,
            (Err(Error::Unresolvable { .. }), Some(from)) => {
                return Err(Error::UnresolvedDependency {
                    chain: state.chain(from),
                    dependency: dep.to_string(),
                });
            }
            (Err(e), _) => return Err(e),
        };

        // Reached through a provide while another version is already chosen
        if let Some(existing) = state.graph.find(&package.name) {
            return self.reselect(state, existing, from, dep);
        }

        let reason = match from {
            Some(_) => InstallReason::Dependency,
            None => InstallReason::Explicit,
        };
        debug!("Chose {} for {}", package, dep);
        let id = state.graph.add_node(package, reason);
        if let Some(from) = from {
            state.parent.insert(id, from);
        }
        state.record(id, from, dep);
        state.queue.push_back(id);
        Ok(id)
    }

    /// Replace a chosen package with one satisfying all its requirements plus `dep`
    fn reselect(
        &self,
        state: &mut BuildState,
        existing: NodeId,
        from: Option<NodeId>,
        dep: &Dependency,
    ) -> Result<NodeId> {
        let node = state.graph.node(existing);
        let name = node.name().to_string();
        let mut wanted: Vec<Dependency> = node
            .requirements
            .iter()
            .map(|r| r.dependency.clone())
            .collect();
        wanted.push(dep.clone());

        let by = from.map(|f| state.graph.node(f).name().to_string());
        let limit = self.catalog.lookup(&name)?.len();
        let count = state.reselected.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count > limit {
            debug!("Giving up on {} after {} reselections", name, limit);
            return Err(self.catalog.unsatisfiable(&name, &wanted, by.as_deref()));
        }

        let package = self
            .catalog
            .best_candidate_for(&name, &wanted, by.as_deref())?;

        info!(
            "Replacing {} with {} to satisfy {}",
            state.graph.node(existing).package,
            package,
            dep
        );
        state.graph.replace_package(existing, package);
        state.record(existing, from, dep);
        state.queue.push_back(existing);
        Ok(existing)
    }
}

/// Fail on the first pair of nodes where either side conflicts with the other
///
/// Pairs are visited in discovery order; the later node is reported as
/// `package`.
fn check_conflicts(graph: &DependencyGraph) -> Result<()> {
    let nodes = graph.nodes();
    for (i, node) in nodes.iter().enumerate() {
        for earlier in &nodes[..i] {
            if node.package.conflicts_with(&earlier.package)
                || earlier.package.conflicts_with(&node.package)
            {
                return Err(Error::Conflict {
                    package: node.name().to_string(),
                    other: earlier.name().to_string(),
                });
            }
        }
    }
    Ok(())
}
