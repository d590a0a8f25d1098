// src/resolver/graph.rs

//! Resolved dependency graph
//!
//! Nodes live in an arena and are addressed by `NodeId`. Each node holds the
//! concrete package chosen for one logical name, why it is being installed,
//! and every requirement that led to it. Edges point from a package to the
//! packages it depends on.

use crate::catalog::{Dependency, DependencyKind, Package};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use strum_macros::Display;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Why a package is part of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InstallReason {
    /// Requested on the command line
    Explicit,
    /// Pulled in by another package
    Dependency,
}

/// One request that a node satisfies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Requesting package, `None` for a root request
    pub by: Option<String>,
    pub dependency: Dependency,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.by {
            Some(by) => write!(f, "{} (required by {})", self.dependency, by),
            None => write!(f, "{} (requested)", self.dependency),
        }
    }
}

/// A depends-on edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub to: NodeId,
    pub dependency: Dependency,
    pub kind: DependencyKind,
}

/// A chosen package within the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub package: Arc<Package>,
    pub reason: InstallReason,
    pub requirements: Vec<Requirement>,
    edges: Vec<Edge>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Outgoing edges in declaration order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Dependency graph for one resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package, or return the existing node carrying its name
    ///
    /// A node added both explicitly and as a dependency is explicit.
    pub fn add_node(&mut self, package: Arc<Package>, reason: InstallReason) -> NodeId {
        if let Some(&id) = self.by_name.get(&package.name) {
            if reason == InstallReason::Explicit {
                self.nodes[id.0].reason = InstallReason::Explicit;
            }
            return id;
        }

        let id = NodeId(self.nodes.len());
        self.by_name.insert(package.name.clone(), id);
        self.nodes.push(Node {
            id,
            package,
            reason,
            requirements: Vec::new(),
            edges: Vec::new(),
        });
        id
    }

    /// Add a depends-on edge; identical edges are stored once
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, dependency: Dependency, kind: DependencyKind) {
        let edge = Edge {
            to,
            dependency,
            kind,
        };
        let edges = &mut self.nodes[from.0].edges;
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    /// Record a requirement on a node; duplicates are dropped
    pub fn add_requirement(&mut self, id: NodeId, requirement: Requirement) {
        let node = &mut self.nodes[id.0];
        if requirement.by.is_none() {
            node.reason = InstallReason::Explicit;
        }
        if !node.requirements.contains(&requirement) {
            node.requirements.push(requirement);
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Node carrying exactly this package name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// A chosen node that satisfies `dep`, preferring an exact name match
    pub fn find_satisfier(&self, dep: &Dependency) -> Option<NodeId> {
        if let Some(id) = self.find(&dep.name) {
            if self.node(id).package.satisfies(dep) {
                return Some(id);
            }
        }
        self.nodes
            .iter()
            .filter(|n| n.package.satisfies(dep))
            .min_by(|a, b| a.name().cmp(b.name()))
            .map(|n| n.id)
    }

    pub fn dependencies(&self, id: NodeId) -> &[Edge] {
        &self.nodes[id.0].edges
    }

    /// Nodes with an edge to `id`, in arena order
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.edges.iter().any(|e| e.to == id))
            .map(|n| n.id)
            .collect()
    }

    /// Explicitly requested nodes
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.reason == InstallReason::Explicit)
            .map(|n| n.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Swap the package chosen for a node and drop its outgoing edges
    ///
    /// Requirements the old package placed on its dependencies are removed
    /// as well; they are recorded again when the node is expanded.
    pub(crate) fn replace_package(&mut self, id: NodeId, package: Arc<Package>) {
        let old_name = self.nodes[id.0].package.name.clone();
        let old_edges = std::mem::take(&mut self.nodes[id.0].edges);

        for edge in old_edges {
            self.nodes[edge.to.0]
                .requirements
                .retain(|r| r.by.as_deref() != Some(old_name.as_str()));
        }

        if old_name != package.name {
            self.by_name.remove(&old_name);
            self.by_name.insert(package.name.clone(), id);
        }
        self.nodes[id.0].package = package;
    }

    /// Drop nodes not reachable from an explicit root and renumber the rest
    ///
    /// Surviving nodes keep their relative order.
    pub(crate) fn prune(&mut self) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut queue: VecDeque<NodeId> = self.roots().into();
        for id in &queue {
            reachable[id.0] = true;
        }
        while let Some(id) = queue.pop_front() {
            for edge in &self.nodes[id.0].edges {
                if !reachable[edge.to.0] {
                    reachable[edge.to.0] = true;
                    queue.push_back(edge.to);
                }
            }
        }

        if reachable.iter().all(|&r| r) {
            return;
        }

        let mut remap = vec![None; self.nodes.len()];
        let mut next = 0;
        for (old, keep) in reachable.iter().enumerate() {
            if *keep {
                remap[old] = Some(NodeId(next));
                next += 1;
            }
        }

        let old_nodes = std::mem::take(&mut self.nodes);
        self.by_name.clear();
        for mut node in old_nodes {
            let Some(id) = remap[node.id.0] else {
                continue;
            };
            node.id = id;
            node.edges.retain_mut(|e| match remap[e.to.0] {
                Some(to) => {
                    e.to = to;
                    true
                }
                None => false,
            });
            self.by_name.insert(node.package.name.clone(), id);
            self.nodes.push(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceKind;
    use crate::version::Version;

    fn pkg(name: &str, version: &str) -> Arc<Package> {
        Arc::new(Package::new(
            name,
            Version::parse(version).unwrap(),
            SourceKind::SourceRepo,
        ))
    }

    #[test]
    fn test_add_node_merges_by_name() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(pkg("a", "1.0-1"), InstallReason::Dependency);
        let again = graph.add_node(pkg("a", "1.0-1"), InstallReason::Explicit);

        assert_eq!(a, again);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(a).reason, InstallReason::Explicit);
    }

    #[test]
    fn test_edges_and_dependents() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(pkg("a", "1.0-1"), InstallReason::Explicit);
        let b = graph.add_node(pkg("b", "1.0-1"), InstallReason::Dependency);
        let c = graph.add_node(pkg("c", "1.0-1"), InstallReason::Explicit);

        graph.add_edge(a, b, Dependency::new("b"), DependencyKind::Runtime);
        graph.add_edge(a, b, Dependency::new("b"), DependencyKind::Runtime);
        graph.add_edge(c, b, Dependency::new("b"), DependencyKind::Make);

        assert_eq!(graph.dependencies(a).len(), 1);
        assert_eq!(graph.dependents(b), vec![a, c]);
        assert_eq!(graph.roots(), vec![a, c]);
    }

    #[test]
    fn test_find_satisfier_prefers_exact_name() {
        let mut graph = DependencyGraph::new();
        let mut provider = Package::new("ash", Version::parse("1.0-1").unwrap(), SourceKind::BinaryRepo);
        provider.provides.push(crate::catalog::Provide::parse("sh").unwrap());
        let ash = graph.add_node(Arc::new(provider), InstallReason::Dependency);

        assert_eq!(graph.find_satisfier(&Dependency::new("sh")), Some(ash));

        let sh = graph.add_node(pkg("sh", "1.0-1"), InstallReason::Dependency);
        assert_eq!(graph.find_satisfier(&Dependency::new("sh")), Some(sh));
        assert_eq!(graph.find_satisfier(&Dependency::new("zsh")), None);
    }

    #[test]
    fn test_replace_package_drops_edges_and_requirements() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(pkg("a", "1.0-1"), InstallReason::Explicit);
        let b = graph.add_node(pkg("b", "1.0-1"), InstallReason::Dependency);
        graph.add_edge(a, b, Dependency::new("b"), DependencyKind::Runtime);
        graph.add_requirement(
            b,
            Requirement {
                by: Some("a".to_string()),
                dependency: Dependency::new("b"),
            },
        );

        graph.replace_package(a, pkg("a", "2.0-1"));
        assert!(graph.dependencies(a).is_empty());
        assert!(graph.node(b).requirements.is_empty());
        assert_eq!(graph.node(a).package.version.to_string(), "2.0-1");
    }

    #[test]
    fn test_prune_renumbers() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(pkg("a", "1.0-1"), InstallReason::Explicit);
        let _orphan = graph.add_node(pkg("orphan", "1.0-1"), InstallReason::Dependency);
        let c = graph.add_node(pkg("c", "1.0-1"), InstallReason::Dependency);
        graph.add_edge(a, c, Dependency::new("c"), DependencyKind::Runtime);

        graph.prune();
        assert_eq!(graph.len(), 2);
        assert!(graph.find("orphan").is_none());

        let c = graph.find("c").unwrap();
        assert_eq!(c, NodeId(1));
        assert_eq!(graph.dependencies(NodeId(0))[0].to, c);
        assert_eq!(graph.node(c).id, c);
    }
}
