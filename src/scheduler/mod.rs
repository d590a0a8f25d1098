// src/scheduler/mod.rs

//! Build ordering
//!
//! `schedule` rejects cyclic graphs and otherwise layers the graph with
//! Kahn's algorithm: tier 0 holds packages without dependencies and every
//! later tier only depends on earlier ones. Members of one tier are
//! independent of each other and can be built in parallel.

mod cycle;

pub use cycle::find_cycle;

use crate::catalog::Package;
use crate::error::{Error, Result};
use crate::resolver::{DependencyGraph, InstallReason, NodeId, Requirement};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One package scheduled for build or install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPackage {
    pub package: Arc<Package>,
    pub reason: InstallReason,
    /// Names of the direct dependencies in the graph, sorted
    pub dependencies: Vec<String>,
    /// Every request this package satisfies
    pub requirements: Vec<Requirement>,
}

impl PlannedPackage {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// True if the installed version already meets every request
    pub fn requirements_met(&self) -> bool {
        self.requirements
            .iter()
            .all(|r| self.package.satisfies(&r.dependency))
    }
}

/// A set of mutually independent packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tier {
    pub packages: Vec<PlannedPackage>,
}

/// Tiered build order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub tiers: Vec<Tier>,
}

impl BuildPlan {
    /// All planned packages in build order
    pub fn flatten(&self) -> Vec<&PlannedPackage> {
        self.tiers.iter().flat_map(|t| t.packages.iter()).collect()
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(|t| t.packages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<&PlannedPackage> {
        self.flatten().into_iter().find(|p| p.name() == name)
    }

    /// Index of the tier holding `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tiers
            .iter()
            .position(|t| t.packages.iter().any(|p| p.name() == name))
    }

    /// Explicitly requested packages, in build order
    pub fn roots(&self) -> Vec<&PlannedPackage> {
        self.flatten()
            .into_iter()
            .filter(|p| p.reason == InstallReason::Explicit)
            .collect()
    }
}

impl fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Nothing to do");
        }
        for (idx, tier) in self.tiers.iter().enumerate() {
            writeln!(f, "Tier {}:", idx + 1)?;
            for planned in &tier.packages {
                write!(f, "  {} ({})", planned.package, planned.reason)?;
                if !planned.dependencies.is_empty() {
                    write!(f, " <- {}", planned.dependencies.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        write!(f, "{} packages in {} tiers", self.len(), self.tiers.len())
    }
}

/// Order a resolved graph into build tiers
pub fn schedule(graph: &DependencyGraph) -> Result<BuildPlan> {
    if let Some(path) = find_cycle(graph) {
        return Err(Error::Cycle { path });
    }

    let n = graph.len();
    let deps: Vec<BTreeSet<NodeId>> = graph
        .nodes()
        .iter()
        .map(|node| node.edges().iter().map(|e| e.to).collect())
        .collect();
    let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    for (id, targets) in deps.iter().enumerate() {
        for target in targets {
            dependents[target.0].push(NodeId(id));
        }
    }

    let mut remaining: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: Vec<NodeId> = (0..n).filter(|&i| remaining[i] == 0).map(NodeId).collect();
    let mut tiers = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
        ready.sort_by(|a, b| graph.node(*a).name().cmp(graph.node(*b).name()));
        let mut next = Vec::new();
        for id in &ready {
            for &dependent in &dependents[id.0] {
                remaining[dependent.0] -= 1;
                if remaining[dependent.0] == 0 {
                    next.push(dependent);
                }
            }
        }

        placed += ready.len();
        let packages = ready
            .iter()
            .map(|&id| planned(graph, id, &deps[id.0]))
            .collect();
        tiers.push(Tier { packages });
        ready = next;
    }

    if placed != n {
        // find_cycle already ruled this out
        return Err(Error::Cycle { path: Vec::new() });
    }

    debug!("Scheduled {} packages into {} tiers", n, tiers.len());
    Ok(BuildPlan { tiers })
}

fn planned(graph: &DependencyGraph, id: NodeId, deps: &BTreeSet<NodeId>) -> PlannedPackage {
    let node = graph.node(id);
    let mut dependencies: Vec<String> = deps
        .iter()
        .map(|d| graph.node(*d).name().to_string())
        .collect();
    dependencies.sort();
    PlannedPackage {
        package: Arc::clone(&node.package),
        reason: node.reason,
        dependencies,
        requirements: node.requirements.clone(),
    }
}
