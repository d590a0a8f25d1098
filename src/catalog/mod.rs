// src/catalog/mod.rs

//! Read-only package lookup across the installed, binary and source universes
//!
//! The installed snapshot is taken once when the catalog is created. Repository
//! queries are lazy but memoized, so every lookup of a name within one run
//! sees the same answer even if the remote side changes underneath.

mod package;

pub use package::{Dependency, DependencyKind, Package, Provide, SourceKind};

use crate::error::{Error, Result};
use crate::sources::{InstalledSource, RepoSource};
use crate::version::Constraint;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An installed package with a newer version available in the source repo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    pub name: String,
    pub installed: crate::version::Version,
    pub available: crate::version::Version,
}

/// Package lookup for a single resolution run
pub struct Catalog<'a> {
    installed: Vec<Arc<Package>>,
    installed_by_name: HashMap<String, usize>,
    binary: Box<dyn RepoSource + 'a>,
    source: Box<dyn RepoSource + 'a>,
    // name -> repository candidates
    cache: RefCell<HashMap<String, Arc<[Arc<Package>]>>>,
}

impl<'a> Catalog<'a> {
    /// Take the installed snapshot and wrap the two repository sources
    pub fn new(
        installed: &dyn InstalledSource,
        binary: Box<dyn RepoSource + 'a>,
        source: Box<dyn RepoSource + 'a>,
    ) -> Result<Self> {
        let mut packages = installed
            .list_installed()?
            .into_iter()
            .map(|p| p.into_package().map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        let installed_by_name = packages
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.name.clone(), idx))
            .collect();

        debug!("Catalog snapshot has {} installed packages", packages.len());

        Ok(Self {
            installed: packages,
            installed_by_name,
            binary,
            source,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// The installed package with exactly this name, if any
    pub fn installed(&self, name: &str) -> Option<&Arc<Package>> {
        self.installed_by_name.get(name).map(|&idx| &self.installed[idx])
    }

    /// All installed packages, sorted by name
    pub fn installed_packages(&self) -> &[Arc<Package>] {
        &self.installed
    }

    /// Every candidate named `name` or providing it, across all universes
    ///
    /// Ordered by source kind priority, then name, then version descending.
    pub fn lookup(&self, name: &str) -> Result<Vec<Arc<Package>>> {
        let mut candidates: Vec<Arc<Package>> = self
            .installed
            .iter()
            .filter(|p| p.answers_to(name))
            .cloned()
            .collect();
        candidates.extend(self.repo_candidates(name)?.iter().cloned());
        candidates.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| b.version.cmp(&a.version))
        });
        Ok(candidates)
    }

    fn repo_candidates(&self, name: &str) -> Result<Arc<[Arc<Package>]>> {
        if let Some(hit) = self.cache.borrow().get(name) {
            return Ok(Arc::clone(hit));
        }

        let mut found = Vec::new();
        for repo in [&self.binary, &self.source] {
            let kind = repo.kind();
            for record in repo.query(name)? {
                // Sources may return loose matches; keep only real answers
                if record.answers_to(name) {
                    found.push(Arc::new(record.into_package(kind)?));
                }
            }
        }
        debug!("Query '{}' returned {} repository candidates", name, found.len());

        let found: Arc<[Arc<Package>]> = found.into();
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Arc::clone(&found));
        Ok(found)
    }

    /// Pick the best package for a single requirement
    pub fn best_candidate(&self, dep: &Dependency, required_by: Option<&str>) -> Result<Arc<Package>> {
        let constraints: Vec<Constraint> = dep.constraint.iter().cloned().collect();
        self.best_candidate_all(&dep.name, &constraints, required_by)
    }

    /// Pick the best package satisfying every constraint on `name`
    ///
    /// Policy: keep only candidates satisfying all constraints; take the
    /// highest-priority source kind present (installed, then binary, then
    /// source); within it prefer an exact name match over providers, then the
    /// highest version, then the lexically smallest name.
    pub fn best_candidate_all(
        &self,
        name: &str,
        constraints: &[Constraint],
        required_by: Option<&str>,
    ) -> Result<Arc<Package>> {
        self.best_candidate_for(name, &constrained(name, constraints), required_by)
    }

    /// Pick the best package answering to `name` that satisfies every
    /// dependency in `wanted`
    ///
    /// Used when one chosen package must serve several requirements, some
    /// of which may name it through a provide.
    pub fn best_candidate_for(
        &self,
        name: &str,
        wanted: &[Dependency],
        required_by: Option<&str>,
    ) -> Result<Arc<Package>> {
        self.select(name, wanted, |_| true)?
            .ok_or_else(|| self.unsatisfiable(name, wanted, required_by))
    }

    /// The error for `wanted` having no common candidate named `name`
    pub fn unsatisfiable(&self, name: &str, wanted: &[Dependency], required_by: Option<&str>) -> Error {
        let constraints: Vec<Constraint> = wanted
            .iter()
            .filter(|d| d.name == name)
            .filter_map(|d| d.constraint.clone())
            .collect();
        unresolvable(name, &constraints, required_by)
    }

    /// Like `best_candidate_all`, but never prefers an installed package that
    /// a repository can upgrade
    pub fn best_upgrade_candidate(
        &self,
        name: &str,
        constraints: &[Constraint],
        required_by: Option<&str>,
    ) -> Result<Arc<Package>> {
        let newest_repo = self
            .select(name, &constrained(name, constraints), |p| {
                p.kind != SourceKind::Installed
            })?
            .filter(|p| p.name == name);

        match (self.installed(name), newest_repo) {
            (Some(inst), Some(repo)) if repo.version > inst.version => Ok(repo),
            _ => self.best_candidate_all(name, constraints, required_by),
        }
    }

    fn select(
        &self,
        name: &str,
        wanted: &[Dependency],
        allow: impl Fn(&Package) -> bool,
    ) -> Result<Option<Arc<Package>>> {
        Ok(self
            .lookup(name)?
            .into_iter()
            .filter(|p| allow(p) && wanted.iter().all(|d| p.satisfies(d)))
            .min_by(|a, b| rank(name, a, b)))
    }

    /// Find installed packages that the source repository has newer versions of
    ///
    /// Only foreign packages are considered: anything the binary repository
    /// knows by name is upgraded by the system package manager instead.
    pub fn outdated(&self) -> Result<Vec<Upgrade>> {
        let mut upgrades = Vec::new();

        for inst in &self.installed {
            let candidates = self.repo_candidates(&inst.name)?;
            let in_binary = candidates
                .iter()
                .any(|p| p.kind == SourceKind::BinaryRepo && p.name == inst.name);
            if in_binary {
                continue;
            }

            let newest = candidates
                .iter()
                .filter(|p| p.kind == SourceKind::SourceRepo && p.name == inst.name)
                .max_by(|a, b| a.version.cmp(&b.version));

            if let Some(newer) = newest.filter(|p| p.version > inst.version) {
                upgrades.push(Upgrade {
                    name: inst.name.clone(),
                    installed: inst.version.clone(),
                    available: newer.version.clone(),
                });
            }
        }

        Ok(upgrades)
    }
}

/// Requirements on `name` carrying each constraint, or a bare one
fn constrained(name: &str, constraints: &[Constraint]) -> Vec<Dependency> {
    let mut wanted = vec![Dependency::new(name)];
    wanted.extend(
        constraints
            .iter()
            .map(|c| Dependency::with_constraint(name, c.clone())),
    );
    wanted
}

/// Ordering used for candidate selection; smaller is better
fn rank(name: &str, a: &Package, b: &Package) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| (a.name != name).cmp(&(b.name != name)))
        .then_with(|| b.version.cmp(&a.version))
        .then_with(|| a.name.cmp(&b.name))
}

fn unresolvable(name: &str, constraints: &[Constraint], required_by: Option<&str>) -> Error {
    let constraint = if constraints.is_empty() {
        None
    } else {
        Some(
            constraints
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        )
    };
    Error::Unresolvable {
        name: name.to_string(),
        constraint,
        required_by: required_by.map(str::to_string),
    }
}
