// src/sources/mod.rs

//! Package universes the catalog reads from
//!
//! Three kinds of collaborators feed the catalog:
//! - `InstalledSource`: the local package database, read once per run
//! - `RepoSource` for prebuilt binary repositories (pacman sync databases)
//! - `RepoSource` for source repositories (the AUR)
//!
//! Production implementations shell out to pacman (`pacman`) or talk to the
//! AUR RPC interface (`aur`). `snapshot` holds everything in memory and is
//! used for offline planning and tests.

pub mod aur;
pub mod pacman;
pub mod snapshot;

use crate::catalog::{Dependency, Package, Provide, SourceKind};
use crate::error::Result;
use crate::version::Version;
use serde::{Deserialize, Serialize};

pub use aur::AurClient;
pub use pacman::{PacmanInstalled, PacmanSync};
pub use snapshot::Snapshot;

/// One entry of the installed-package snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub provides: Vec<String>,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            provides: Vec::new(),
        }
    }

    pub fn into_package(self) -> Result<Package> {
        let mut pkg = Package::new(self.name, Version::parse(&self.version)?, SourceKind::Installed);
        pkg.provides = parse_all(&self.provides, Provide::parse)?;
        Ok(pkg)
    }
}

/// Raw package metadata as returned by a repository query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    pub version: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub make_depends: Vec<String>,
    #[serde(default)]
    pub check_depends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Check whether this record is named `name` or provides it
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name
            || self.provides.iter().any(|p| {
                p.split_once('=').map_or(p.as_str(), |(n, _)| n).trim() == name
            })
    }

    /// Convert into a catalog package of the given kind
    pub fn into_package(self, kind: SourceKind) -> Result<Package> {
        let mut pkg = Package::new(self.name, Version::parse(&self.version)?, kind);
        if let Some(base) = self.base {
            pkg.base = base;
        }
        pkg.depends = parse_all(&self.depends, Dependency::parse)?;
        pkg.make_depends = parse_all(&self.make_depends, Dependency::parse)?;
        pkg.check_depends = parse_all(&self.check_depends, Dependency::parse)?;
        pkg.provides = parse_all(&self.provides, Provide::parse)?;
        pkg.conflicts = parse_all(&self.conflicts, Dependency::parse)?;
        Ok(pkg)
    }
}

fn parse_all<T>(items: &[String], parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    items.iter().map(|s| parse(s)).collect()
}

/// Snapshot of the local package database
pub trait InstalledSource {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>>;
}

/// A queryable repository of installable packages
pub trait RepoSource {
    /// Which universe this source represents (`BinaryRepo` or `SourceRepo`)
    fn kind(&self) -> SourceKind;

    /// Return every package named `name` or providing it
    fn query(&self, name: &str) -> Result<Vec<PackageRecord>>;
}

impl<T: InstalledSource + ?Sized> InstalledSource for &T {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        (**self).list_installed()
    }
}

impl<T: RepoSource + ?Sized> RepoSource for &T {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn query(&self, name: &str) -> Result<Vec<PackageRecord>> {
        (**self).query(name)
    }
}

impl<T: RepoSource + ?Sized> RepoSource for Box<T> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn query(&self, name: &str) -> Result<Vec<PackageRecord>> {
        (**self).query(name)
    }
}
