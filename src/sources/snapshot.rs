// src/sources/snapshot.rs

//! In-memory package universe
//!
//! A snapshot holds the installed list plus binary and source repository
//! records. It can be loaded from a TOML file for offline planning:
//!
//! ```toml
//! [[installed]]
//! name = "glibc"
//! version = "2.39-1"
//!
//! [[binary]]
//! name = "cmake"
//! version = "3.29.2-1"
//! depends = ["curl", "expat>=2.6"]
//!
//! [[source]]
//! name = "yay"
//! version = "12.3.5-1"
//! depends = ["pacman>6.1", "git"]
//! make_depends = ["go>=1.21"]
//! ```

use super::{InstalledPackage, InstalledSource, PackageRecord, RepoSource};
use crate::catalog::SourceKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub installed: Vec<InstalledPackage>,
    #[serde(default)]
    pub binary: Vec<PackageRecord>,
    #[serde(default)]
    pub source: Vec<PackageRecord>,
    #[serde(skip)]
    queries: AtomicUsize,
}

impl Snapshot {
    /// Load a snapshot from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(
            "Loaded snapshot {}: {} installed, {} binary, {} source",
            path.display(),
            snapshot.installed.len(),
            snapshot.binary.len(),
            snapshot.source.len()
        );
        Ok(snapshot)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// View of the binary repository records
    pub fn binary_repo(&self) -> SnapshotRepo<'_> {
        SnapshotRepo {
            snapshot: self,
            kind: SourceKind::BinaryRepo,
        }
    }

    /// View of the source repository records
    pub fn source_repo(&self) -> SnapshotRepo<'_> {
        SnapshotRepo {
            snapshot: self,
            kind: SourceKind::SourceRepo,
        }
    }

    /// Number of repository queries answered so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn records(&self, kind: SourceKind) -> &[PackageRecord] {
        match kind {
            SourceKind::BinaryRepo => &self.binary,
            SourceKind::SourceRepo => &self.source,
            SourceKind::Installed => &[],
        }
    }
}

impl InstalledSource for Snapshot {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        Ok(self.installed.clone())
    }
}

/// One repository of a snapshot
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRepo<'a> {
    snapshot: &'a Snapshot,
    kind: SourceKind,
}

impl RepoSource for SnapshotRepo<'_> {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn query(&self, name: &str) -> Result<Vec<PackageRecord>> {
        self.snapshot.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .snapshot
            .records(self.kind)
            .iter()
            .filter(|r| r.answers_to(name))
            .cloned()
            .collect())
    }
}
