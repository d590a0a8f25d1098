// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use blinky::build::Executor;
use blinky::catalog::Catalog;
use blinky::scheduler::PlannedPackage;
use blinky::sources::{InstalledPackage, PackageRecord, Snapshot};
use std::sync::Mutex;

/// Fluent builder for in-memory package universes
#[derive(Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(mut self, name: &str, version: &str) -> Self {
        self.snapshot
            .installed
            .push(InstalledPackage::new(name, version));
        self
    }

    pub fn binary(mut self, name: &str, version: &str, depends: &[&str]) -> Self {
        self.snapshot.binary.push(record(name, version, depends));
        self
    }

    pub fn source(mut self, name: &str, version: &str, depends: &[&str]) -> Self {
        self.snapshot.source.push(record(name, version, depends));
        self
    }

    /// Add a fully specified source record
    pub fn source_record(mut self, record: PackageRecord) -> Self {
        self.snapshot.source.push(record);
        self
    }

    /// Add a fully specified binary record
    pub fn binary_record(mut self, record: PackageRecord) -> Self {
        self.snapshot.binary.push(record);
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

pub fn record(name: &str, version: &str, depends: &[&str]) -> PackageRecord {
    let mut rec = PackageRecord::new(name, version);
    rec.depends = depends.iter().map(|d| d.to_string()).collect();
    rec
}

/// Catalog over every universe of a snapshot
pub fn catalog(snapshot: &Snapshot) -> Catalog<'_> {
    Catalog::new(
        snapshot,
        Box::new(snapshot.binary_repo()),
        Box::new(snapshot.source_repo()),
    )
    .unwrap()
}

pub fn roots(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Executor that records every call and fails the configured names
#[derive(Default)]
pub struct MockExecutor {
    fail: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Recorded calls as `bin:<name>` or `src:<name>`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn act(&self, kind: &str, package: &PlannedPackage) -> Result<(), String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{kind}:{}", package.name()));
        if self.fail.iter().any(|f| f == package.name()) {
            Err(format!("{} exited with status 1", package.name()))
        } else {
            Ok(())
        }
    }
}

impl Executor for MockExecutor {
    fn install_binary(&self, package: &PlannedPackage) -> Result<(), String> {
        self.act("bin", package)
    }

    fn build_and_install_source(&self, package: &PlannedPackage) -> Result<(), String> {
        self.act("src", package)
    }
}
