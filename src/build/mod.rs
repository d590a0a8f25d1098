// src/build/mod.rs

//! Tier-by-tier build orchestration
//!
//! Tiers run strictly in order. Members of one tier are independent and are
//! handed to a bounded rayon pool; each worker writes only its own entry of
//! the shared result map. A package whose dependency failed is marked
//! `Blocked` without running its action, and siblings that do not depend on
//! the failure proceed normally.

pub mod makepkg;

pub use makepkg::MakepkgExecutor;

use crate::catalog::SourceKind;
use crate::progress::{ProgressTracker, SilentProgress};
use crate::scheduler::{BuildPlan, PlannedPackage};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal state of one planned package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildResult {
    /// Already installed at a version meeting every request
    Skipped,
    Succeeded,
    Failed { reason: String },
    /// Not attempted because these failed packages are among its ancestors
    Blocked { by: BTreeSet<String> },
    /// Not reached because the run was cancelled
    Cancelled,
}

impl BuildResult {
    /// True for `Skipped` and `Succeeded`
    pub fn is_ok(&self) -> bool {
        matches!(self, BuildResult::Skipped | BuildResult::Succeeded)
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildResult::Skipped => write!(f, "skipped"),
            BuildResult::Succeeded => write!(f, "succeeded"),
            BuildResult::Failed { reason } => write!(f, "failed: {reason}"),
            BuildResult::Blocked { by } => {
                let by: Vec<&str> = by.iter().map(String::as_str).collect();
                write!(f, "blocked by {}", by.join(", "))
            }
            BuildResult::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Build and install actions for planned packages
///
/// Calls may block for a long time; they are made from worker threads.
pub trait Executor: Send + Sync {
    fn install_binary(&self, package: &PlannedPackage) -> std::result::Result<(), String>;

    fn build_and_install_source(&self, package: &PlannedPackage) -> std::result::Result<(), String>;
}

/// Cooperative cancellation flag, checked before each tier starts
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final per-package results of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    results: BTreeMap<String, BuildResult>,
}

impl BuildReport {
    pub fn get(&self, name: &str) -> Option<&BuildResult> {
        self.results.get(name)
    }

    /// Results sorted by package name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BuildResult)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Requested packages that ended `Skipped` or `Succeeded`
    pub fn succeeded_roots<'p>(&self, plan: &'p BuildPlan) -> Vec<&'p str> {
        plan.roots()
            .into_iter()
            .map(PlannedPackage::name)
            .filter(|name| self.get(name).is_some_and(BuildResult::is_ok))
            .collect()
    }

    /// True if every requested package ended `Skipped` or `Succeeded`
    pub fn all_roots_ok(&self, plan: &BuildPlan) -> bool {
        plan.roots()
            .iter()
            .all(|p| self.get(p.name()).is_some_and(BuildResult::is_ok))
    }

    /// Packages that did not end `Skipped` or `Succeeded`
    pub fn failures(&self) -> Vec<(&str, &BuildResult)> {
        self.iter().filter(|(_, r)| !r.is_ok()).collect()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.results.keys().map(String::len).max().unwrap_or(0);
        for (name, result) in &self.results {
            writeln!(f, "  {name:<width$}  {result}")?;
        }
        Ok(())
    }
}

/// Runs a build plan against an executor
pub struct Orchestrator<'e> {
    executor: &'e dyn Executor,
    concurrency: usize,
    cancel: CancelToken,
    progress: Arc<dyn ProgressTracker>,
}

impl<'e> Orchestrator<'e> {
    pub fn new(executor: &'e dyn Executor) -> Self {
        Self {
            executor,
            concurrency: 1,
            cancel: CancelToken::new(),
            progress: Arc::new(SilentProgress::new()),
        }
    }

    /// Maximum number of packages processed at once within a tier
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Process every tier and return the result of each planned package
    pub fn run(&self, plan: &BuildPlan) -> BuildReport {
        let results: DashMap<String, BuildResult> = DashMap::new();
        self.progress.set_length(plan.len() as u64);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|i| format!("blinky-build-{i}"))
            .build()
            .map_err(|e| warn!("Failed to start build pool, building sequentially: {}", e))
            .ok();

        for (idx, tier) in plan.tiers.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled before tier {}", idx + 1);
                for planned in plan.tiers[idx..].iter().flat_map(|t| t.packages.iter()) {
                    results.insert(planned.name().to_string(), BuildResult::Cancelled);
                    self.progress.increment(1);
                }
                break;
            }

            debug!("Starting tier {} with {} packages", idx + 1, tier.packages.len());
            let work = |planned: &PlannedPackage| {
                let result = self.process(planned, &results);
                results.insert(planned.name().to_string(), result);
                self.progress.increment(1);
            };
            match &pool {
                Some(pool) => pool.install(|| tier.packages.par_iter().for_each(work)),
                None => tier.packages.iter().for_each(work),
            }
        }

        let report = BuildReport {
            results: results.into_iter().collect(),
        };
        if report.failures().is_empty() {
            self.progress.finish_with_message("done");
        } else {
            self.progress
                .finish_with_error(&format!("{} packages not installed", report.failures().len()));
        }
        report
    }

    fn process(&self, planned: &PlannedPackage, results: &DashMap<String, BuildResult>) -> BuildResult {
        let blockers = blockers(planned, results);
        if !blockers.is_empty() {
            info!("Skipping {}: blocked by failed dependencies", planned.name());
            return BuildResult::Blocked { by: blockers };
        }

        let outcome = match planned.package.kind {
            SourceKind::Installed if planned.requirements_met() => return BuildResult::Skipped,
            SourceKind::Installed => Err(format!(
                "installed version {} does not satisfy every requirement",
                planned.package.version
            )),
            SourceKind::BinaryRepo => {
                self.progress.set_message(&format!("installing {}", planned.name()));
                self.executor.install_binary(planned)
            }
            SourceKind::SourceRepo => {
                self.progress.set_message(&format!("building {}", planned.name()));
                self.executor.build_and_install_source(planned)
            }
        };

        match outcome {
            Ok(()) => {
                info!("Installed {}", planned.package);
                BuildResult::Succeeded
            }
            Err(reason) => {
                warn!("{} failed: {}", planned.name(), reason);
                BuildResult::Failed { reason }
            }
        }
    }
}

/// Failed ancestors reachable through the direct dependencies of `planned`
fn blockers(planned: &PlannedPackage, results: &DashMap<String, BuildResult>) -> BTreeSet<String> {
    let mut by = BTreeSet::new();
    for dep in &planned.dependencies {
        match results.get(dep).as_deref() {
            Some(BuildResult::Failed { .. }) | Some(BuildResult::Cancelled) => {
                by.insert(dep.clone());
            }
            Some(BuildResult::Blocked { by: upstream }) => {
                by.extend(upstream.iter().cloned());
            }
            Some(BuildResult::Skipped) | Some(BuildResult::Succeeded) => {}
            None => {
                // Dependencies always belong to an earlier tier
                by.insert(dep.clone());
            }
        }
    }
    by
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Package;
    use crate::resolver::{InstallReason, Requirement};
    use crate::scheduler::Tier;
    use crate::version::Version;
    use std::sync::Mutex;

    /// Records every call; fails the packages named in `fail`
    #[derive(Default)]
    struct RecordingExecutor {
        fail: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn failing(names: &[&str]) -> Self {
            Self {
                fail: names.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn act(&self, kind: &str, package: &PlannedPackage) -> std::result::Result<(), String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{kind}:{}", package.name()));
            if self.fail.iter().any(|f| f == package.name()) {
                Err("exit status 1".to_string())
            } else {
                Ok(())
            }
        }
    }

    impl Executor for RecordingExecutor {
        fn install_binary(&self, package: &PlannedPackage) -> std::result::Result<(), String> {
            self.act("bin", package)
        }

        fn build_and_install_source(&self, package: &PlannedPackage) -> std::result::Result<(), String> {
            self.act("src", package)
        }
    }

    fn planned(name: &str, kind: SourceKind, deps: &[&str], reason: InstallReason) -> PlannedPackage {
        PlannedPackage {
            package: Arc::new(Package::new(name, Version::parse("1.0-1").unwrap(), kind)),
            reason,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            requirements: Vec::new(),
        }
    }

    fn plan(tiers: Vec<Vec<PlannedPackage>>) -> BuildPlan {
        BuildPlan {
            tiers: tiers.into_iter().map(|packages| Tier { packages }).collect(),
        }
    }

    #[test]
    fn test_partial_failure_isolated() {
        let plan = plan(vec![
            vec![planned("a", SourceKind::SourceRepo, &[], InstallReason::Dependency)],
            vec![
                planned("b", SourceKind::SourceRepo, &["a"], InstallReason::Explicit),
                planned("c", SourceKind::BinaryRepo, &[], InstallReason::Explicit),
            ],
        ]);
        let executor = RecordingExecutor::failing(&["a"]);
        let report = Orchestrator::new(&executor).with_concurrency(2).run(&plan);

        assert!(matches!(report.get("a"), Some(BuildResult::Failed { .. })));
        assert_eq!(
            report.get("b"),
            Some(&BuildResult::Blocked {
                by: BTreeSet::from(["a".to_string()])
            })
        );
        assert_eq!(report.get("c"), Some(&BuildResult::Succeeded));
        assert!(!report.all_roots_ok(&plan));
        assert_eq!(report.succeeded_roots(&plan), vec!["c"]);

        let calls = executor.calls.lock().unwrap();
        assert!(!calls.contains(&"src:b".to_string()));
    }

    #[test]
    fn test_blocked_propagates_root_cause() {
        let plan = plan(vec![
            vec![planned("a", SourceKind::SourceRepo, &[], InstallReason::Dependency)],
            vec![planned("b", SourceKind::SourceRepo, &["a"], InstallReason::Dependency)],
            vec![planned("c", SourceKind::SourceRepo, &["b"], InstallReason::Explicit)],
        ]);
        let executor = RecordingExecutor::failing(&["a"]);
        let report = Orchestrator::new(&executor).run(&plan);

        assert_eq!(
            report.get("c"),
            Some(&BuildResult::Blocked {
                by: BTreeSet::from(["a".to_string()])
            })
        );
        assert_eq!(report.failures().len(), 3);
    }

    #[test]
    fn test_installed_skipped_or_failed() {
        let mut ok = planned("git", SourceKind::Installed, &[], InstallReason::Dependency);
        ok.requirements.push(Requirement {
            by: Some("yay".to_string()),
            dependency: crate::catalog::Dependency::parse("git>=1.0").unwrap(),
        });
        let mut stale = planned("go", SourceKind::Installed, &[], InstallReason::Dependency);
        stale.requirements.push(Requirement {
            by: Some("yay".to_string()),
            dependency: crate::catalog::Dependency::parse("go>=2").unwrap(),
        });

        let plan = plan(vec![vec![ok, stale]]);
        let executor = RecordingExecutor::default();
        let report = Orchestrator::new(&executor).run(&plan);

        assert_eq!(report.get("git"), Some(&BuildResult::Skipped));
        assert!(matches!(report.get("go"), Some(BuildResult::Failed { .. })));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_by_kind() {
        let plan = plan(vec![vec![
            planned("cmake", SourceKind::BinaryRepo, &[], InstallReason::Explicit),
            planned("yay", SourceKind::SourceRepo, &[], InstallReason::Explicit),
        ]]);
        let executor = RecordingExecutor::default();
        let progress = Arc::new(SilentProgress::new());
        let report = Orchestrator::new(&executor)
            .with_progress(progress.clone())
            .run(&plan);

        assert!(report.all_roots_ok(&plan));
        let mut calls = executor.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["bin:cmake", "src:yay"]);
        assert_eq!(progress.position(), 2);
        assert!(progress.is_finished());
    }

    #[test]
    fn test_cancelled_before_start() {
        let plan = plan(vec![
            vec![planned("a", SourceKind::SourceRepo, &[], InstallReason::Dependency)],
            vec![planned("b", SourceKind::SourceRepo, &["a"], InstallReason::Explicit)],
        ]);
        let executor = RecordingExecutor::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = Orchestrator::new(&executor).with_cancel(cancel).run(&plan);
        assert_eq!(report.get("a"), Some(&BuildResult::Cancelled));
        assert_eq!(report.get("b"), Some(&BuildResult::Cancelled));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_report_display() {
        let mut report = BuildReport::default();
        report.results.insert("a".to_string(), BuildResult::Succeeded);
        report.results.insert(
            "longer".to_string(),
            BuildResult::Blocked {
                by: BTreeSet::from(["x".to_string(), "y".to_string()]),
            },
        );
        assert_eq!(
            report.to_string(),
            "  a       succeeded\n  longer  blocked by x, y\n"
        );
    }
}
