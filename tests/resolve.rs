// tests/resolve.rs

//! End-to-end resolution and scheduling against in-memory universes.

mod common;

use blinky::build::{BuildResult, Orchestrator};
use blinky::resolver::{GraphBuilder, InstallReason, ResolveOptions};
use blinky::scheduler::{schedule, BuildPlan};
use blinky::sources::Snapshot;
use blinky::{Error, SourceKind};
use common::{catalog, record, roots, MockExecutor, SnapshotBuilder};

fn plan(snapshot: &Snapshot, names: &[&str]) -> blinky::Result<BuildPlan> {
    let catalog = catalog(snapshot);
    let graph = GraphBuilder::new(&catalog).build(&roots(names))?;
    schedule(&graph)
}

fn names(plan: &BuildPlan) -> Vec<&str> {
    plan.flatten().into_iter().map(|p| p.name()).collect()
}

/// yay from the AUR with a mix of installed and repository dependencies
fn yay_universe() -> Snapshot {
    let mut yay = record("yay", "12.3.5-1", &["pacman>6.1", "git"]);
    yay.make_depends.push("go>=1.21".to_string());

    SnapshotBuilder::new()
        .installed("glibc", "2.39-1")
        .installed("pacman", "6.1.0-3")
        .binary("git", "2.45.0-1", &["glibc"])
        .binary("go", "2:1.22.2-1", &[])
        .source_record(yay)
        .build()
}

#[test]
fn test_resolve_and_schedule_aur_package() {
    let snapshot = yay_universe();
    let plan = plan(&snapshot, &["yay"]).unwrap();

    assert_eq!(names(&plan), vec!["glibc", "go", "pacman", "git", "yay"]);
    assert_eq!(plan.tiers.len(), 3);
    assert_eq!(plan.position("git"), Some(1));

    let yay = plan.get("yay").unwrap();
    assert_eq!(yay.reason, InstallReason::Explicit);
    assert_eq!(yay.package.kind, SourceKind::SourceRepo);
    assert_eq!(yay.dependencies, vec!["git", "go", "pacman"]);

    assert_eq!(plan.get("pacman").unwrap().package.kind, SourceKind::Installed);
    assert_eq!(plan.get("go").unwrap().reason, InstallReason::Dependency);
    assert!(plan.to_string().ends_with("5 packages in 3 tiers"));
}

#[test]
fn test_diamond_planned_once() {
    let snapshot = SnapshotBuilder::new()
        .source("app", "1.0-1", &["left", "right"])
        .source("left", "1.0-1", &["base-lib"])
        .source("right", "1.0-1", &["base-lib>=1.0"])
        .source("base-lib", "1.2-1", &[])
        .build();

    let plan = plan(&snapshot, &["app"]).unwrap();
    assert_eq!(names(&plan), vec!["base-lib", "left", "right", "app"]);
    assert_eq!(
        plan.flatten().iter().filter(|p| p.name() == "base-lib").count(),
        1
    );
    assert_eq!(plan.get("base-lib").unwrap().requirements.len(), 2);
}

#[test]
fn test_cycle_rejected_with_path() {
    let snapshot = SnapshotBuilder::new()
        .source("a", "1.0-1", &["b"])
        .source("b", "1.0-1", &["c"])
        .source("c", "1.0-1", &["a"])
        .build();

    match plan(&snapshot, &["a"]) {
        Err(Error::Cycle { path }) => assert_eq!(path, vec!["a", "b", "c", "a"]),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_conflict_detected_before_any_build() {
    let mut x = record("x", "1.0-1", &[]);
    x.conflicts.push("y".to_string());
    let snapshot = SnapshotBuilder::new()
        .source("app", "1.0-1", &["x", "y"])
        .binary_record(x)
        .binary("y", "1.0-1", &[])
        .build();

    let err = plan(&snapshot, &["app"]).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }), "{err}");
    assert!(err.is_resolution());
}

#[test]
fn test_missing_dependency_reports_chain() {
    let snapshot = SnapshotBuilder::new()
        .source("app", "1.0-1", &["mid"])
        .source("mid", "1.0-1", &["ghost>=2"])
        .build();

    let err = plan(&snapshot, &["app"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unable to satisfy dependency 'ghost>=2' (app -> mid)"
    );
}

#[test]
fn test_missing_root_is_unresolvable() {
    let snapshot = SnapshotBuilder::new().build();
    let err = plan(&snapshot, &["nope"]).unwrap_err();
    assert_eq!(err.to_string(), "target not found: nope");
}

#[test]
fn test_versioned_root_request() {
    let snapshot = SnapshotBuilder::new()
        .installed("ripgrep", "13.0.0-1")
        .binary("ripgrep", "14.1.0-1", &[])
        .build();

    let plan = plan(&snapshot, &["ripgrep>=14"]).unwrap();
    assert_eq!(plan.get("ripgrep").unwrap().package.kind, SourceKind::BinaryRepo);
}

#[test]
fn test_check_depends_optional() {
    let mut app = record("app", "1.0-1", &[]);
    app.check_depends.push("pytest".to_string());
    let snapshot = SnapshotBuilder::new()
        .source_record(app)
        .binary("pytest", "8.0-1", &[])
        .build();

    let catalog = catalog(&snapshot);
    let without = GraphBuilder::new(&catalog)
        .with_options(ResolveOptions {
            check_depends: false,
            ..ResolveOptions::default()
        })
        .build(&roots(&["app"]))
        .unwrap();
    assert_eq!(without.len(), 1);

    let with = GraphBuilder::new(&catalog).build(&roots(&["app"])).unwrap();
    assert_eq!(with.len(), 2);
}

#[test]
fn test_repository_queried_once_per_name() {
    let snapshot = SnapshotBuilder::new()
        .source("app", "1.0-1", &["lib", "tool"])
        .source("tool", "1.0-1", &["lib"])
        .source("lib", "1.0-1", &[])
        .build();

    let catalog = catalog(&snapshot);
    GraphBuilder::new(&catalog).build(&roots(&["app"])).unwrap();
    let first = snapshot.query_count();
    GraphBuilder::new(&catalog).build(&roots(&["app"])).unwrap();
    assert_eq!(snapshot.query_count(), first);
}

#[test]
fn test_resolution_is_deterministic() {
    let snapshot = yay_universe();
    let first = plan(&snapshot, &["yay"]).unwrap();
    for _ in 0..5 {
        assert_eq!(plan(&snapshot, &["yay"]).unwrap(), first);
    }
}

#[test]
fn test_second_run_is_all_skipped() {
    let snapshot = yay_universe();
    let first = plan(&snapshot, &["yay"]).unwrap();

    // Every planned package is now installed at its planned version
    let mut after = SnapshotBuilder::new();
    for planned in first.flatten() {
        after = after.installed(planned.name(), &planned.package.version.to_string());
    }
    let after = after.build();

    let second = plan(&after, &["yay"]).unwrap();
    assert!(second
        .flatten()
        .iter()
        .all(|p| p.package.kind == SourceKind::Installed));

    let executor = MockExecutor::new();
    let report = Orchestrator::new(&executor).run(&second);
    assert!(report.iter().all(|(_, r)| *r == BuildResult::Skipped));
    assert!(executor.calls().is_empty());
}
