// src/commands.rs
//! Command implementations for the blinky binary

use crate::cli::BuildArgs;
use anyhow::{Context, Result};
use blinky::build::{CancelToken, MakepkgExecutor, Orchestrator};
use blinky::catalog::Catalog;
use blinky::config::Config;
use blinky::progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
use blinky::resolver::{GraphBuilder, ResolveOptions};
use blinky::scheduler::{schedule, BuildPlan};
use blinky::sources::{AurClient, PacmanInstalled, PacmanSync, Snapshot};
use blinky::version::vercmp;
use clap::CommandFactory;
use clap_complete::Shell;
use std::cmp::Ordering;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Every requested package ended up installed
pub const EXIT_OK: i32 = 0;

/// At least one requested package failed, was blocked or was cancelled
pub const EXIT_BUILD_FAILED: i32 = 1;

/// Resolution or scheduling failed; nothing was executed
pub const EXIT_UNRESOLVED: i32 = 2;

/// State shared by all commands of one invocation
pub struct Session {
    pub config: Config,
    pub cancel: CancelToken,
    pub quiet: bool,
}

/// Resolve, schedule and (unless dry run) build the given packages
pub fn cmd_install(session: &mut Session, packages: &[String], args: &BuildArgs) -> Result<i32> {
    session.config.merge_cli(args.jobs, args.no_check);
    let options = ResolveOptions {
        check_depends: session.config.check_depends,
        ..ResolveOptions::default()
    };

    let plan = match with_catalog(&session.config, args.snapshot.as_deref(), |catalog| {
        plan_for(catalog, packages, options)
    })? {
        Ok(plan) => plan,
        Err(code) => return Ok(code),
    };
    print!("{plan}");

    if args.dry_run || plan.is_empty() {
        return Ok(EXIT_OK);
    }
    execute(session, &plan)
}

/// Rebuild every foreign package the AUR has a newer version of
pub fn cmd_upgrade(session: &mut Session, args: &BuildArgs) -> Result<i32> {
    session.config.merge_cli(args.jobs, args.no_check);
    let options = ResolveOptions {
        check_depends: session.config.check_depends,
        upgrade_roots: true,
    };

    let plan = match with_catalog(&session.config, args.snapshot.as_deref(), |catalog| {
        let upgrades = catalog.outdated().context("failed to check for upgrades")?;
        if upgrades.is_empty() {
            return Ok(Ok(BuildPlan::default()));
        }
        for upgrade in &upgrades {
            println!("{} {} -> {}", upgrade.name, upgrade.installed, upgrade.available);
        }
        let roots: Vec<String> = upgrades.into_iter().map(|u| u.name).collect();
        plan_for(catalog, &roots, options)
    })? {
        Ok(plan) => plan,
        Err(code) => return Ok(code),
    };

    if plan.is_empty() {
        println!("Nothing to upgrade");
        return Ok(EXIT_OK);
    }
    print!("{plan}");

    if args.dry_run {
        return Ok(EXIT_OK);
    }
    execute(session, &plan)
}

/// Print the build plan without executing it
pub fn cmd_plan(
    session: &mut Session,
    packages: &[String],
    snapshot: Option<&Path>,
    no_check: bool,
) -> Result<i32> {
    let args = BuildArgs {
        dry_run: true,
        snapshot: snapshot.map(Path::to_path_buf),
        no_check,
        ..BuildArgs::default()
    };
    cmd_install(session, packages, &args)
}

/// Compare two version strings the way pacman does
pub fn cmd_vercmp(a: &str, b: &str) -> i32 {
    let result = match vercmp(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    println!("{result}");
    EXIT_OK
}

/// Write a completion script for `shell` to stdout
pub fn cmd_completions(shell: Shell) -> i32 {
    let mut cmd = crate::cli::Cli::command();
    clap_complete::generate(shell, &mut cmd, "blinky", &mut std::io::stdout());
    EXIT_OK
}

/// Build the catalog for this run and hand it to `f`
///
/// With a snapshot file every universe comes from that file; otherwise the
/// local pacman database, the sync databases and the AUR are queried.
fn with_catalog<T>(
    config: &Config,
    snapshot: Option<&Path>,
    f: impl FnOnce(&Catalog<'_>) -> Result<T>,
) -> Result<T> {
    match snapshot {
        Some(path) => {
            let snapshot = Snapshot::load(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            let catalog = Catalog::new(
                &snapshot,
                Box::new(snapshot.binary_repo()),
                Box::new(snapshot.source_repo()),
            )
            .context("failed to read installed packages from snapshot")?;
            f(&catalog)
        }
        None => {
            let aur = AurClient::new(&config.aur_url).context("failed to set up AUR client")?;
            let catalog = Catalog::new(&PacmanInstalled, Box::new(PacmanSync), Box::new(aur))
                .context("failed to read the local package database")?;
            f(&catalog)
        }
    }
}

/// Resolve and schedule `roots`
///
/// Resolution errors are reported here and become `Err(exit code)`; other
/// failures propagate.
fn plan_for(
    catalog: &Catalog<'_>,
    roots: &[String],
    options: ResolveOptions,
) -> Result<std::result::Result<BuildPlan, i32>> {
    let resolved = GraphBuilder::new(catalog)
        .with_options(options)
        .build(roots)
        .and_then(|graph| schedule(&graph));

    match resolved {
        Ok(plan) => {
            debug!("Planned {} packages in {} tiers", plan.len(), plan.tiers.len());
            Ok(Ok(plan))
        }
        Err(e) if e.is_resolution() => {
            eprintln!("error: {e}");
            Ok(Err(EXIT_UNRESOLVED))
        }
        Err(e) => Err(e).context("failed to resolve dependencies"),
    }
}

/// Run a plan with the makepkg executor and print the status table
fn execute(session: &Session, plan: &BuildPlan) -> Result<i32> {
    let config = &session.config;
    let executor = MakepkgExecutor::new(config.build_dir.clone(), config.aur_url.as_str())
        .with_sudo(config.sudo_command())
        .with_makepkg_flags(config.makepkg_flags.clone())
        .with_check(config.check_depends);
    executor
        .check_tools()
        .context("missing a required build tool")?;
    std::fs::create_dir_all(&config.build_dir)
        .with_context(|| format!("failed to create {}", config.build_dir.display()))?;

    let length = plan.len() as u64;
    let progress: Arc<dyn ProgressTracker> = if session.quiet {
        Arc::new(SilentProgress::new())
    } else if std::io::stderr().is_terminal() {
        Arc::new(CliProgress::new("building", length))
    } else {
        Arc::new(LogProgress::new("build", length))
    };

    info!(
        "Building {} packages with up to {} at once",
        plan.len(),
        config.concurrency
    );
    let report = Orchestrator::new(&executor)
        .with_concurrency(config.concurrency)
        .with_cancel(session.cancel.clone())
        .with_progress(progress)
        .run(plan);

    println!();
    print!("{report}");

    if report.all_roots_ok(plan) {
        Ok(EXIT_OK)
    } else {
        let failed = report.failures().len();
        eprintln!("error: {failed} packages were not installed");
        Ok(EXIT_BUILD_FAILED)
    }
}
