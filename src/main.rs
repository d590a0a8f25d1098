// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use blinky::build::CancelToken;
use blinky::config::Config;
use clap::Parser;
use cli::{Cli, Commands};
use commands::Session;
use std::path::Path;
use tracing::{debug, warn};

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            commands::EXIT_BUILD_FAILED
        }
    };
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let Cli {
        quiet,
        config,
        command,
        ..
    } = cli;

    match command {
        Commands::Install { packages, build } => {
            commands::cmd_install(&mut session(config.as_deref(), quiet)?, &packages, &build)
        }
        Commands::Upgrade { build } => {
            commands::cmd_upgrade(&mut session(config.as_deref(), quiet)?, &build)
        }
        Commands::Plan {
            packages,
            snapshot,
            no_check,
        } => commands::cmd_plan(
            &mut session(config.as_deref(), quiet)?,
            &packages,
            snapshot.as_deref(),
            no_check,
        ),
        Commands::Vercmp { a, b } => Ok(commands::cmd_vercmp(&a, &b)),
        Commands::Completions { shell } => Ok(commands::cmd_completions(shell)),
    }
}

/// Load the configuration and arm the Ctrl-C watcher
fn session(config: Option<&Path>, quiet: bool) -> Result<Session> {
    let config = Config::discover(config).context("failed to load configuration")?;
    debug!("Using configuration {:?}", config);

    let cancel = CancelToken::new();
    watch_ctrl_c(cancel.clone());
    Ok(Session {
        config,
        cancel,
        quiet,
    })
}

/// Trip `cancel` on the first Ctrl-C; running builds finish, later tiers are skipped
fn watch_ctrl_c(cancel: CancelToken) {
    let spawned = std::thread::Builder::new()
        .name("blinky-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing the current tier");
                    cancel.cancel();
                }
            });
        });
    if let Err(e) = spawned {
        warn!("Failed to start signal watcher: {}", e);
    }
}
