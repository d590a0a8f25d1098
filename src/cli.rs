// src/cli.rs
//! CLI definitions for blinky
//!
//! The command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blinky")]
#[command(author = "Blinky Contributors")]
#[command(version)]
#[command(about = "Resolve, schedule and build AUR packages with their dependencies", long_about = None)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ~/.config/blinky/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that build
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Packages built at once within a tier
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print the build plan without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Plan against a TOML package snapshot instead of pacman and the AUR
    #[arg(long, value_name = "FILE", requires = "dry_run")]
    pub snapshot: Option<PathBuf>,

    /// Skip check dependencies and PKGBUILD check()
    #[arg(long)]
    pub no_check: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install packages and their dependencies
    #[command(visible_alias = "S")]
    Install {
        /// Package names, optionally with a constraint (foo>=2.0)
        #[arg(required = true)]
        packages: Vec<String>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Upgrade installed packages that have newer AUR versions
    #[command(visible_alias = "Syu")]
    Upgrade {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Show the build plan for packages without building
    Plan {
        #[arg(required = true)]
        packages: Vec<String>,

        /// Plan against a TOML package snapshot instead of pacman and the AUR
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Leave out check dependencies
        #[arg(long)]
        no_check: bool,
    },

    /// Compare two version strings (prints -1, 0 or 1)
    Vercmp {
        a: String,
        b: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from(["blinky", "-v", "install", "yay", "paru>=2", "-j", "4", "--dry-run"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Install { packages, build } => {
                assert_eq!(packages, vec!["yay", "paru>=2"]);
                assert_eq!(build.jobs, Some(4));
                assert!(build.dry_run);
                assert!(!build.no_check);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_install_requires_packages() {
        assert!(Cli::try_parse_from(["blinky", "install"]).is_err());
    }

    #[test]
    fn test_snapshot_requires_dry_run() {
        assert!(Cli::try_parse_from(["blinky", "install", "yay", "--snapshot", "s.toml"]).is_err());
        assert!(
            Cli::try_parse_from(["blinky", "upgrade", "--snapshot", "s.toml", "--dry-run"]).is_ok()
        );
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["blinky", "-v", "-q", "upgrade"]).is_err());
    }

    #[test]
    fn test_plan_flags_match_man_page() {
        assert!(Cli::try_parse_from(["blinky", "plan", "yay", "--snapshot", "s.toml"]).is_ok());

        let cmd = Cli::command();
        let help = |sub: &str| {
            cmd.find_subcommand(sub)
                .and_then(|c| c.get_arguments().find(|a| a.get_id() == "no_check"))
                .and_then(|a| a.get_help())
                .map(ToString::to_string)
        };
        assert_eq!(help("plan").as_deref(), Some("Leave out check dependencies"));
        assert_eq!(
            help("install").as_deref(),
            Some("Skip check dependencies and PKGBUILD check()")
        );
    }
}
