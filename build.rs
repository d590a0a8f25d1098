// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: parallel jobs within a tier
fn jobs_arg() -> Arg {
    Arg::new("jobs")
        .short('j')
        .long("jobs")
        .value_name("N")
        .help("Packages built at once within a tier")
}

/// Common argument: print the plan only
fn dry_run_arg() -> Arg {
    Arg::new("dry_run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Print the build plan without executing it")
}

/// Common argument: offline package snapshot
fn snapshot_arg() -> Arg {
    Arg::new("snapshot")
        .long("snapshot")
        .value_name("FILE")
        .help("Plan against a TOML package snapshot instead of pacman and the AUR")
}

/// Common argument: offline snapshot, accepted for builds only with --dry-run
fn build_snapshot_arg() -> Arg {
    snapshot_arg().requires("dry_run")
}

fn no_check_arg(help: &'static str) -> Arg {
    Arg::new("no_check")
        .long("no-check")
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("blinky")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Blinky Contributors")
        .about("Resolve, schedule and build AUR packages with their dependencies")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet")
                .help("Show debug output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only show warnings and errors"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .help("Configuration file (default: ~/.config/blinky/config.toml)"),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages and their dependencies")
                .visible_alias("S")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .help("Package names, optionally with a constraint (foo>=2.0)"),
                )
                .arg(jobs_arg())
                .arg(dry_run_arg())
                .arg(build_snapshot_arg())
                .arg(no_check_arg("Skip check dependencies and PKGBUILD check()")),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Upgrade installed packages that have newer AUR versions")
                .visible_alias("Syu")
                .arg(jobs_arg())
                .arg(dry_run_arg())
                .arg(build_snapshot_arg())
                .arg(no_check_arg("Skip check dependencies and PKGBUILD check()")),
        )
        .subcommand(
            Command::new("plan")
                .about("Show the build plan for packages without building")
                .arg(Arg::new("packages").required(true).num_args(1..))
                .arg(snapshot_arg())
                .arg(no_check_arg("Leave out check dependencies")),
        )
        .subcommand(
            Command::new("vercmp")
                .about("Compare two version strings (prints -1, 0 or 1)")
                .arg(Arg::new("a").required(true))
                .arg(Arg::new("b").required(true)),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("blinky.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
