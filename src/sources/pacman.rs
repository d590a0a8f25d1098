// src/sources/pacman.rs

//! Package metadata from the local pacman installation
//!
//! `PacmanInstalled` reads the local database with `pacman -Qi` and
//! `PacmanSync` queries the sync databases with `pacman -Si`. Output is
//! requested in the C locale so field names are stable.

use super::{InstalledPackage, InstalledSource, PackageRecord, RepoSource};
use crate::catalog::SourceKind;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::process::Command;
use tracing::{debug, warn};

/// Run pacman with the given arguments and return stdout
fn pacman(args: &[&str]) -> Result<std::process::Output> {
    debug!("Running pacman {}", args.join(" "));
    Command::new("pacman")
        .args(args)
        .env("LC_ALL", "C")
        .output()
        .map_err(|e| Error::Command {
            command: format!("pacman {}", args.join(" ")),
            detail: format!("failed to run: {e}. Is pacman installed?"),
        })
}

/// Split `pacman -Qi`/`-Si` output into one field map per package
///
/// Continuation lines (used by `Optional Deps`) are folded into the
/// preceding field. `None` values become empty strings.
pub fn parse_info_blocks(output: &str) -> Vec<HashMap<String, String>> {
    let mut blocks = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            if let Some(value) = last_key.as_ref().and_then(|k| current.get_mut(k)) {
                value.push_str("  ");
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(" : ").or_else(|| line.split_once(':')) {
            let key = key.trim().to_string();
            let value = value.trim();
            let value = if value == "None" { "" } else { value };
            current.insert(key.clone(), value.to_string());
            last_key = Some(key);
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn list_field(block: &HashMap<String, String>, key: &str) -> Vec<String> {
    block
        .get(key)
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn block_to_record(block: &HashMap<String, String>) -> Option<PackageRecord> {
    let name = block.get("Name")?.clone();
    let version = block.get("Version")?.clone();
    Some(PackageRecord {
        base: block.get("Base").filter(|b| !b.is_empty()).cloned(),
        depends: list_field(block, "Depends On"),
        provides: list_field(block, "Provides"),
        conflicts: list_field(block, "Conflicts With"),
        ..PackageRecord::new(name, version)
    })
}

/// The local package database
#[derive(Debug, Default, Clone, Copy)]
pub struct PacmanInstalled;

impl InstalledSource for PacmanInstalled {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        let output = pacman(&["-Qi"])?;
        if !output.status.success() {
            return Err(Error::Command {
                command: "pacman -Qi".to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let installed: Vec<InstalledPackage> = parse_info_blocks(&String::from_utf8_lossy(&output.stdout))
            .iter()
            .filter_map(block_to_record)
            .map(|rec| InstalledPackage {
                name: rec.name,
                version: rec.version,
                provides: rec.provides,
            })
            .collect();

        debug!("Found {} installed packages", installed.len());
        Ok(installed)
    }
}

/// The configured pacman sync repositories
#[derive(Debug, Default, Clone, Copy)]
pub struct PacmanSync;

impl PacmanSync {
    fn info(&self, name: &str) -> Result<Vec<PackageRecord>> {
        let output = pacman(&["-Si", name])?;
        if !output.status.success() {
            // Not found in any sync database
            return Ok(Vec::new());
        }
        Ok(parse_info_blocks(&String::from_utf8_lossy(&output.stdout))
            .iter()
            .filter_map(block_to_record)
            .collect())
    }

    /// The sync package pacman would pick to satisfy `name`
    fn provider(&self, name: &str) -> Result<Option<String>> {
        let output = pacman(&[
            "-Sp",
            "--nodeps",
            "--nodeps",
            "--noconfirm",
            "--print-format",
            "%n",
            name,
        ])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(first_provider(&String::from_utf8_lossy(&output.stdout), name))
    }
}

impl RepoSource for PacmanSync {
    fn kind(&self) -> SourceKind {
        SourceKind::BinaryRepo
    }

    fn query(&self, name: &str) -> Result<Vec<PackageRecord>> {
        let mut records = self.info(name)?;
        if records.is_empty() {
            if let Some(provider) = self.provider(name)? {
                records.extend(self.info(&provider)?);
            }
        }
        if records.iter().all(|r| !r.answers_to(name)) && !records.is_empty() {
            warn!("pacman returned packages for '{}' that do not provide it", name);
        }
        Ok(records)
    }
}

/// First package named in `pacman -Sp` output; later lines are dependencies
fn first_provider(stdout: &str, name: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .filter(|l| *l != name)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SI_OUTPUT: &str = "\
Repository      : core
Name            : bash
Version         : 5.2.026-2
Description     : The GNU Bourne Again shell
Provides        : sh
Depends On      : readline  libreadline.so=8-64  glibc  ncurses
Optional Deps   : bash-completion: for tab completion
                  bash-docs: documentation
Conflicts With  : None

Repository      : extra
Name            : zsh
Version         : 5.9-5
Provides        : None
Depends On      : pcre  libcap  gdbm
Conflicts With  : None
";

    #[test]
    fn test_first_provider_ignores_transaction_dependencies() {
        let stdout = "\nopenssh\nlibedit\nldns\nglibc\n";
        assert_eq!(first_provider(stdout, "ssh-server"), Some("openssh".to_string()));
        assert_eq!(first_provider("  dash  \n", "sh"), Some("dash".to_string()));
        assert_eq!(first_provider("bash\nreadline\n", "bash"), None);
        assert_eq!(first_provider("", "sh"), None);
    }

    #[test]
    fn test_parse_info_blocks() {
        let blocks = parse_info_blocks(SI_OUTPUT);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["Name"], "bash");
        assert_eq!(blocks[0]["Conflicts With"], "");
        assert!(blocks[0]["Optional Deps"].contains("bash-docs"));
    }

    #[test]
    fn test_block_to_record() {
        let blocks = parse_info_blocks(SI_OUTPUT);
        let bash = block_to_record(&blocks[0]).unwrap();
        assert_eq!(bash.version, "5.2.026-2");
        assert_eq!(bash.provides, vec!["sh"]);
        assert_eq!(
            bash.depends,
            vec!["readline", "libreadline.so=8-64", "glibc", "ncurses"]
        );
        assert!(bash.conflicts.is_empty());

        let zsh = block_to_record(&blocks[1]).unwrap();
        assert!(zsh.provides.is_empty());
    }

    #[test]
    fn test_block_without_name_is_skipped() {
        let blocks = parse_info_blocks("Version : 1.0\n");
        assert!(block_to_record(&blocks[0]).is_none());
    }
}
