// src/config.rs

//! User configuration
//!
//! Read from `--config <path>` or `$XDG_CONFIG_HOME/blinky/config.toml`.
//! A missing default file means all defaults; every key is optional:
//!
//! ```toml
//! concurrency = 4
//! build_dir = "/var/tmp/blinky"
//! aur_url = "https://aur.archlinux.org"
//! check_depends = false
//! sudo = "doas"
//! makepkg_flags = ["--skippgpcheck"]
//! ```

use crate::error::{Error, Result};
use crate::sources::aur::DEFAULT_AUR_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Packages built or installed at once within a tier
    pub concurrency: usize,

    /// Directory holding one checkout per package base
    pub build_dir: PathBuf,

    pub aur_url: String,

    /// Resolve and run check dependencies of source packages
    pub check_depends: bool,

    /// Command used to run pacman as root; empty runs pacman directly
    pub sudo: String,

    /// Extra arguments for every makepkg invocation
    pub makepkg_flags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            build_dir: default_build_dir(),
            aur_url: DEFAULT_AUR_URL.to_string(),
            check_depends: true,
            sudo: "sudo".to_string(),
            makepkg_flags: Vec::new(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_build_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("blinky/builds")
}

/// Location of the per-user config file
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("blinky/config.toml"))
}

impl Config {
    /// Load from an explicit path, which must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Load the explicit path if given, else the default file if present
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.aur_url.is_empty() {
            return Err(Error::Config("aur_url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of file values
    pub fn merge_cli(&mut self, concurrency: Option<usize>, no_check: bool) {
        if let Some(n) = concurrency {
            self.concurrency = n.max(1);
        }
        if no_check {
            self.check_depends = false;
        }
    }

    /// The sudo command, or `None` when disabled
    pub fn sudo_command(&self) -> Option<String> {
        Some(self.sudo.clone()).filter(|s| !s.is_empty())
    }
}
