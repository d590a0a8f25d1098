// src/build/makepkg.rs

//! Production executor backed by git, makepkg and pacman
//!
//! Source packages are cloned from `<aur_url>/<base>.git` into
//! `<build_dir>/<base>`, built with `makepkg`, and the package file for the
//! requested name is installed with `pacman -U`. Members of a split package
//! share one build. All pacman invocations are serialized because pacman
//! holds an exclusive database lock.

use super::Executor;
use crate::error::{Error, Result};
use crate::resolver::InstallReason;
use crate::scheduler::PlannedPackage;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Name of the log file written next to each build
const BUILD_LOG: &str = "blinky-build.log";

/// Lines of stderr quoted in a failure message
const ERROR_TAIL_LINES: usize = 5;

/// Package files produced by one base, or the reason its build failed
type BaseOutcome = std::result::Result<Vec<PathBuf>, String>;

pub struct MakepkgExecutor {
    build_dir: PathBuf,
    aur_url: String,
    sudo: Option<String>,
    makepkg_flags: Vec<String>,
    check: bool,
    pacman_lock: Mutex<()>,
    // base -> outcome of its single build
    bases: DashMap<String, Arc<Mutex<Option<BaseOutcome>>>>,
}

impl MakepkgExecutor {
    pub fn new(build_dir: impl Into<PathBuf>, aur_url: impl Into<String>) -> Self {
        Self {
            build_dir: build_dir.into(),
            aur_url: aur_url.into().trim_end_matches('/').to_string(),
            sudo: Some("sudo".to_string()),
            makepkg_flags: Vec::new(),
            check: true,
            pacman_lock: Mutex::new(()),
            bases: DashMap::new(),
        }
    }

    /// Privilege escalation command for pacman; `None` runs pacman directly
    pub fn with_sudo(mut self, sudo: Option<String>) -> Self {
        self.sudo = sudo.filter(|s| !s.is_empty());
        self
    }

    /// Extra arguments passed to every makepkg invocation
    pub fn with_makepkg_flags(mut self, flags: Vec<String>) -> Self {
        self.makepkg_flags = flags;
        self
    }

    /// Run the `check()` function of PKGBUILDs
    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Make sure every external program is on `PATH`
    pub fn check_tools(&self) -> Result<()> {
        let mut tools = vec!["git", "makepkg", "pacman"];
        if let Some(sudo) = &self.sudo {
            tools.push(sudo.as_str());
        }
        for tool in tools {
            which::which(tool).map_err(|e| Error::Command {
                command: tool.to_string(),
                detail: format!("not found in PATH: {e}"),
            })?;
        }
        Ok(())
    }

    /// A pacman command, prefixed with the sudo program when configured
    pub fn pacman_command(&self) -> Command {
        match &self.sudo {
            Some(sudo) => {
                let mut cmd = Command::new(sudo);
                cmd.arg("pacman");
                cmd
            }
            None => Command::new("pacman"),
        }
    }

    /// `pacman -S` arguments for a repository package
    pub fn sync_args(package: &PlannedPackage) -> Vec<String> {
        vec![
            "-S".to_string(),
            "--noconfirm".to_string(),
            "--needed".to_string(),
            reason_flag(package.reason).to_string(),
            package.name().to_string(),
        ]
    }

    /// makepkg arguments for building a source package
    pub fn makepkg_args(&self) -> Vec<String> {
        let mut args = vec!["--noconfirm".to_string(), "--force".to_string()];
        if !self.check {
            args.push("--nocheck".to_string());
        }
        args.extend(self.makepkg_flags.iter().cloned());
        args
    }

    fn pacman(&self, args: &[String]) -> Result<()> {
        // A poisoned lock only means another install panicked
        let _guard = self
            .pacman_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut cmd = self.pacman_command();
        cmd.args(args);
        run(&mut cmd, "pacman", None).map(|_| ())
    }

    /// Clone or update the AUR repository of `base`
    fn fetch(&self, base: &str) -> Result<PathBuf> {
        let dir = self.build_dir.join(base);
        if dir.join(".git").is_dir() {
            debug!("Updating {}", dir.display());
            let mut cmd = Command::new("git");
            cmd.arg("-C").arg(&dir).args(["pull", "--ff-only", "--quiet"]);
            run(&mut cmd, "git pull", None)?;
        } else {
            fs::create_dir_all(&self.build_dir)?;
            let url = format!("{}/{}.git", self.aur_url, base);
            info!("Cloning {}", url);
            let mut cmd = Command::new("git");
            cmd.args(["clone", "--quiet", &url]).arg(&dir);
            run(&mut cmd, "git clone", None)?;
        }
        Ok(dir)
    }

    /// Fetch and build `base`, returning the package files it produces
    fn build_base(&self, base: &str) -> Result<Vec<PathBuf>> {
        let dir = self.fetch(base)?;

        info!("Building {}", base);
        let mut cmd = Command::new("makepkg");
        cmd.args(self.makepkg_args()).current_dir(&dir);
        run(&mut cmd, "makepkg", Some(&dir.join(BUILD_LOG)))?;

        let mut cmd = Command::new("makepkg");
        cmd.arg("--packagelist").current_dir(&dir);
        let output = run(&mut cmd, "makepkg --packagelist", None)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Build a base once; later members of the same base reuse the outcome
    fn built_files(&self, base: &str) -> BaseOutcome {
        let slot = Arc::clone(self.bases.entry(base.to_string()).or_default().value());
        let mut outcome = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(done) = outcome.as_ref() {
            return done.clone();
        }
        let result = self.build_base(base).map_err(|e| e.to_string());
        *outcome = Some(result.clone());
        result
    }
}

impl Executor for MakepkgExecutor {
    fn install_binary(&self, package: &PlannedPackage) -> std::result::Result<(), String> {
        self.pacman(&Self::sync_args(package)).map_err(|e| e.to_string())
    }

    fn build_and_install_source(&self, package: &PlannedPackage) -> std::result::Result<(), String> {
        let files = self.built_files(&package.package.base)?;
        let file = files
            .iter()
            .find(|f| package_file_name(f) == Some(package.name()))
            .ok_or_else(|| format!("makepkg produced no package file for {}", package.name()))?;

        let args = vec![
            "-U".to_string(),
            "--noconfirm".to_string(),
            reason_flag(package.reason).to_string(),
            file.display().to_string(),
        ];
        self.pacman(&args).map_err(|e| e.to_string())
    }
}

fn reason_flag(reason: InstallReason) -> &'static str {
    match reason {
        InstallReason::Explicit => "--asexplicit",
        InstallReason::Dependency => "--asdeps",
    }
}

/// Package name encoded in a file name like `foo-bar-1:2.0-1-x86_64.pkg.tar.zst`
pub fn package_file_name(path: &Path) -> Option<&str> {
    let file = path.file_name()?.to_str()?;
    let stem = &file[..file.find(".pkg.tar")?];
    // name-pkgver-pkgrel-arch
    let mut parts = stem.rsplitn(4, '-');
    let _arch = parts.next()?;
    let _pkgrel = parts.next()?;
    let _pkgver = parts.next()?;
    parts.next().filter(|n| !n.is_empty())
}

/// Run a command to completion, failing on a non-zero exit
///
/// When `log` is given, stdout and stderr are written to that file.
fn run(cmd: &mut Command, what: &str, log: Option<&Path>) -> Result<Output> {
    debug!("Running {:?}", cmd);
    let output = cmd.output().map_err(|e| Error::Command {
        command: what.to_string(),
        detail: format!("failed to start: {e}"),
    })?;

    if let Some(log) = log {
        let mut content = output.stdout.clone();
        content.extend_from_slice(&output.stderr);
        fs::write(log, content)?;
    }

    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(ERROR_TAIL_LINES)..].join("\n");
    let mut detail = format!("exited with {}", output.status);
    if !tail.is_empty() {
        detail.push_str(&format!(": {tail}"));
    }
    if let Some(log) = log {
        detail.push_str(&format!(" (see {})", log.display()));
    }
    Err(Error::Command {
        command: what.to_string(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Package, SourceKind};
    use crate::version::Version;

    fn planned(name: &str, reason: InstallReason) -> PlannedPackage {
        PlannedPackage {
            package: Arc::new(Package::new(
                name,
                Version::parse("1.0-1").unwrap(),
                SourceKind::BinaryRepo,
            )),
            reason,
            dependencies: Vec::new(),
            requirements: Vec::new(),
        }
    }

    #[test]
    fn test_package_file_name() {
        let cases = [
            ("/tmp/yay/yay-12.3.5-1-x86_64.pkg.tar.zst", Some("yay")),
            ("python-foo-bar-1:2.0.r3.gabc-2-any.pkg.tar.xz", Some("python-foo-bar")),
            ("foo-debug-1.0-1-x86_64.pkg.tar.zst", Some("foo-debug")),
            ("README.md", None),
            ("1.0-1-x86_64.pkg.tar.zst", None),
        ];
        for (file, expected) in cases {
            assert_eq!(package_file_name(Path::new(file)), expected, "{file}");
        }
    }

    #[test]
    fn test_pacman_command_sudo_prefix() {
        let exec = MakepkgExecutor::new("/tmp/builds", "https://aur.archlinux.org/");
        let cmd = exec.pacman_command();
        assert_eq!(cmd.get_program(), "sudo");
        assert_eq!(cmd.get_args().collect::<Vec<_>>(), vec!["pacman"]);

        let exec = exec.with_sudo(Some(String::new()));
        assert_eq!(exec.pacman_command().get_program(), "pacman");
    }

    #[test]
    fn test_sync_args_reason() {
        let args = MakepkgExecutor::sync_args(&planned("cmake", InstallReason::Dependency));
        assert_eq!(args, vec!["-S", "--noconfirm", "--needed", "--asdeps", "cmake"]);

        let args = MakepkgExecutor::sync_args(&planned("yay", InstallReason::Explicit));
        assert!(args.contains(&"--asexplicit".to_string()));
    }

    #[test]
    fn test_makepkg_args() {
        let exec = MakepkgExecutor::new("/tmp/builds", "https://aur.archlinux.org")
            .with_check(false)
            .with_makepkg_flags(vec!["--skippgpcheck".to_string()]);
        assert_eq!(
            exec.makepkg_args(),
            vec!["--noconfirm", "--force", "--nocheck", "--skippgpcheck"]
        );
        assert_eq!(exec.aur_url, "https://aur.archlinux.org");
    }

    #[test]
    fn test_run_reports_failure_and_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(BUILD_LOG);
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo building; echo broken >&2; exit 3"]);

        let err = run(&mut cmd, "makepkg", Some(&log)).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("makepkg: exited with"));
        assert!(message.contains("broken"));
        assert!(fs::read_to_string(&log).unwrap().contains("building"));
    }
}
