// src/error.rs

//! Crate-wide error type
//!
//! Resolution-phase errors (`Unresolvable`, `Conflict`, `UnresolvedDependency`,
//! `Cycle`) are fatal to a run: no part of the plan is executed. Build-phase
//! failures are recorded per package in the build report instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No candidate in any universe satisfies a requirement
    #[error("{}", unresolvable_message(.name, .constraint, .required_by))]
    Unresolvable {
        name: String,
        constraint: Option<String>,
        required_by: Option<String>,
    },

    /// Two chosen packages cannot be installed together
    #[error("{package} and {other} are in conflict")]
    Conflict { package: String, other: String },

    /// A dependency chain ends in a package that cannot be found
    #[error("unable to satisfy dependency '{dependency}' ({})", .chain.join(" -> "))]
    UnresolvedDependency {
        chain: Vec<String>,
        dependency: String,
    },

    /// Dependency cycle, reported as a closed path (A -> B -> A)
    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// An external build or install action failed for a package
    #[error("failed to build {package}: {detail}")]
    BuildFailure { package: String, detail: String },

    #[error("invalid version '{input}': {reason}")]
    VersionParse { input: String, reason: String },

    #[error("invalid dependency '{0}'")]
    DependencyParse(String),

    /// An external command could not be run or exited unsuccessfully
    #[error("{command}: {detail}")]
    Command { command: String, detail: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The AUR RPC interface answered with an error document
    #[error("AUR RPC error: {0}")]
    Rpc(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised while building or scheduling the graph
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::Unresolvable { .. }
                | Error::Conflict { .. }
                | Error::UnresolvedDependency { .. }
                | Error::Cycle { .. }
        )
    }
}

fn unresolvable_message(
    name: &str,
    constraint: &Option<String>,
    required_by: &Option<String>,
) -> String {
    let target = match constraint {
        Some(c) => format!("{name}{c}"),
        None => name.to_string(),
    };
    match required_by {
        Some(by) => format!("no package satisfies '{target}' (required by {by})"),
        None => format!("target not found: {target}"),
    }
}

/// Result type for blinky operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolvable_display() {
        let err = Error::Unresolvable {
            name: "libfoo".to_string(),
            constraint: Some(">=2.0".to_string()),
            required_by: Some("bar".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "no package satisfies 'libfoo>=2.0' (required by bar)"
        );

        let root = Error::Unresolvable {
            name: "nope".to_string(),
            constraint: None,
            required_by: None,
        };
        assert_eq!(root.to_string(), "target not found: nope");
    }

    #[test]
    fn test_chain_and_cycle_display() {
        let err = Error::UnresolvedDependency {
            chain: vec!["app".to_string(), "lib".to_string()],
            dependency: "missing>=1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unable to satisfy dependency 'missing>=1' (app -> lib)"
        );

        let cycle = Error::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(cycle.to_string(), "dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn test_is_resolution() {
        assert!(Error::Cycle { path: vec![] }.is_resolution());
        assert!(!Error::Rpc("boom".into()).is_resolution());
        assert!(!Error::BuildFailure {
            package: "x".into(),
            detail: "y".into()
        }
        .is_resolution());
    }
}
