// src/lib.rs

//! blinky: an AUR helper library
//!
//! Resolves requested packages against the installed system, the binary
//! repositories and the AUR, orders the result into build tiers, and builds
//! each tier in parallel while isolating failures to the packages that
//! depend on them.
//!
//! # Architecture
//!
//! - `catalog`: read-only package lookup, memoized for one run
//! - `resolver`: dependency graph construction with constraint merging
//! - `scheduler`: cycle detection and tiered topological order
//! - `build`: tier-by-tier orchestration over an `Executor`
//! - `sources`: pacman, AUR and in-memory package universes

pub mod build;
pub mod catalog;
pub mod config;
mod error;
pub mod progress;
pub mod resolver;
pub mod scheduler;
pub mod sources;
pub mod version;

pub use build::{BuildReport, BuildResult, CancelToken, Executor, Orchestrator};
pub use catalog::{Catalog, Dependency, Package, SourceKind};
pub use error::{Error, Result};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use resolver::{DependencyGraph, GraphBuilder, ResolveOptions};
pub use scheduler::{schedule, BuildPlan};
pub use version::{vercmp, Version};
