// src/resolver/mod.rs

//! Dependency resolution
//!
//! Resolution is single-threaded and deterministic: for identical catalog
//! contents and roots the same graph is produced, node for node.

mod builder;
mod graph;

pub use builder::{GraphBuilder, ResolveOptions};
pub use graph::{DependencyGraph, Edge, InstallReason, Node, NodeId, Requirement};
