//! Change-driven test selection.
//!
//! Provides import parsing, alias resolution, the per-file dependency view,
//! version-control change sets, and the selector that combines them.

pub mod changeset;
pub mod discovery;
pub mod graph;
pub mod parser;
pub mod resolver;
pub mod selector;
pub mod styles;

pub use changeset::{Baseline, ChangeSet, DiffSource, GitDiff};
pub use graph::DependencyGraph;
pub use selector::{Selection, SelectorConfig, TestSelector};
