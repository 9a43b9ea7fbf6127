//! Build orchestration for a large front-end codebase.
//!
//! Two halves share this crate:
//!
//! - [`bundles`] builds named bundles on demand behind an HTTP server, at
//!   most one build per bundle at a time, and rebuilds them as sources change.
//! - [`affected`] decides which tests a change set affects, using each test's
//!   direct imports and the stylesheet to generated-module mapping.
//!
//! [`config`] turns command-line flags into a test-run configuration.

pub mod affected;
pub mod bundles;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logger;
pub mod normalize;
pub mod server;
