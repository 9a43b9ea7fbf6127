//! On-demand bundle builds.
//!
//! The registry holds every known bundle and its build state, the builder
//! runs single-flight compiles, and the router and watcher decide when a
//! build is needed.

pub mod builder;
pub mod compiler;
pub mod registry;
pub mod router;
pub mod watcher;

pub use builder::{BuildError, BundleBuilder};
pub use compiler::{CommandCompiler, CompileOptions, Compiler};
pub use registry::{Bundle, BundleKind, BundleRegistry, SharedRegistry};
pub use router::{Dispatch, LazyBuildRouter, ServeMode};
