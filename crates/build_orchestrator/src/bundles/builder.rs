//! Single-flight bundle builds.
//!
//! Each bundle has at most one build in flight. The build runs on its own
//! spawned task and is published to callers as a [`Shared`] future, so any
//! number of requests can join it and the build finishes even if every
//! requester goes away.

use super::compiler::{CompileOptions, Compiler};
use super::registry::{lock, BuildState, Entry, SharedRegistry};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors surfaced to callers waiting on a build.
///
/// `Clone` so every caller joined on the same build receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no bundle named '{0}'")]
    NotFound(String),
    #[error("failed to build {bundle}: {message}")]
    Compile { bundle: String, message: String },
}

/// Handle on an in-flight build.
pub type BuildFuture = Shared<BoxFuture<'static, Result<(), BuildError>>>;

/// What a spawned build needs to compile and settle its entry.
#[derive(Clone)]
struct BuildContext {
    registry: SharedRegistry,
    compiler: Arc<dyn Compiler>,
    options: CompileOptions,
}

/// Dispatches builds against a shared registry.
pub struct BundleBuilder {
    ctx: BuildContext,
}

impl BundleBuilder {
    pub fn new(
        registry: SharedRegistry,
        compiler: Arc<dyn Compiler>,
        minify: bool,
        local_dev: bool,
    ) -> Self {
        Self {
            ctx: BuildContext {
                registry,
                compiler,
                options: CompileOptions {
                    watch: true,
                    minify,
                    local_dev,
                },
            },
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.ctx.registry
    }

    /// Builds `name` unless it is already built and being watched.
    ///
    /// A request arriving while the bundle is building joins that build
    /// instead of starting another one.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NotFound`] for an unknown bundle and
    /// [`BuildError::Compile`] when the joined build fails.
    pub async fn ensure_built(&self, name: &str) -> Result<(), BuildError> {
        let build = {
            let mut registry = lock(&self.ctx.registry);
            let entry = registry
                .entry_mut(name)
                .ok_or_else(|| BuildError::NotFound(name.to_string()))?;

            if let BuildState::Building(build) = &entry.state {
                build.clone()
            } else if entry.watch_enabled && matches!(entry.state, BuildState::Built) {
                return Ok(());
            } else {
                start_build(&self.ctx, entry, None)
            }
        };
        build.await
    }

    /// Reacts to a source change of a watch-enabled bundle and returns the
    /// build that will include the change.
    ///
    /// A built bundle starts rebuilding. A bundle that is mid-build gets one
    /// follow-up build queued behind the running one. The follow-up replaces
    /// the stored build, so any request from here on resolves only after it;
    /// callers already joined on the running build keep that build's result.
    /// Changes arriving while the follow-up is still queued fold into it.
    pub fn on_file_change(&self, name: &str) -> Option<BuildFuture> {
        let mut registry = lock(&self.ctx.registry);
        let entry = registry.entry_mut(name)?;
        if !entry.watch_enabled {
            return None;
        }
        let running = match &entry.state {
            BuildState::Building(build) => Some(build.clone()),
            BuildState::Built | BuildState::Unbuilt => None,
        };
        let Some(running) = running else {
            return Some(start_build(&self.ctx, entry, None));
        };
        if entry.queued {
            tracing::debug!(bundle = %name, "rebuild already queued");
            return Some(running);
        }
        tracing::debug!(bundle = %name, "change during build, queueing rebuild");
        Some(start_build(&self.ctx, entry, Some(running)))
    }

    /// The in-flight build of `name`, if any.
    pub fn pending_build(&self, name: &str) -> Option<BuildFuture> {
        let mut registry = lock(&self.ctx.registry);
        match &registry.entry_mut(name)?.state {
            BuildState::Building(build) => Some(build.clone()),
            _ => None,
        }
    }
}

/// Moves `entry` to `Building` and spawns its compile, after `after` has
/// settled when given. Must be called with the registry locked.
fn start_build(ctx: &BuildContext, entry: &mut Entry, after: Option<BuildFuture>) -> BuildFuture {
    let bundle = Arc::clone(&entry.bundle);
    let name = bundle.name.clone();
    entry.generation += 1;
    entry.queued = after.is_some();
    let generation = entry.generation;

    let task_ctx = ctx.clone();
    let task = tokio::spawn(async move {
        if let Some(previous) = after {
            // Its outcome is superseded by this build.
            let _ = previous.await;
            dequeue(&task_ctx, &bundle.name, generation);
        }
        tracing::info!(bundle = %bundle.name, "building");

        let started = Instant::now();
        let compiler = Arc::clone(&task_ctx.compiler);
        let options = task_ctx.options;
        let compile_bundle = Arc::clone(&bundle);
        let compile =
            tokio::spawn(async move { compiler.compile(&compile_bundle, options).await });

        let result = match compile.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(e.to_string()),
        }
        .map_err(|message| BuildError::Compile {
            bundle: bundle.name.clone(),
            message,
        });

        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(()) => tracing::info!(bundle = %bundle.name, elapsed_ms, "finished build"),
            Err(e) => tracing::error!(bundle = %bundle.name, elapsed_ms, "{e}"),
        }
        finish_build(&task_ctx, &bundle.name, generation, &result);
        result
    });

    let build = async move {
        task.await.unwrap_or_else(|e| {
            Err(BuildError::Compile {
                bundle: name,
                message: e.to_string(),
            })
        })
    }
    .boxed()
    .shared();

    entry.state = BuildState::Building(build.clone());
    entry.watch_enabled = true;
    build
}

/// A queued build is about to compile; later changes need a new one.
fn dequeue(ctx: &BuildContext, name: &str, generation: u64) {
    let mut registry = lock(&ctx.registry);
    if let Some(entry) = registry.entry_mut(name) {
        if entry.generation == generation {
            entry.queued = false;
        }
    }
}

/// Settles the entry unless a newer build has replaced this one.
fn finish_build(ctx: &BuildContext, name: &str, generation: u64, result: &Result<(), BuildError>) {
    let mut registry = lock(&ctx.registry);
    let Some(entry) = registry.entry_mut(name) else {
        return;
    };
    if entry.generation != generation {
        return;
    }
    entry.state = match result {
        Ok(()) => BuildState::Built,
        Err(_) => BuildState::Unbuilt,
    };
}
