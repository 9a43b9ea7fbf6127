//! Maps request paths to bundle builds.

use super::builder::{BuildError, BundleBuilder};
use super::registry::{lock, BundleKind};
use regex::Regex;
use std::sync::Arc;

/// How bundles are being served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeMode {
    pub minified: bool,
    pub esm: bool,
    /// Runtime comes from the production CDN; nothing is built locally.
    pub cdn: bool,
}

impl ServeMode {
    /// Pattern capturing a component name from its output path.
    fn component_pattern(self) -> &'static str {
        if self.esm {
            r"/dist/v0/([^/]*)\.mjs"
        } else if self.minified {
            r"/dist/v0/([^/]*)\.js"
        } else {
            r"/dist/v0/([^/]*)\.max\.js"
        }
    }

    /// Pattern capturing a script's file name from its output path.
    fn script_pattern(self) -> &'static str {
        if self.esm {
            r"/.*/([^/]*\.mjs)"
        } else {
            r"/.*/([^/]*\.js)"
        }
    }

    pub fn describe(self) -> &'static str {
        if self.minified {
            "Serving minified JS"
        } else if self.esm {
            "Serving ESM JS"
        } else if self.cdn {
            "Serving current prod JS"
        } else {
            "Serving unminified JS"
        }
    }
}

/// Result of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The named bundle is built; continue serving the file.
    Built(String),
    /// Not a bundle request; continue untouched.
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Component,
    Script,
}

/// Builds bundles on demand as their output paths are requested.
pub struct LazyBuildRouter {
    builder: Arc<BundleBuilder>,
    mode: ServeMode,
    matchers: [(Regex, Target); 2],
}

impl LazyBuildRouter {
    /// # Errors
    ///
    /// Returns [`regex::Error`] if a path pattern fails to compile.
    pub fn new(builder: Arc<BundleBuilder>, mode: ServeMode) -> Result<Self, regex::Error> {
        Ok(Self {
            builder,
            mode,
            matchers: [
                (Regex::new(mode.component_pattern())?, Target::Component),
                (Regex::new(mode.script_pattern())?, Target::Script),
            ],
        })
    }

    pub fn mode(&self) -> ServeMode {
        self.mode
    }

    pub fn builder(&self) -> &Arc<BundleBuilder> {
        &self.builder
    }

    /// Builds the bundle behind `path`, if there is one, before the file is
    /// served.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Compile`] when the bundle fails to build.
    pub async fn handle(&self, path: &str) -> Result<Dispatch, BuildError> {
        let Some(name) = self.bundle_for_request(path) else {
            return Ok(Dispatch::PassThrough);
        };

        match self.builder.ensure_built(&name).await {
            Ok(()) => Ok(Dispatch::Built(name)),
            Err(BuildError::NotFound(_)) => Ok(Dispatch::PassThrough),
            Err(e) => Err(e),
        }
    }

    /// Canonical name of the bundle `path` asks for. Component paths only
    /// resolve to components and script paths only to scripts.
    fn bundle_for_request(&self, path: &str) -> Option<String> {
        let registry = lock(self.builder.registry());
        self.matchers.iter().find_map(|(matcher, target)| {
            let requested = matcher.captures(path)?.get(1)?.as_str();
            let name = registry.resolve(requested, self.mode.minified).ok()?;
            let kind = &registry.get(name)?.kind;
            let fits = match target {
                Target::Component => matches!(kind, BundleKind::Component { .. }),
                Target::Script => matches!(kind, BundleKind::Script { .. }),
            };
            fits.then(|| name.to_string())
        })
    }
}
