//! Known build targets and their build state.
//!
//! The registry is loaded once from a static JSON manifest. Bundle
//! descriptors are immutable after load; only the per-bundle build state
//! changes, and only through [`super::builder::BundleBuilder`].

use super::builder::{BuildError, BuildFuture};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors loading the bundle manifest. These are fatal at startup.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bundle '{0}' is declared more than once")]
    DuplicateName(String),
    #[error("minified name '{minified}' of '{owner}' collides with another bundle")]
    AliasCollision { owner: String, minified: String },
}

/// What a bundle is built from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BundleKind {
    /// An extension living in `src/components/<name>/<version>/`.
    Component {
        version: String,
        #[serde(default)]
        has_css: bool,
    },
    /// A standalone script entry point.
    Script {
        src_dir: String,
        src_filename: String,
        dest_dir: String,
        #[serde(default)]
        minified_dest_dir: Option<String>,
    },
}

/// One buildable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Bundle {
    /// Canonical (unminified) name.
    pub name: String,
    #[serde(default)]
    pub minified_name: Option<String>,
    #[serde(flatten)]
    pub kind: BundleKind,
}

impl Bundle {
    pub fn component(name: &str, version: &str, has_css: bool) -> Self {
        Self {
            name: name.to_string(),
            minified_name: None,
            kind: BundleKind::Component {
                version: version.to_string(),
                has_css,
            },
        }
    }

    pub fn script(name: &str, src_dir: &str, src_filename: &str, dest_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            minified_name: None,
            kind: BundleKind::Script {
                src_dir: src_dir.to_string(),
                src_filename: src_filename.to_string(),
                dest_dir: dest_dir.to_string(),
                minified_dest_dir: None,
            },
        }
    }

    #[must_use]
    pub fn with_minified_name(mut self, minified: &str) -> Self {
        self.minified_name = Some(minified.to_string());
        self
    }

    /// Repository-relative directory whose files feed this bundle.
    pub fn source_dir(&self) -> String {
        match &self.kind {
            BundleKind::Component { version, .. } => {
                crate::affected::styles::component_dir(&self.name, version)
            }
            BundleKind::Script { src_dir, .. } => src_dir.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Manifest {
    bundles: Vec<Bundle>,
}

/// Build progress of one bundle.
#[derive(Clone)]
pub enum BuildState {
    Unbuilt,
    Building(BuildFuture),
    Built,
}

/// Copyable view of [`BuildState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Unbuilt,
    Building,
    Built,
}

impl BuildState {
    pub fn phase(&self) -> BuildPhase {
        match self {
            Self::Unbuilt => BuildPhase::Unbuilt,
            Self::Building(_) => BuildPhase::Building,
            Self::Built => BuildPhase::Built,
        }
    }
}

/// Registry slot: descriptor plus mutable build bookkeeping.
pub(crate) struct Entry {
    pub(crate) bundle: Arc<Bundle>,
    pub(crate) state: BuildState,
    pub(crate) watch_enabled: bool,
    /// The stored build is waiting on its predecessor and has not started
    /// compiling, so it will see any further change.
    pub(crate) queued: bool,
    /// Bumped per started build; only the latest build settles the state.
    pub(crate) generation: u64,
}

/// Table of known bundles, in manifest order.
pub struct BundleRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

/// The registry as shared between the builder, router, and watcher.
pub type SharedRegistry = Arc<Mutex<BundleRegistry>>;

/// Locks a shared registry. A poisoned lock still holds consistent state
/// because every transition is a single assignment.
pub fn lock(registry: &SharedRegistry) -> MutexGuard<'_, BundleRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BundleRegistry {
    /// Creates a registry, validating that names and minified aliases are
    /// unambiguous.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] on duplicate or colliding names.
    pub fn new(bundles: Vec<Bundle>) -> Result<Self, ManifestError> {
        let mut by_name = HashMap::with_capacity(bundles.len());
        for (idx, bundle) in bundles.iter().enumerate() {
            if by_name.insert(bundle.name.clone(), idx).is_some() {
                return Err(ManifestError::DuplicateName(bundle.name.clone()));
            }
        }

        let mut minified_seen = HashMap::new();
        for bundle in &bundles {
            let Some(minified) = &bundle.minified_name else {
                continue;
            };
            let collides_with_canonical =
                minified != &bundle.name && by_name.contains_key(minified);
            let collides_with_alias = minified_seen.insert(minified.clone(), ()).is_some();
            if collides_with_canonical || collides_with_alias {
                return Err(ManifestError::AliasCollision {
                    owner: bundle.name.clone(),
                    minified: minified.clone(),
                });
            }
        }

        let entries = bundles
            .into_iter()
            .map(|bundle| Entry {
                bundle: Arc::new(bundle),
                state: BuildState::Unbuilt,
                watch_enabled: false,
                queued: false,
                generation: 0,
            })
            .collect();

        Ok(Self { entries, by_name })
    }

    /// Loads a registry from a JSON manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the file is unreadable or invalid.
    pub fn from_manifest(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_manifest(&content)
    }

    /// Parses manifest JSON text.
    ///
    /// # Errors
    ///
    /// See [`BundleRegistry::from_manifest`].
    pub fn parse_manifest(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;
        Self::new(manifest.bundles)
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Resolves a requested name to its canonical bundle name.
    ///
    /// With `minified_mode` off the requested name is taken as canonical.
    /// With it on, a canonical match wins; otherwise the minified aliases
    /// are scanned in manifest order.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NotFound`] when nothing matches.
    pub fn resolve(&self, requested: &str, minified_mode: bool) -> Result<&str, BuildError> {
        if let Some(&idx) = self.by_name.get(requested) {
            return Ok(&self.entries[idx].bundle.name);
        }
        if minified_mode {
            if let Some(entry) = self
                .entries
                .iter()
                .find(|e| e.bundle.minified_name.as_deref() == Some(requested))
            {
                return Ok(&entry.bundle.name);
            }
        }
        Err(BuildError::NotFound(requested.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Bundle> {
        self.by_name
            .get(name)
            .map(|&idx| self.entries[idx].bundle.as_ref())
    }

    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.entries.iter().map(|e| e.bundle.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn phase(&self, name: &str) -> Option<BuildPhase> {
        self.entry(name).map(|e| e.state.phase())
    }

    pub fn is_watch_enabled(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| e.watch_enabled)
    }

    /// Names of watch-enabled bundles whose source directory contains the
    /// repository-relative `path`.
    pub fn watched_bundles_for(&self, path: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.watch_enabled)
            .filter(|e| {
                let dir = e.bundle.source_dir();
                path.starts_with(&format!("{dir}/"))
            })
            .map(|e| e.bundle.name.clone())
            .collect()
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    pub(crate) fn entry_mut(&mut self, name: &str) -> Option<&mut Entry> {
        let idx = *self.by_name.get(name)?;
        self.entries.get_mut(idx)
    }
}
