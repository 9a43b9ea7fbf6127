//! Rebuilds watched bundles when their sources change on disk.
//!
//! Events come from notify-rs. Paths are filtered through `.gitignore`, and
//! an event whose file content hashes the same as last time is dropped.

use super::builder::BundleBuilder;
use super::registry::lock;
use crate::normalize::path::to_repo_relative;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const POLL_INTERVAL_MS: u64 = 100;
const EVENT_BUFFER: usize = 1000;

/// Decides which file events are real source changes.
pub struct ChangeFilter {
    root: PathBuf,
    gitignore: Option<Gitignore>,
    hashes: HashMap<PathBuf, blake3::Hash>,
}

impl ChangeFilter {
    pub fn new(root: PathBuf) -> Self {
        let gitignore = load_gitignore(&root);
        Self {
            root,
            gitignore,
            hashes: HashMap::new(),
        }
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        if path
            .components()
            .any(|c| c.as_os_str() == "node_modules" || c.as_os_str() == ".git")
        {
            return true;
        }

        match (&self.gitignore, path.strip_prefix(&self.root)) {
            (Some(gi), Ok(relative)) => gi
                .matched_path_or_any_parents(relative, path.is_dir())
                .is_ignore(),
            _ => false,
        }
    }

    /// True when `path` differs from the last content seen for it. A file
    /// seen for the first time, or one that was removed, counts as changed.
    pub fn content_changed(&mut self, path: &Path) -> bool {
        let Ok(content) = std::fs::read(path) else {
            self.hashes.remove(path);
            return true;
        };
        let hash = blake3::hash(&content);
        self.hashes.insert(path.to_path_buf(), hash) != Some(hash)
    }

    /// Repository-relative path of an accepted change, or `None` if the
    /// event should be dropped.
    pub fn accept(&mut self, path: &Path) -> Option<String> {
        if path.is_dir() || self.should_ignore(path) || !self.content_changed(path) {
            return None;
        }
        to_repo_relative(path, &self.root).ok()
    }
}

fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let gitignore_path = root.join(".gitignore");
    if !gitignore_path.exists() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    if builder.add(&gitignore_path).is_some() {
        return None;
    }
    builder.build().ok()
}

/// Triggers rebuilds for every watched bundle containing `rel_path`.
/// Returns the names of bundles with a build scheduled for the change.
pub fn dispatch_change(builder: &BundleBuilder, rel_path: &str) -> Vec<String> {
    let affected = lock(builder.registry()).watched_bundles_for(rel_path);
    affected
        .into_iter()
        .filter(|name| {
            let started = builder.on_file_change(name).is_some();
            tracing::debug!(bundle = %name, file = %rel_path, started, "source changed");
            started
        })
        .collect()
}

/// Sends `paths` to the watch task. Returns `false` once the task is gone.
fn forward_paths(tx: &mpsc::Sender<PathBuf>, paths: Vec<PathBuf>) -> bool {
    for path in paths {
        if tx.blocking_send(path).is_err() {
            tracing::debug!("watch task stopped, dropping event");
            return false;
        }
    }
    true
}

/// Watches `root` and feeds accepted changes to `builder`. The returned task
/// owns the watcher and runs until the runtime shuts down.
///
/// # Errors
///
/// Returns [`notify::Error`] if the watcher cannot be created.
pub fn spawn_bundle_watcher(
    builder: Arc<BundleBuilder>,
    root: PathBuf,
) -> Result<JoinHandle<()>, notify::Error> {
    let root = root.canonicalize().unwrap_or(root);
    let (tx, mut rx) = mpsc::channel::<PathBuf>(EVENT_BUFFER);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                forward_paths(&tx, event.paths);
            }
            Err(e) => tracing::warn!("watch error: {e}"),
        },
        Config::default().with_poll_interval(Duration::from_millis(POLL_INTERVAL_MS)),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "watching for source changes");

    let mut filter = ChangeFilter::new(root);
    Ok(tokio::spawn(async move {
        let _watcher = watcher;
        while let Some(path) = rx.recv().await {
            if let Some(rel) = filter.accept(&path) {
                dispatch_change(&builder, &rel);
            }
        }
    }))
}
