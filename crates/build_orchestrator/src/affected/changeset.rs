//! Changed-file queries against version control.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

/// Errors querying version control.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {args} exited with {status}: {stderr}")]
    Failed {
        args: String,
        status: i32,
        stderr: String,
    },
}

/// The revision a change set is computed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// Merge base of `HEAD` and the local `main` branch.
    LocalMain,
    /// Merge base of `HEAD` and `origin/main`. Used in CI, where the local
    /// branch is a merge commit.
    CiMain,
    /// An explicit revision.
    Revision(String),
}

impl Baseline {
    /// Picks the baseline for the running environment.
    pub fn for_environment(is_ci: bool) -> Self {
        if is_ci {
            Self::CiMain
        } else {
            Self::LocalMain
        }
    }
}

/// Source of changed files relative to a baseline.
pub trait DiffSource: Send + Sync {
    /// Returns repository-relative paths changed since `baseline`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError`] when the underlying query fails.
    fn changed_files(&self, baseline: &Baseline) -> Result<Vec<String>, DiffError>;
}

/// [`DiffSource`] backed by the `git` binary.
pub struct GitDiff {
    repo_root: PathBuf,
}

impl GitDiff {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }

    fn run(&self, args: &[&str]) -> Result<String, DiffError> {
        let joined = args.join(" ");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|source| DiffError::Spawn {
                args: joined.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DiffError::Failed {
                args: joined,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn resolve_baseline(&self, baseline: &Baseline) -> Result<String, DiffError> {
        match baseline {
            Baseline::LocalMain => self.run(&["merge-base", "main", "HEAD"]),
            Baseline::CiMain => self.run(&["merge-base", "origin/main", "HEAD"]),
            Baseline::Revision(rev) => Ok(rev.clone()),
        }
    }
}

impl DiffSource for GitDiff {
    fn changed_files(&self, baseline: &Baseline) -> Result<Vec<String>, DiffError> {
        let base = self.resolve_baseline(baseline)?;
        let stdout = self.run(&["diff", "--name-only", &base])?;
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

/// Ordered, deduplicated repository-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    files: Vec<String>,
}

impl ChangeSet {
    /// Builds a change set, dropping blank lines and later duplicates.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for path in paths {
            let path = crate::normalize::path::normalize_slashes(path.into().trim());
            if path.is_empty() {
                continue;
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
        Self { files }
    }

    /// Queries `source` for files changed since `baseline`.
    ///
    /// # Errors
    ///
    /// Propagates [`DiffError`] from the source.
    pub fn query(source: &dyn DiffSource, baseline: &Baseline) -> Result<Self, DiffError> {
        Ok(Self::from_paths(source.changed_files(baseline)?))
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
