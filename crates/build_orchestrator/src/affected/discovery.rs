//! Test file discovery.
//!
//! A file is a test when it matches one of the configured glob patterns.
//! Patterns use minimatch semantics: `*` never crosses a `/`.

use crate::normalize::path::to_repo_relative;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::Path;

/// Unit test locations in the component tree.
pub const UNIT_TEST_PATTERNS: &[&str] = &[
    "src/components/**/test/*.js",
    "src/components/**/test/unit/*.js",
];

/// Integration test locations.
pub const INTEGRATION_TEST_PATTERNS: &[&str] = &["test/integration/**/*.js"];

/// Compiled set of test-file patterns.
#[derive(Debug, Clone)]
pub struct TestPatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl TestPatterns {
    /// Compiles `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`globset::Error`] for an invalid pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                GlobBuilder::new(pattern.as_ref())
                    .literal_separator(true)
                    .build()?,
            );
        }
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set: builder.build()?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check if a repository-relative path is a test file.
    pub fn is_test_file(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    /// Walks `root` (honoring `.gitignore`) and returns every test file as a
    /// sorted list of repository-relative paths.
    pub fn discover(&self, root: &Path) -> Vec<String> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|e| e.file_name() != "node_modules" && e.file_name() != ".git")
            .build();

        let mut tests: Vec<String> = walker
            .flatten()
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|entry| to_repo_relative(entry.path(), root).ok())
            .filter(|rel| self.is_test_file(rel))
            .collect();
        tests.sort();
        tests
    }
}
