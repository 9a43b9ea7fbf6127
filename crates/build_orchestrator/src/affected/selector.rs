//! Change-driven test selection.
//!
//! A test is selected when it changed itself, or when one of its *direct*
//! imports is a substring of a changed source path. Imports are not followed
//! transitively.

use super::changeset::ChangeSet;
use super::discovery::TestPatterns;
use super::graph::DependencyGraph;
use super::styles::StyleMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Changed-file count at which selection is abandoned.
pub const LARGE_REFACTOR_THRESHOLD: usize = 50;
/// Selected-test count above which CI runs the full suite instead.
pub const CI_TEST_CEILING: usize = 20;

const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".ts", ".jsx", ".tsx", ".mjs"];
const STYLE_EXTENSIONS: &[&str] = &[".css"];

/// Why selection fell back to the full suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    LargeRefactor { changed: usize, threshold: usize },
    TooManyTests { selected: usize, ceiling: usize },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeRefactor { changed, threshold } => write!(
                f,
                "{changed} files changed (threshold {threshold}), treating as a large refactor"
            ),
            Self::TooManyTests { selected, ceiling } => write!(
                f,
                "{selected} tests affected (ceiling {ceiling}), running all tests"
            ),
        }
    }
}

/// Outcome of test selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Run exactly these repository-relative test files.
    Tests(Vec<String>),
    /// No test is affected by the change set.
    NoneAffected,
    /// Run the full suite.
    RunAll(FallbackReason),
}

/// Selection policy knobs.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub patterns: TestPatterns,
    pub large_refactor_threshold: usize,
    pub ci_test_ceiling: usize,
    /// False in continuous integration.
    pub local_dev: bool,
}

impl SelectorConfig {
    pub fn new(patterns: TestPatterns, local_dev: bool) -> Self {
        Self {
            patterns,
            large_refactor_threshold: LARGE_REFACTOR_THRESHOLD,
            ci_test_ceiling: CI_TEST_CEILING,
            local_dev,
        }
    }
}

/// Computes the tests affected by one change set. Results are memoized for
/// the lifetime of the selector.
pub struct TestSelector {
    graph: DependencyGraph,
    styles: StyleMap,
    config: SelectorConfig,
    changes: ChangeSet,
    tests: OnceLock<Vec<String>>,
    selection: OnceLock<Selection>,
}

impl TestSelector {
    pub fn new(
        graph: DependencyGraph,
        styles: StyleMap,
        config: SelectorConfig,
        changes: ChangeSet,
    ) -> Self {
        Self {
            graph,
            styles,
            config,
            changes,
            tests: OnceLock::new(),
            selection: OnceLock::new(),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Applies the fallback policy on top of [`TestSelector::tests_to_run`].
    pub fn select(&self) -> &Selection {
        self.selection.get_or_init(|| {
            tracing::info!("determining which tests to run");

            let changed = self.changes.len();
            if changed >= self.config.large_refactor_threshold {
                let reason = FallbackReason::LargeRefactor {
                    changed,
                    threshold: self.config.large_refactor_threshold,
                };
                tracing::info!("skipping local-change selection: {reason}");
                return Selection::RunAll(reason);
            }

            let tests = self.tests_to_run();
            if tests.is_empty() {
                tracing::info!("no tests were directly affected by local changes");
                return Selection::NoneAffected;
            }

            if !self.config.local_dev && tests.len() > self.config.ci_test_ceiling {
                let reason = FallbackReason::TooManyTests {
                    selected: tests.len(),
                    ceiling: self.config.ci_test_ceiling,
                };
                tracing::info!("{reason}");
                return Selection::RunAll(reason);
            }

            tracing::info!(count = tests.len(), "running the following tests");
            for test in tests {
                tracing::info!("  {test}");
            }
            Selection::Tests(tests.to_vec())
        })
    }

    /// The raw affected-test list, without threshold policy.
    pub fn tests_to_run(&self) -> &[String] {
        self.tests.get_or_init(|| self.compute_tests())
    }

    fn compute_tests(&self) -> Vec<String> {
        let root = self.graph.root();
        let mut tests = Vec::new();
        let mut seen = HashSet::new();
        let mut sources: Vec<String> = Vec::new();

        for file in self.changes.files() {
            if !root.join(file).exists() {
                tracing::info!(file = %file, "skipping because it was deleted");
            } else if self.config.patterns.is_test_file(file) {
                if seen.insert(file.clone()) {
                    tests.push(file.clone());
                }
            } else if has_extension(file, SCRIPT_EXTENSIONS) {
                sources.push(file.clone());
            } else if has_extension(file, STYLE_EXTENSIONS) {
                sources.extend(self.styles.scripts_importing(file, &self.graph));
            }
        }

        if sources.is_empty() {
            return tests;
        }

        for test in self.config.patterns.discover(root) {
            if seen.contains(&test) {
                continue;
            }
            if self.imports_changed_source(&test, &sources) {
                seen.insert(test.clone());
                tests.push(test);
            }
        }
        tests
    }

    fn imports_changed_source(&self, test: &str, sources: &[String]) -> bool {
        match self.graph.imports_of(test) {
            Ok(imports) => imports
                .iter()
                .any(|import| sources.iter().any(|src| src.contains(import.as_str()))),
            Err(e) => {
                tracing::warn!(file = %test, "excluding test from selection: {e}");
                false
            }
        }
    }
}

fn has_extension(file: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| file.ends_with(ext))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::affected::resolver::ImportResolver;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn selector(dir: &TempDir, changes: &[&str], local_dev: bool) -> TestSelector {
        let graph = DependencyGraph::new(dir.path().to_path_buf(), ImportResolver::default());
        let patterns = TestPatterns::new(&["test/unit/*.js"]).unwrap();
        let mut styles = StyleMap::default();
        styles.insert("src/components/bar/0.1/bar.css", "build/bar-0.1.css.js");
        TestSelector::new(
            graph,
            styles,
            SelectorConfig::new(patterns, local_dev),
            ChangeSet::from_paths(changes.iter().copied()),
        )
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/components/foo/0.1/foo.js", "export const foo = 1;");
        write(
            dir.path(),
            "test/unit/foo-test.js",
            "import {foo} from '../../src/components/foo/0.1/foo.js';",
        );
        write(dir.path(), "test/unit/unrelated-test.js", "import {x} from '../../src/x.js';");
        write(dir.path(), "src/components/bar/0.1/bar.css", ".bar {}");
        write(
            dir.path(),
            "src/components/bar/0.1/bar.js",
            "import {CSS} from '../../../../build/bar-0.1.css';",
        );
        write(
            dir.path(),
            "test/unit/bar-test.js",
            "import {Bar} from '../../src/components/bar/0.1/bar';",
        );
        dir
    }

    #[test]
    fn changed_source_selects_importing_test() {
        let dir = fixture();
        let s = selector(&dir, &["src/components/foo/0.1/foo.js"], true);
        assert_eq!(
            s.select(),
            &Selection::Tests(vec!["test/unit/foo-test.js".to_string()])
        );
    }

    #[test]
    fn changed_stylesheet_selects_tests_of_importing_script() {
        let dir = fixture();
        let s = selector(&dir, &["src/components/bar/0.1/bar.css"], true);
        assert_eq!(
            s.select(),
            &Selection::Tests(vec!["test/unit/bar-test.js".to_string()])
        );
    }

    #[test]
    fn changed_test_is_selected_directly() {
        let dir = fixture();
        let s = selector(&dir, &["test/unit/unrelated-test.js"], true);
        assert_eq!(
            s.select(),
            &Selection::Tests(vec!["test/unit/unrelated-test.js".to_string()])
        );
    }

    #[test]
    fn direct_and_import_matches_are_deduplicated() {
        let dir = fixture();
        let s = selector(
            &dir,
            &["test/unit/foo-test.js", "src/components/foo/0.1/foo.js"],
            true,
        );
        assert_eq!(s.tests_to_run(), &["test/unit/foo-test.js".to_string()]);
    }

    #[test]
    fn deleted_files_are_skipped() {
        let dir = fixture();
        let s = selector(&dir, &["src/gone.js"], true);
        assert_eq!(s.select(), &Selection::NoneAffected);
    }

    #[test]
    fn non_source_files_select_nothing() {
        let dir = fixture();
        write(dir.path(), "README.md", "# hi");
        let s = selector(&dir, &["README.md"], true);
        assert_eq!(s.select(), &Selection::NoneAffected);
    }

    #[test]
    fn unparseable_test_is_excluded_not_fatal() {
        let dir = fixture();
        write(dir.path(), "test/unit/broken-test.js", "import { from './x'");
        let s = selector(&dir, &["src/components/foo/0.1/foo.js"], true);
        assert_eq!(s.tests_to_run(), &["test/unit/foo-test.js".to_string()]);
    }

    #[test]
    fn large_refactor_runs_everything() {
        let dir = fixture();
        let many: Vec<String> = (0..LARGE_REFACTOR_THRESHOLD).map(|i| format!("src/f{i}.js")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let s = selector(&dir, &refs, true);
        assert!(matches!(
            s.select(),
            Selection::RunAll(FallbackReason::LargeRefactor { changed: 50, .. })
        ));
    }

    #[test]
    fn ci_runs_everything_above_ceiling() {
        let dir = fixture();
        for i in 0..=CI_TEST_CEILING {
            write(
                dir.path(),
                &format!("test/unit/t{i}-test.js"),
                "import {foo} from '../../src/components/foo/0.1/foo.js';",
            );
        }
        let ci = selector(&dir, &["src/components/foo/0.1/foo.js"], false);
        assert!(matches!(
            ci.select(),
            Selection::RunAll(FallbackReason::TooManyTests { .. })
        ));

        let local = selector(&dir, &["src/components/foo/0.1/foo.js"], true);
        assert!(matches!(local.select(), Selection::Tests(t) if t.len() == CI_TEST_CEILING + 2));
    }

    #[test]
    fn selection_is_memoized() {
        let dir = fixture();
        let s = selector(&dir, &["src/components/foo/0.1/foo.js"], true);
        let first = s.select();
        // Later edits on disk are not observed within one invocation.
        write(
            dir.path(),
            "test/unit/late-test.js",
            "import {foo} from '../../src/components/foo/0.1/foo.js';",
        );
        let second = s.select();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, second);
    }

    #[test]
    fn same_change_set_gives_same_selection() {
        let dir = fixture();
        let a = selector(&dir, &["src/components/foo/0.1/foo.js", "src/components/bar/0.1/bar.css"], true);
        let b = selector(&dir, &["src/components/bar/0.1/bar.css", "src/components/foo/0.1/foo.js"], true);
        let mut left = a.tests_to_run().to_vec();
        let mut right = b.tests_to_run().to_vec();
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }
}
