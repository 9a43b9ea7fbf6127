//! Test-run configuration.
//!
//! [`TestRunConfig::build`] turns command-line flags and the detected
//! environment into the configuration the browser test runner consumes. It
//! does no I/O; resolving `--files` globs and `--filelist` happens up front
//! in [`TestFiles::from_flags`].

use crate::affected::discovery::{TestPatterns, INTEGRATION_TEST_PATTERNS, UNIT_TEST_PATTERNS};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("argument {0} matched zero files")]
    NoMatches(String),
    #[error("invalid file glob {glob}: {source}")]
    Glob {
        glob: String,
        #[source]
        source: globset::Error,
    },
    #[error("cannot read file list {path}: {source}")]
    FileList {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestVariant {
    Unit,
    Integration,
}

impl TestVariant {
    /// Globs locating every test of this variant.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::Unit => UNIT_TEST_PATTERNS,
            Self::Integration => INTEGRATION_TEST_PATTERNS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Integration => "integration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

/// Command-line switches affecting a test run.
#[derive(Debug, Clone, Default)]
pub struct TestFlags {
    pub files: Vec<String>,
    pub filelist: Option<PathBuf>,
    pub local_changes: bool,
    pub minified: bool,
    pub esm: bool,
    pub watch: bool,
    pub headless: bool,
    pub firefox: bool,
    pub safari: bool,
    pub edge: bool,
    pub coverage: bool,
    pub report: bool,
    pub verbose: bool,
    pub testnames: bool,
    pub grep: Option<String>,
}

impl TestFlags {
    fn browser(&self) -> Browser {
        if self.edge {
            Browser::Edge
        } else if self.firefox {
            Browser::Firefox
        } else if self.safari {
            Browser::Safari
        } else {
            Browser::Chrome
        }
    }
}

/// Facts about where the run happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    pub is_ci: bool,
    /// CircleCI collects JUnit reports.
    pub is_circleci: bool,
}

impl Environment {
    pub fn from_env() -> Self {
        Self {
            is_ci: env_flag("CI"),
            is_circleci: env_flag("CIRCLECI"),
        }
    }

    pub fn local_dev(self) -> bool {
        !self.is_ci
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty() && v != "0" && v != "false")
}

/// Which test files a run loads, beyond the common harness files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestFiles {
    /// From `--files` and `--filelist`.
    Explicit(Vec<String>),
    /// Tests affected by local changes.
    Selected(Vec<String>),
    /// Every test of the variant.
    All,
}

impl TestFiles {
    /// Resolves `--files` globs against `root` and reads `--filelist`.
    /// Returns `None` when neither flag was given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoMatches`] for a glob matching nothing, and
    /// [`ConfigError::FileList`] for an unreadable list.
    pub fn from_flags(flags: &TestFlags, root: &Path) -> Result<Option<Self>, ConfigError> {
        if flags.files.is_empty() && flags.filelist.is_none() {
            return Ok(None);
        }

        let mut files = Vec::new();
        for glob in flags.files.iter().flat_map(|arg| arg.split(',')) {
            let glob = crate::normalize::path::normalize_slashes(glob.trim());
            if glob.is_empty() {
                continue;
            }
            let patterns = TestPatterns::new(&[glob.as_str()]).map_err(|source| {
                ConfigError::Glob {
                    glob: glob.clone(),
                    source,
                }
            })?;
            let matched = patterns.discover(root);
            if matched.is_empty() {
                return Err(ConfigError::NoMatches(glob));
            }
            files.extend(matched);
        }

        if let Some(list) = &flags.filelist {
            let content = std::fs::read_to_string(list).map_err(|source| ConfigError::FileList {
                path: list.display().to_string(),
                source,
            })?;
            files.extend(
                content
                    .trim()
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(Some(Self::Explicit(files)))
    }
}

/// One entry of the runner's file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePattern {
    pub pattern: String,
    /// Loaded into the page, rather than only served.
    pub included: bool,
    pub nocache: bool,
    pub watched: bool,
}

impl FilePattern {
    fn included(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            included: true,
            nocache: false,
            watched: true,
        }
    }

    fn served(pattern: &str) -> Self {
        Self {
            included: false,
            ..Self::included(pattern)
        }
    }
}

/// Harness files loaded by every run, in order.
fn common_test_paths() -> Vec<FilePattern> {
    vec![
        FilePattern::included("testing/init-tests.js"),
        FilePattern::included("test/fixtures/*.html"),
        FilePattern::served("test/fixtures/served/*.html"),
        FilePattern::served("examples/**/*"),
    ]
}

/// Values exposed to tests inside the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub use_minified_js: bool,
    pub is_module_build: bool,
    pub verbose_logging: bool,
    pub capture_console: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grep: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageConfig {
    pub dir: String,
    pub reports: Vec<String>,
    pub lcov_file: String,
}

/// Fully resolved configuration of one test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunConfig {
    pub variant: TestVariant,
    pub browser: Browser,
    pub headless: bool,
    pub files: Vec<FilePattern>,
    pub reporters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junit_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageConfig>,
    pub single_run: bool,
    pub client: ClientConfig,
}

impl TestRunConfig {
    pub fn build(
        variant: TestVariant,
        flags: &TestFlags,
        env: &Environment,
        test_files: &TestFiles,
    ) -> Self {
        let name = variant.name();

        let mut files = common_test_paths();
        match test_files {
            TestFiles::Explicit(list) | TestFiles::Selected(list) => {
                files.extend(list.iter().map(|f| FilePattern::included(f)));
            }
            TestFiles::All => {
                files.extend(variant.patterns().iter().map(|p| FilePattern::included(p)));
            }
        }

        let explicit = !flags.files.is_empty() || flags.filelist.is_some();
        let mut reporters = vec!["dots".to_string()];
        if (flags.testnames || flags.local_changes || explicit || flags.verbose) && !env.is_ci {
            reporters = vec!["mocha".to_string()];
        }

        let junit_output = env.is_circleci.then(|| {
            reporters.push("junit".to_string());
            format!("result-reports/{name}.xml")
        });

        let coverage = flags.coverage.then(|| {
            reporters.push("coverage-istanbul".to_string());
            let reports: &[&str] = if env.is_ci {
                &["lcovonly"]
            } else {
                &["html", "text", "text-summary"]
            };
            CoverageConfig {
                dir: "test/coverage".to_string(),
                reports: reports.iter().map(|r| (*r).to_string()).collect(),
                lcov_file: format!("lcov-{name}.info"),
            }
        });

        let json_output = flags.report.then(|| {
            reporters.push("json-result".to_string());
            format!("result-reports/{name}.json")
        });

        Self {
            variant,
            browser: flags.browser(),
            headless: flags.headless,
            files,
            reporters,
            junit_output,
            json_output,
            coverage,
            single_run: !flags.watch,
            client: ClientConfig {
                use_minified_js: flags.minified,
                is_module_build: flags.esm,
                verbose_logging: flags.verbose,
                capture_console: flags.verbose || !flags.files.is_empty(),
                grep: flags.grep.clone(),
            },
        }
    }

    pub fn test_patterns(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.pattern.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const LOCAL: Environment = Environment { is_ci: false, is_circleci: false };
    const CIRCLECI: Environment = Environment { is_ci: true, is_circleci: true };

    fn patterns(config: &TestRunConfig) -> Vec<&str> {
        config.test_patterns().collect()
    }

    #[test]
    fn default_unit_run_loads_all_unit_tests() {
        let config = TestRunConfig::build(
            TestVariant::Unit,
            &TestFlags::default(),
            &LOCAL,
            &TestFiles::All,
        );
        assert_eq!(
            patterns(&config),
            vec![
                "testing/init-tests.js",
                "test/fixtures/*.html",
                "test/fixtures/served/*.html",
                "examples/**/*",
                "src/components/**/test/*.js",
                "src/components/**/test/unit/*.js",
            ]
        );
        assert!(!config.files[2].included);
        assert_eq!(config.browser, Browser::Chrome);
        assert!(config.single_run);
        assert_eq!(config.reporters, vec!["dots"]);
    }

    #[test]
    fn selected_tests_replace_variant_patterns() {
        let flags = TestFlags { local_changes: true, ..Default::default() };
        let selected = TestFiles::Selected(vec!["test/unit/foo-test.js".into()]);
        let config = TestRunConfig::build(TestVariant::Unit, &flags, &LOCAL, &selected);

        assert_eq!(patterns(&config).last(), Some(&"test/unit/foo-test.js"));
        assert_eq!(config.files.len(), 5);
        assert_eq!(config.reporters, vec!["mocha"]);
    }

    #[test]
    fn integration_uses_integration_patterns() {
        let config = TestRunConfig::build(
            TestVariant::Integration,
            &TestFlags::default(),
            &LOCAL,
            &TestFiles::All,
        );
        assert_eq!(patterns(&config).last(), Some(&"test/integration/**/*.js"));
    }

    #[test]
    fn browser_precedence() {
        let flags = TestFlags { firefox: true, safari: true, ..Default::default() };
        assert_eq!(flags.browser(), Browser::Firefox);
        let flags = TestFlags { edge: true, firefox: true, ..Default::default() };
        assert_eq!(flags.browser(), Browser::Edge);
    }

    #[test]
    fn ci_reporters_and_coverage() {
        let flags = TestFlags {
            coverage: true,
            report: true,
            verbose: true,
            ..Default::default()
        };
        let config = TestRunConfig::build(TestVariant::Unit, &flags, &CIRCLECI, &TestFiles::All);

        assert_eq!(config.reporters, vec!["dots", "junit", "coverage-istanbul", "json-result"]);
        assert_eq!(config.junit_output.as_deref(), Some("result-reports/unit.xml"));
        assert_eq!(config.json_output.as_deref(), Some("result-reports/unit.json"));
        let coverage = config.coverage.unwrap();
        assert_eq!(coverage.reports, vec!["lcovonly"]);
        assert_eq!(coverage.lcov_file, "lcov-unit.info");
    }

    #[test]
    fn client_flags() {
        let flags = TestFlags {
            minified: true,
            esm: true,
            watch: true,
            files: vec!["a.js".into()],
            ..Default::default()
        };
        let config = TestRunConfig::build(
            TestVariant::Unit,
            &flags,
            &LOCAL,
            &TestFiles::Explicit(vec!["a.js".into()]),
        );
        assert!(!config.single_run);
        assert!(config.client.use_minified_js);
        assert!(config.client.is_module_build);
        assert!(config.client.capture_console);
        assert!(!config.client.verbose_logging);
    }

    #[test]
    fn build_is_pure() {
        let flags = TestFlags { verbose: true, ..Default::default() };
        let a = TestRunConfig::build(TestVariant::Unit, &flags, &LOCAL, &TestFiles::All);
        let b = TestRunConfig::build(TestVariant::Unit, &flags, &LOCAL, &TestFiles::All);
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_to_json() {
        let config = TestRunConfig::build(
            TestVariant::Unit,
            &TestFlags::default(),
            &LOCAL,
            &TestFiles::All,
        );
        let json: serde_json::Value = serde_json::to_value(&config).unwrap();
        assert_eq!(json["variant"], "unit");
        assert_eq!(json["browser"], "chrome");
        assert!(json.get("coverage").is_none());
    }

    #[test]
    fn files_flag_expands_globs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("test/unit")).unwrap();
        fs::write(dir.path().join("test/unit/a-test.js"), "").unwrap();
        fs::write(dir.path().join("test/unit/b-test.js"), "").unwrap();

        let flags = TestFlags { files: vec!["test/unit/a-*.js".into()], ..Default::default() };
        assert_eq!(
            TestFiles::from_flags(&flags, dir.path()).unwrap(),
            Some(TestFiles::Explicit(vec!["test/unit/a-test.js".into()]))
        );
    }

    #[test]
    fn files_flag_matching_nothing_is_error() {
        let dir = tempdir().unwrap();
        let flags = TestFlags { files: vec!["test/nope/*.js".into()], ..Default::default() };
        let err = TestFiles::from_flags(&flags, dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NoMatches(g) if g == "test/nope/*.js"));
    }

    #[test]
    fn filelist_is_comma_separated() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "a.js,b.js\n").unwrap();

        let flags = TestFlags { filelist: Some(list), ..Default::default() };
        assert_eq!(
            TestFiles::from_flags(&flags, dir.path()).unwrap(),
            Some(TestFiles::Explicit(vec!["a.js".into(), "b.js".into()]))
        );
    }

    #[test]
    fn no_file_flags_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(TestFiles::from_flags(&TestFlags::default(), dir.path()).unwrap(), None);
    }
}
