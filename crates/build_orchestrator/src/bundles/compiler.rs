//! Boundary to the external compile toolchain.

use super::registry::Bundle;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

/// Errors from one compile invocation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to start compiler {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("compiler exited with {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error("{0}")]
    Other(String),
}

/// Flags passed to each compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// The caller keeps rebuilding on change. Only in-process compilers can
    /// act on this; a command must exit for its build to count as done.
    pub watch: bool,
    pub minify: bool,
    pub local_dev: bool,
}

/// Compiles one bundle. Implementations must be safe to call concurrently
/// for different bundles.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, bundle: &Bundle, options: CompileOptions) -> Result<(), CompileError>;
}

/// [`Compiler`] that runs `<program> <args...> <bundle> [--minify]` and waits
/// for it to exit. `watch` is not forwarded; rebuilds come from the bundle
/// watcher.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: PathBuf) -> Self {
        Self {
            program: program.into(),
            args,
            cwd,
        }
    }

    fn command_args(&self, bundle: &Bundle, options: CompileOptions) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(bundle.name.clone());
        if options.minify {
            args.push("--minify".to_string());
        }
        args
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(&self, bundle: &Bundle, options: CompileOptions) -> Result<(), CompileError> {
        let args = self.command_args(bundle, options);
        tracing::debug!(program = %self.program, ?args, "spawning compiler");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.cwd)
            .env("LOCAL_DEV", if options.local_dev { "1" } else { "0" })
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(CompileError::Failed {
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn compiler(program: &str, args: &[&str]) -> CommandCompiler {
        CommandCompiler::new(
            program,
            args.iter().map(|s| (*s).to_string()).collect(),
            std::env::temp_dir(),
        )
    }

    #[test]
    fn appends_bundle_and_flags() {
        let c = compiler("node", &["build.js"]);
        let bundle = Bundle::component("amp-foo", "0.1", false);
        let args = c.command_args(
            &bundle,
            CompileOptions { watch: true, minify: true, local_dev: false },
        );
        assert_eq!(args, vec!["build.js", "amp-foo", "--minify"]);

        let args = c.command_args(&bundle, CompileOptions::default());
        assert_eq!(args, vec!["build.js", "amp-foo"]);
    }

    #[test]
    fn default_command_never_asks_to_watch() {
        let c = compiler("npx", &["amp", "build"]);
        let options = CompileOptions { watch: true, minify: false, local_dev: true };
        let args = c.command_args(&Bundle::component("amp-foo", "0.1", false), options);
        assert_eq!(args, vec!["amp", "build", "amp-foo"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn watching_build_still_completes() {
        let c = compiler("sh", &["-c", "exit 0", "sh"]);
        let options = CompileOptions { watch: true, ..CompileOptions::default() };
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            c.compile(&Bundle::component("amp-foo", "0.1", false), options),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_exit_status_and_stderr() {
        let c = compiler("sh", &["-c", "echo boom >&2; exit 3", "sh"]);
        let err = c
            .compile(&Bundle::component("amp-foo", "0.1", false), CompileOptions::default())
            .await
            .unwrap_err();
        match err {
            CompileError::Failed { status, stderr } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn succeeds_on_zero_exit() {
        let c = compiler("sh", &["-c", "exit 0", "sh"]);
        c.compile(&Bundle::component("amp-foo", "0.1", false), CompileOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let c = compiler("definitely-not-a-real-compiler-binary", &[]);
        let err = c
            .compile(&Bundle::component("a", "0.1", false), CompileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }
}
