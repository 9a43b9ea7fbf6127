//! Command-line arguments.

use crate::config::TestFlags;
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "build-orchestrator", version, about = "On-demand bundle builds and change-driven test selection")]
pub struct Cli {
    /// Debug-level logging.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Repository root.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the repository, building bundles as they are requested
    Serve(ServeArgs),
    /// Emit the unit test run configuration
    Unit(TestArgs),
    /// Emit the integration test run configuration
    Integration(TestArgs),
    /// Print the tests affected by local changes
    Affected(AffectedArgs),
}

/// Inputs shared by commands that read the repository layout.
#[derive(Debug, Clone, Args)]
pub struct RepoArgs {
    /// Bundle manifest, relative to the root.
    #[arg(long, default_value = "build-system/bundles.json")]
    pub manifest: PathBuf,

    /// tsconfig holding `compilerOptions.paths`, relative to the root.
    #[arg(long, default_value = "tsconfig.base.json")]
    pub tsconfig: PathBuf,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    #[arg(long)]
    pub minified: bool,

    #[arg(long)]
    pub esm: bool,

    /// Serve the production runtime; nothing is built locally.
    #[arg(long)]
    pub cdn: bool,

    /// Do not rebuild bundles when their sources change.
    #[arg(long = "no_watch")]
    pub no_watch: bool,

    /// Compiler program invoked as `<compiler> <compiler_arg...> <bundle>`.
    #[arg(long, default_value = "npx")]
    pub compiler: String,

    #[arg(long = "compiler_arg", default_values_t = ["amp".to_string(), "build".to_string()])]
    pub compiler_args: Vec<String>,

    #[command(flatten)]
    pub repo: RepoArgs,
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Run only tests affected by changes on this branch.
    #[arg(long = "local_changes")]
    pub local_changes: bool,

    /// Test file globs; repeat or separate with commas.
    #[arg(long)]
    pub files: Vec<String>,

    /// File holding a comma-separated list of tests.
    #[arg(long)]
    pub filelist: Option<PathBuf>,

    #[arg(long)]
    pub minified: bool,

    #[arg(long)]
    pub esm: bool,

    #[arg(long)]
    pub watch: bool,

    #[arg(long)]
    pub headless: bool,

    #[arg(long)]
    pub firefox: bool,

    #[arg(long)]
    pub safari: bool,

    #[arg(long)]
    pub edge: bool,

    #[arg(long)]
    pub coverage: bool,

    #[arg(long)]
    pub report: bool,

    #[arg(long)]
    pub testnames: bool,

    #[arg(long)]
    pub grep: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,
}

impl TestArgs {
    pub fn flags(&self, verbose: bool) -> TestFlags {
        TestFlags {
            files: self.files.clone(),
            filelist: self.filelist.clone(),
            local_changes: self.local_changes,
            minified: self.minified,
            esm: self.esm,
            watch: self.watch,
            headless: self.headless,
            firefox: self.firefox,
            safari: self.safari,
            edge: self.edge,
            coverage: self.coverage,
            report: self.report,
            verbose,
            testnames: self.testnames,
            grep: self.grep.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct AffectedArgs {
    /// Diff against this revision instead of the merge base with main.
    #[arg(long)]
    pub base: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,
}
