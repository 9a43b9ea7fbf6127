//! Command implementations.

use crate::affected::changeset::{Baseline, ChangeSet, GitDiff};
use crate::affected::discovery::TestPatterns;
use crate::affected::graph::DependencyGraph;
use crate::affected::resolver::{AliasTable, ImportResolver};
use crate::affected::selector::{Selection, SelectorConfig, TestSelector};
use crate::affected::styles::StyleMap;
use crate::bundles::watcher::spawn_bundle_watcher;
use crate::bundles::{BundleBuilder, BundleRegistry, CommandCompiler, LazyBuildRouter, ServeMode};
use crate::cli::{AffectedArgs, RepoArgs, ServeArgs, TestArgs};
use crate::config::{Environment, TestFiles, TestRunConfig, TestVariant};
use crate::server;
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Serves `root`, lazily building bundles unless serving from the CDN.
///
/// # Errors
///
/// Fails on an invalid manifest, a watcher that cannot start, or a server
/// that cannot bind.
pub async fn serve(root: &Path, args: ServeArgs) -> CommandResult {
    let mode = ServeMode {
        minified: args.minified,
        esm: args.esm,
        cdn: args.cdn,
    };

    let router = if args.cdn {
        None
    } else {
        let registry = BundleRegistry::from_manifest(&root.join(&args.repo.manifest))?;
        tracing::info!(bundles = registry.len(), "loaded bundle manifest");

        let compiler = Arc::new(CommandCompiler::new(
            args.compiler,
            args.compiler_args,
            root.to_path_buf(),
        ));
        let builder = Arc::new(BundleBuilder::new(
            registry.into_shared(),
            compiler,
            args.minified,
            true,
        ));
        if !args.no_watch {
            spawn_bundle_watcher(Arc::clone(&builder), root.to_path_buf())?;
        }
        Some(Arc::new(LazyBuildRouter::new(builder, mode)?))
    };

    server::serve(root, SocketAddr::new(args.host, args.port), mode, router).await?;
    Ok(())
}

/// Prints the resolved test-run configuration as JSON.
///
/// # Errors
///
/// Fails on bad `--files`/`--filelist` input or, with `--local_changes`, when
/// the change set cannot be computed.
#[allow(clippy::print_stdout)]
pub fn test_config(root: &Path, variant: TestVariant, verbose: bool, args: &TestArgs) -> CommandResult {
    let env = Environment::from_env();
    let flags = args.flags(verbose);

    let test_files = match TestFiles::from_flags(&flags, root)? {
        Some(files) => files,
        None if flags.local_changes => {
            let selector = load_selector(root, &args.repo, variant, &env, None)?;
            match selector.select() {
                Selection::Tests(tests) => TestFiles::Selected(tests.clone()),
                Selection::NoneAffected => return Ok(()),
                Selection::RunAll(_) => TestFiles::All,
            }
        }
        None => TestFiles::All,
    };

    let config = TestRunConfig::build(variant, &flags, &env, &test_files);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Prints the affected-test selection as JSON.
///
/// # Errors
///
/// Fails when the manifest, alias table, or change set cannot be loaded.
#[allow(clippy::print_stdout)]
pub fn affected(root: &Path, args: &AffectedArgs) -> CommandResult {
    let env = Environment::from_env();
    let selector = load_selector(root, &args.repo, TestVariant::Unit, &env, args.base.clone())?;

    let output = match selector.select() {
        Selection::Tests(tests) => serde_json::json!({ "selection": "tests", "tests": tests }),
        Selection::NoneAffected => serde_json::json!({ "selection": "none" }),
        Selection::RunAll(reason) => {
            serde_json::json!({ "selection": "all", "reason": reason.to_string() })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_selector(
    root: &Path,
    repo: &RepoArgs,
    variant: TestVariant,
    env: &Environment,
    base: Option<String>,
) -> Result<TestSelector, Box<dyn Error>> {
    let registry = BundleRegistry::from_manifest(&root.join(&repo.manifest))?;
    let styles = StyleMap::from_registry(&registry);

    let tsconfig = root.join(&repo.tsconfig);
    let aliases = if tsconfig.exists() {
        AliasTable::load(&tsconfig)?
    } else {
        tracing::debug!(path = %tsconfig.display(), "no alias config, resolving relative only");
        AliasTable::default()
    };
    let graph = DependencyGraph::new(root.to_path_buf(), ImportResolver::new(aliases));

    let baseline = base.map_or_else(|| Baseline::for_environment(env.is_ci), Baseline::Revision);
    let changes = ChangeSet::query(&GitDiff::new(root.to_path_buf()), &baseline)?;
    tracing::debug!(changed = changes.len(), ?baseline, "computed change set");

    let config = SelectorConfig::new(TestPatterns::new(variant.patterns())?, env.local_dev());
    Ok(TestSelector::new(graph, styles, config, changes))
}
