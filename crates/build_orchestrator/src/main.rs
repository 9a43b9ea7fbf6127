use build_orchestrator::cli::{Cli, Command};
use build_orchestrator::config::TestVariant;
use build_orchestrator::{commands, logger};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose, cli.quiet);

    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let result = match cli.command {
        Command::Serve(args) => commands::serve(&root, args).await,
        Command::Unit(args) => commands::test_config(&root, TestVariant::Unit, cli.verbose, &args),
        Command::Integration(args) => {
            commands::test_config(&root, TestVariant::Integration, cli.verbose, &args)
        }
        Command::Affected(args) => commands::affected(&root, &args),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
