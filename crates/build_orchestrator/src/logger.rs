//! Logging setup.
//!
//! Log output goes to stderr so the `unit` and `affected` commands can print
//! machine-readable results on stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "build_orchestrator=info";

/// Initialize the tracing subscriber.
///
/// Level precedence: `verbose` (debug), then `quiet` (errors only), then
/// `RUST_LOG`, then info.
pub fn init_logger(verbose: bool, quiet: bool) {
    tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("build_orchestrator=debug")
    } else if quiet {
        EnvFilter::new("build_orchestrator=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(filter_for(true, true).to_string(), "build_orchestrator=debug");
        assert_eq!(filter_for(false, true).to_string(), "build_orchestrator=error");
    }
}
