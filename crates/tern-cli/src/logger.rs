//! Logging infrastructure for the tern CLI.
//!
//! Structured logging through `tracing`. The request pipeline logs cache
//! hits and misses at `debug`, compilations and reload broadcasts at `info`,
//! dropped reload clients at `warn` and failed compilations at `error`.
//!
//! # Example
//!
//! ```rust,no_run
//! use tern_cli::logger::init_logger;
//! use tracing::info;
//!
//! init_logger(false, false, false);
//! info!("Starting dev server");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "tern=debug,tern_cli=debug,tern_config=debug,tern_transpile=debug";
const QUIET_FILTER: &str = "tern=error,tern_cli=error";
const DEFAULT_FILTER: &str = "tern=info,tern_cli=info";

/// Initialize the tracing subscriber with the specified options.
///
/// Call once at startup, before anything logs.
///
/// # Verbosity Levels
///
/// 1. `--verbose`: DEBUG for every tern crate
/// 2. `--quiet`: ERROR only
/// 3. `RUST_LOG`: custom filter
/// 4. Default: INFO for the binary and the server
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Initialize logger with a custom environment filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so these
    // only exercise filter selection.

    #[test]
    fn test_verbose_wins_over_quiet() {
        let filter = filter_for(true, true).to_string();
        assert!(filter.contains("tern_cli=debug"));
    }

    #[test]
    fn test_quiet_filter() {
        let filter = filter_for(false, true).to_string();
        assert!(filter.contains("tern_cli=error"));
        assert!(!filter.contains("debug"));
    }
}
