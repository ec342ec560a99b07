//! Miette diagnostic conversion for CLI errors.

use miette::Report;

use crate::error::{CliError, ConfigError};

/// Convert a [`CliError`] into a `miette` report for the process exit path.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => config_error_to_miette(e),
        CliError::Server(msg) => miette::miette!(
            help = "Another process may be using the port. Pick a different one with --port",
            "Server error: {}",
            msg
        ),
        CliError::FileNotFound(path) => {
            miette::miette!("File not found: {}", path.display())
        }
        _ => miette::miette!("{}", err),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::RootNotFound(path) | ConfigError::RootNotDirectory(path) => miette::miette!(
            help = "Run tern from the project directory or pass --root <DIR>",
            "Project root is not a usable directory: {}",
            path.display()
        ),
        other => miette::miette!("Configuration error: {}", other),
    }
}
