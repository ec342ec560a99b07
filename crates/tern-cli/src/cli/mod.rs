//! Command-line interface definition for tern.
//!
//! tern has no subcommands: by default it serves the project, and two flags
//! switch it into one-shot modes (`--build-static`, `--install-wasm`).


use std::path::PathBuf;

use clap::Parser;
use tern_config::{ConfigOverrides, DiagnosticLevel, EsTarget};

use crate::error::{Result, ResultExt};

/// tern - on-demand TypeScript development server
#[derive(Parser, Debug)]
#[command(
    name = "tern",
    version,
    about = "On-demand TypeScript development server with live reload",
    long_about = "tern serves the current directory over HTTP and compiles TypeScript,\n\
                  TSX, JSX and JavaScript files to browser-ready JavaScript the moment\n\
                  they are requested. With --watch-files, editing a served file reloads\n\
                  every connected browser."
)]
pub struct Cli {
    /// Port for the HTTP server (default 5000)
    ///
    /// The live-reload WebSocket listens on the next port up.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Watch served files and reload the browser on changes
    #[arg(short = 'w', long)]
    pub watch_files: bool,

    /// Report TypeScript problems in the browser console as warnings
    #[arg(long, conflicts_with = "ts_error")]
    pub ts_warning: bool,

    /// Report TypeScript problems in the browser console as errors
    #[arg(long)]
    pub ts_error: bool,

    /// Write a static build of the project to ./dist and exit
    #[arg(long, conflicts_with = "install_wasm")]
    pub build_static: bool,

    /// Install the WebAssembly toolchain (emsdk) and exit
    #[arg(long)]
    pub install_wasm: bool,

    /// ECMAScript version to compile to (default es5)
    ///
    /// One of es5, es2015 (es6), es2016 ... es2022, esnext.
    #[arg(long, value_name = "TARGET")]
    pub target: Option<EsTarget>,

    /// Answer unknown paths with 404 instead of index.html
    #[arg(long)]
    pub disable_spa: bool,

    /// Directories to leave out of the static build
    #[arg(long, num_args = 1.., value_name = "DIR")]
    pub exclude_dirs: Vec<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Flags that were given explicitly, as the top configuration layer.
    pub fn overrides(&self) -> ConfigOverrides {
        let ts_diagnostics = if self.ts_error {
            Some(DiagnosticLevel::Error)
        } else if self.ts_warning {
            Some(DiagnosticLevel::Warning)
        } else {
            None
        };

        ConfigOverrides {
            port: self.port,
            watch: self.watch_files.then_some(true),
            ts_diagnostics,
            target: self.target,
            disable_spa: self.disable_spa.then_some(true),
            exclude_dirs: (!self.exclude_dirs.is_empty()).then(|| self.exclude_dirs.clone()),
        }
    }

    /// Absolute, symlink-free project root.
    pub fn root_dir(&self) -> Result<PathBuf> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        root.canonicalize().with_path(&root)
    }
}
