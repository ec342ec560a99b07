//! Command implementations for the tern CLI.
//!
//! - [`serve`] - the development server (default)
//! - [`build_static`] - one-shot static snapshot into `dist/`
//! - [`install_wasm`] - one-shot emsdk toolchain installer

pub mod build_static;
pub mod install_wasm;
pub mod serve;

use tern_config::ServerConfig;

use crate::cli::Cli;
use crate::error::Result;
use crate::ui;

/// Run whatever mode the parsed flags select.
pub async fn run(args: Cli) -> Result<()> {
    if args.install_wasm {
        return install_wasm::execute().await;
    }

    let root = args.root_dir()?;
    let config = ServerConfig::load(&root, &args.overrides())?;

    if args.build_static {
        let summary = build_static::execute(config).await?;
        summary.report();
        return Ok(());
    }

    ui::info(&format!("Serving {}", root.display()));
    serve::execute(config).await
}
