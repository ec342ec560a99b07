//! Emscripten SDK installer.
//!
//! Clones emsdk into the current directory and activates the latest
//! toolchain. Nothing is served afterwards.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{CliError, Result};
use crate::ui;

pub const EMSDK_REPOSITORY: &str = "https://github.com/emscripten-core/emsdk.git";

/// Shell script run by `--install-wasm`.
pub fn install_script() -> String {
    [
        "echo 'Installing emsdk'".to_string(),
        format!("git clone {}", EMSDK_REPOSITORY),
        "cd emsdk".to_string(),
        "./emsdk install latest".to_string(),
        "./emsdk activate latest".to_string(),
    ]
    .join(" && ")
}

pub async fn execute() -> Result<()> {
    ui::info("Installing the Emscripten SDK into ./emsdk");
    run_installer(&install_script()).await?;
    ui::success("Emscripten SDK installed. Run `source ./emsdk/emsdk_env.sh` to use it.");
    Ok(())
}

/// Run `script` under bash with the terminal attached.
pub async fn run_installer(script: &str) -> Result<()> {
    debug!(script, "running installer");
    let status = Command::new("bash")
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| CliError::Install(format!("failed to start bash: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(CliError::Install(match status.code() {
            Some(code) => format!("installer exited with status {}", code),
            None => "installer was terminated by a signal".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_script_steps() {
        let script = install_script();
        assert!(script.starts_with("echo"));
        assert!(script.contains("git clone https://github.com/emscripten-core/emsdk.git"));
        let install = script.find("./emsdk install latest").unwrap();
        let activate = script.find("./emsdk activate latest").unwrap();
        assert!(install < activate);
    }

    #[tokio::test]
    async fn test_run_installer_success() {
        run_installer("true").await.unwrap();
    }

    #[tokio::test]
    async fn test_run_installer_reports_exit_code() {
        let err = run_installer("exit 3").await.unwrap_err();
        assert!(matches!(&err, CliError::Install(msg) if msg.contains("status 3")));
    }
}
