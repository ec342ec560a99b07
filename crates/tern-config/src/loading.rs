use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::server::ServerConfig;
use crate::types::{DiagnosticLevel, EsTarget};

/// Name of the optional config file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "tern.toml";

/// Prefix of environment variables merged into the configuration.
pub const ENV_PREFIX: &str = "TERN_";

/// Values given explicitly on the command line.
///
/// `None` fields are skipped during serialization so they never shadow a
/// value coming from the config file or the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_diagnostics: Option<DiagnosticLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EsTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_spa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_dirs: Option<Vec<PathBuf>>,
}

impl ServerConfig {
    /// Load configuration for the project at `root`.
    /// Priority: CLI overrides > environment variables > tern.toml > defaults
    pub fn load(root: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let config = Self::figment(root, overrides).extract::<ServerConfig>()?;
        let config = ServerConfig {
            root: root.to_path_buf(),
            ..config
        };
        config.validate()?;

        tracing::debug!(
            root = %config.root.display(),
            port = config.port,
            watch = config.watch,
            target = %config.target,
            "resolved server configuration"
        );

        Ok(config)
    }

    /// The provider stack behind [`ServerConfig::load`], exposed for inspection.
    pub fn figment(root: &Path, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(ServerConfig::default()));

        let config_file = root.join(CONFIG_FILE_NAME);
        if config_file.is_file() {
            figment = figment.merge(Toml::file(config_file));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
    }
}
