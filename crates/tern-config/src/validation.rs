//! Startup validation of a resolved [`ServerConfig`].

use std::path::Component;

use crate::error::{ConfigError, Result};
use crate::server::ServerConfig;

impl ServerConfig {
    /// Check the configuration against the filesystem.
    ///
    /// # Errors
    ///
    /// - the root does not exist or is not a directory
    /// - the port leaves no room for the live-reload port (`port + 1`)
    /// - an exclude dir is absolute or escapes the root
    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(ConfigError::RootNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(ConfigError::RootNotDirectory(self.root.clone()));
        }

        if self.port == u16::MAX {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: self.port.to_string(),
                hint: "The live-reload channel uses port + 1; choose a port below 65535"
                    .to_string(),
            });
        }

        for dir in &self.exclude_dirs {
            let escapes = dir
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
            if escapes {
                return Err(ConfigError::InvalidValue {
                    field: "exclude_dirs".to_string(),
                    value: dir.display().to_string(),
                    hint: "Exclude dirs are relative to the project root and cannot contain '..'"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}
