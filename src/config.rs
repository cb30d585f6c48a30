//! Import configuration
//!
//! Each setting resolves in priority order:
//! 1. Command-line flag (highest priority)
//! 2. Environment variable (read by clap)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::entities::tenant::DEFAULT_TENANT;
use crate::error::{ImportError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "college_applications.db";
pub const DEFAULT_CONFIG_FILE: &str = "college-sync.toml";

/// Contents of the optional TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub database_path: Option<PathBuf>,
    pub tenant: Option<String>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ImportError::Config(e.to_string()))
    }

    /// Explicit path must exist. Without one, `./college-sync.toml` is used
    /// only if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(FileConfig::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ImportError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");

        Self::parse(&content)
    }
}

/// Resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub database_path: PathBuf,
    pub tenant: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE),
            tenant: DEFAULT_TENANT.to_string(),
        }
    }
}

impl ImportConfig {
    /// Merge CLI/env values over the file over the defaults
    pub fn resolve(
        cli_database: Option<PathBuf>,
        cli_tenant: Option<String>,
        file: FileConfig,
    ) -> Result<Self> {
        let defaults = ImportConfig::default();

        let tenant = cli_tenant
            .or(file.tenant)
            .unwrap_or(defaults.tenant)
            .trim()
            .to_string();
        if tenant.is_empty() {
            return Err(ImportError::Config("tenant name must not be empty".to_string()));
        }

        Ok(ImportConfig {
            database_path: cli_database
                .or(file.database_path)
                .unwrap_or(defaults.database_path),
            tenant,
        })
    }
}
