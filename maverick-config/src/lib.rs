//! ABOUTME: `ValidationConfig` loading for the `validate` step's stage profiles
//! ABOUTME: Two-phase load: deserialize from TOML, then a separate validation pass

pub mod error;

pub use error::{ConfigError, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// One named validation stage: a command vector plus a timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub command: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

const fn default_timeout_seconds() -> u64 {
    300
}

/// External collaborator surface consumed by `ValidateStep`:
/// named stage profiles plus a default set used when a `validate` step omits
/// `stages` entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub stages: HashMap<String, StageConfig>,
    pub default_stages: Vec<String>,
}

impl ValidationConfig {
    /// Load from a TOML file, then validate.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        debug!(stages = config.stages.len(), "loaded validation config");
        Ok(config)
    }

    /// Parse from an in-memory TOML string (used by tests and embedded
    /// builtin profiles).
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve a named stage, or every stage in `default_stages` if `names`
    /// is empty. Returns the first unresolvable name as an error.
    pub fn resolve<'a>(&'a self, names: &[String]) -> Result<Vec<(&'a str, &'a StageConfig)>> {
        let names: &[String] = if names.is_empty() {
            &self.default_stages
        } else {
            names
        };

        names
            .iter()
            .map(|name| {
                self.stages
                    .get(name)
                    .map(|cfg| (name.as_str(), cfg))
                    .ok_or_else(|| ConfigError::Validation {
                        field: "stages".to_string(),
                        message: format!("no stage profile named '{name}'"),
                    })
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for (name, stage) in &self.stages {
            if stage.command.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("stages.{name}.command"),
                    message: "stage command cannot be empty".to_string(),
                });
            }
            if stage.timeout_seconds == 0 {
                return Err(ConfigError::Validation {
                    field: format!("stages.{name}.timeout_seconds"),
                    message: "stage timeout cannot be zero".to_string(),
                });
            }
        }
        for name in &self.default_stages {
            if !self.stages.contains_key(name) {
                return Err(ConfigError::Validation {
                    field: "default_stages".to_string(),
                    message: format!("default stage '{name}' is not defined in [stages]"),
                });
            }
        }
        Ok(())
    }
}
