//! ABOUTME: Errors for loading and validating ValidationConfig
//! ABOUTME: One structured variant per failure cause (io, parse, field validation)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration field '{field}': {message}")]
    Validation { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
