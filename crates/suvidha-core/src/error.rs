//! Error types for the SUVIDHA kiosk core

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the catalog, session and configuration layers
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
