//! Settings errors.

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but couldn't be read.
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file isn't valid JSON, or doesn't match the schema.
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A value parsed but can't be used, such as a host that breaks the URL.
    #[error("invalid setting: {0}")]
    InvalidValue(String),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
