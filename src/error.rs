//! Error types for SthiraSLAM.

use thiserror::Error;

/// SthiraSLAM error type.
#[derive(Error, Debug)]
pub enum SthiraError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SthiraError {
    fn from(e: toml::de::Error) -> Self {
        SthiraError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SthiraError>;
