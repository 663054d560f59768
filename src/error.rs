//! Error types for emberchain

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid transaction signature")]
    InvalidTransaction,

    #[error("invalid block signature")]
    InvalidBlock,

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("malformed resource {name}: {reason}")]
    Malformed { name: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
