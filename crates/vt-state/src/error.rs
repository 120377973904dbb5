use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a key-value backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid database path: {0}")]
    InvalidPath(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the deployment ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Deployment already exists: {provider}:{template}")]
    AlreadyExists { provider: String, template: String },

    #[error("Deployment not found: {provider}:{template}")]
    NotFound { provider: String, template: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
