//! Provider error types

use thiserror::Error;
use vt_state::LedgerError;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not registered: {0}")]
    NotRegistered(String),

    #[error("Template '{template}' has no configuration for provider '{provider}'")]
    Unsupported { provider: String, template: String },

    #[error("Template '{template}' is already running on provider '{provider}'")]
    AlreadyRunning { provider: String, template: String },

    #[error("Template '{template}' is not running on provider '{provider}'")]
    NotRunning { provider: String, template: String },

    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Invalid project: {0}")]
    Validation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
