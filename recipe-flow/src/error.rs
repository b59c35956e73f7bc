use thiserror::Error;

use crate::step::Step;

/// Errors raised by the wizard, its persistence layer and the workflow client.
///
/// Step screens turn every variant into the wizard's single `error` string via
/// `Display`, so messages are written for the end user.
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport level failure (endpoint unreachable, connection reset, ...).
    #[error("{0}")]
    Network(String),

    #[error("Workflow request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Failed to parse workflow response: {0}")]
    InvalidBody(String),

    #[error("unexpected response format")]
    UnexpectedResponseFormat,

    #[error("{0}")]
    Validation(String),

    #[error("Step '{0}' is not available yet")]
    StepNotReady(Step),

    #[error("Failed to persist wizard snapshot: {0}")]
    Persistence(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for WizardError {
    fn from(err: sqlx::Error) -> Self {
        WizardError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WizardError>;
