use crate::domain::gateway::GatewayError;
use thiserror::Error;

/// Core error type for the Relay engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The transaction type name does not resolve in the registry
    #[error("Unknown transaction type: {0}")]
    UnknownTransactionType(String),

    /// The workflow name does not resolve in the registry
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    /// A transaction was asked to leave a terminal status
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// A catalogue or definition failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The backend gateway failed outside of a transaction dispatch
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl CoreError {
    /// Whether this error was raised before any I/O happened.
    ///
    /// Construction-time errors are caller mistakes and are never worth retrying.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownTransactionType(_)
                | CoreError::UnknownWorkflow(_)
                | CoreError::ValidationError(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}
