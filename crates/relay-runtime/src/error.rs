//! Error types for the Relay runtime

use relay_core::{CoreError, GatewayError};
use std::path::PathBuf;
use thiserror::Error;

/// Runtime error types
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Catalogue file could not be read
    #[error("Failed to read catalogue file {path}: {source}")]
    CatalogueFile {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Engine error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Backend gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
