//! Error types for the architecture crate.

use thiserror::Error;

/// Errors that can occur while loading or querying a device architecture.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArchError {
    /// A file could not be read or has an unusable envelope.
    #[error("Config error: {0}")]
    Config(String),

    /// File contents reference qubits or edges inconsistently.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A query addressed a qubit or subset size outside the device.
    #[error("Domain error: {0}")]
    Domain(String),
}

impl ArchError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ArchError::Config(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        ArchError::Schema(msg.into())
    }

    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        ArchError::Domain(msg.into())
    }
}

/// Result type for architecture operations.
pub type ArchResult<T> = Result<T, ArchError>;
