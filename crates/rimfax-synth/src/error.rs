//! Error types for the synthesis crate.

use thiserror::Error;

/// Errors that can occur during synthesis.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SynthError {
    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A tableau could not be parsed or constructed.
    #[error("Tableau error: {0}")]
    Tableau(String),

    /// The constraint system could not be built.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The solver failed or returned an indeterminate outcome.
    #[error("Solver error: {0}")]
    Solver(String),

    /// Internal invariant violated by the search bounds.
    #[error("Search bounds misconfigured: {0}")]
    Bounds(String),

    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] rimfax_ir::IrError),
}

/// Result type for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;
