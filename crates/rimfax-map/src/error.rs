//! Error types for the mapping crate.

use thiserror::Error;

/// Errors that can occur during mapping.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MapError {
    /// Error from the architecture crate.
    #[error("Architecture error: {0}")]
    Arch(#[from] rimfax_arch::ArchError),

    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] rimfax_ir::IrError),

    /// Invalid mapping settings.
    #[error("Config error: {0}")]
    Config(String),

    /// The circuit does not fit the device.
    #[error("Circuit requires {required} qubits but target only has {available}")]
    CircuitTooLarge { required: usize, available: usize },

    /// No routing satisfies a layer.
    #[error("Routing error: {0}")]
    Routing(String),
}

/// Result type for mapping operations.
pub type MapResult<T> = Result<T, MapError>;
