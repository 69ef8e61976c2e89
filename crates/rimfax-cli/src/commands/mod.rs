//! CLI command implementations.

pub mod map;
pub mod synth;

/// A failed command, carrying the exit-code class.
#[derive(Debug)]
pub enum CommandError {
    /// Bad usage or unreadable inputs (exit code 1).
    Usage(anyhow::Error),
    /// Routing or synthesis failure (exit code 2).
    Failure(anyhow::Error),
}

impl CommandError {
    pub fn usage(err: impl Into<anyhow::Error>) -> Self {
        CommandError::Usage(err.into())
    }

    pub fn failure(err: impl Into<anyhow::Error>) -> Self {
        CommandError::Failure(err.into())
    }
}

pub type CommandResult = Result<(), CommandError>;
