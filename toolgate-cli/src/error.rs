//! CLI-specific error types

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    /// Gateway setup or configuration error
    #[error("Gateway error: {0}")]
    Gateway(#[from] toolgate_core::Error),

    /// Readline/input error
    #[error("Input error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// IO error (filesystem, stdout, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
