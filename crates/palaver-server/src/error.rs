//! Server error types.

/// Errors that can occur in the server runtime.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, bad janitor period).
    ///
    /// Fatal; fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, I/O error).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Protocol error (a notice failed to serialize).
    ///
    /// Should never happen; indicates a bug in a wire-visible type.
    #[error("protocol error: {0}")]
    Protocol(String),
}
