//! Error types for the proxy crate.

use thiserror::Error;

/// Errors that can occur in the intercepting proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept a connection.
    #[error("failed to accept connection: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Failed to connect to the backend server.
    #[error("failed to connect to backend {address}: {source}")]
    BackendConnectFailed {
        address: String,
        source: std::io::Error,
    },

    /// The backend dial exceeded the configured timeout.
    #[error("backend {address} did not accept within {timeout_secs}s")]
    BackendConnectTimeout { address: String, timeout_secs: u64 },

    /// A block pattern failed to compile.
    #[error("invalid block pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// TLS setup or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Protocol error on the client connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error on either leg of the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
