//! Error types for repo-store

/// Result type for repo-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in repo-store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The repository has not been initialized, or was shut down
    #[error("Repository is not initialized")]
    NotInitialized,

    /// A write was attempted through a read-only layer
    #[error("Repository is read-only")]
    ReadOnly,

    /// commit() called without a preceding begin()
    #[error("No active transaction")]
    NoActiveTransaction,

    /// begin() called while a transaction is already active
    #[error("A transaction is already active on connection {connection}")]
    TransactionActive { connection: u64 },

    /// The connection was closed
    #[error("Connection {connection} is closed")]
    ConnectionClosed { connection: u64 },

    /// A delegating layer was used before its delegate was set
    #[error("No delegate set for {layer}")]
    NoDelegate { layer: String },

    /// The repository is misconfigured and cannot be used
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The operation is not supported by this repository
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Filesystem error from repo-fs
    #[error(transparent)]
    Fs(#[from] repo_fs::Error),

    /// Store snapshot (de)serialization error
    #[error("Store snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}
