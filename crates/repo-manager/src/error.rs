//! Error types for repo-manager

/// Result type for repo-manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in repo-manager operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing configuration, unknown repository type or an
    /// invalid delegation chain
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The data of a removed repository could not be deleted. The
    /// configuration removal itself has already been committed.
    #[error("Failed to clean up data of removed repository '{id}': {message}")]
    Cleanup { id: String, message: String },

    /// One or more handles failed to shut down during a bulk operation
    #[error("Shutdown failed for {}", .failures.join("; "))]
    Shutdown { failures: Vec<String> },

    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// The manager was shut down
    #[error("Repository manager is no longer active")]
    NotActive,

    #[error("Template '{name}': {message}")]
    Template { name: String, message: String },

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    // Transparent wrappers for underlying crate errors
    /// Storage error from repo-store
    #[error(transparent)]
    Store(#[from] repo_store::Error),

    /// Filesystem error from repo-fs
    #[error(transparent)]
    Fs(#[from] repo_fs::Error),
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

    pub fn invalid_location(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// True for configuration errors, including those raised by a
    /// repository while it was being initialized.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Store(repo_store::Error::Config { .. })
        )
    }
}
