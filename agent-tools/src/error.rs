use std::path::PathBuf;

use thiserror::Error;

/// Result alias for bootstrap operations.
pub type ToolResult<T> = Result<T, BootstrapError>;

/// Errors raised while preparing tool adapters. All of them abort gateway
/// construction.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A repository entry failed validation.
    #[error("invalid tool repository `{name}`: {reason}")]
    InvalidRepository {
        /// Repository name as configured.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two entries share a name and would install into the same directory.
    #[error("tool repository `{name}` is configured more than once")]
    DuplicateRepository {
        /// Repeated name.
        name: String,
    },

    /// Cloning or checking out the repository failed.
    #[error("failed to fetch tool repository `{name}`: {reason}")]
    Fetch {
        /// Repository name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    /// The repository setup command failed.
    #[error("setup command for tool repository `{name}` failed: {reason}")]
    Setup {
        /// Repository name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    /// The checkout does not contain a tool manifest.
    #[error("tool repository `{name}` has no manifest at {}", path.display())]
    ManifestMissing {
        /// Repository name.
        name: String,
        /// Expected manifest location.
        path: PathBuf,
    },

    /// Filesystem access failed.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl BootstrapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
