//! Shared error definitions for agent primitives.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the gateway for primitive validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for calls made against remote services.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Errors that can occur while constructing primitive value objects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A required identifier was absent or blank.
    #[error("missing required identifier `{field}`")]
    MissingIdentifier {
        /// Name of the identifier that was not supplied.
        field: &'static str,
    },

    /// Identifier was present but failed validation.
    #[error("invalid identifier `{field}`: {reason}")]
    InvalidIdentifier {
        /// Name of the offending identifier.
        field: &'static str,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// Failure reported by a remote collaborator (template library, knowledge store,
/// guardrail service, monitoring backend).
///
/// Stage errors wrap this type so callers can tell which stage of a turn failed
/// while still matching on the upstream classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The referenced resource does not exist.
    #[error("upstream resource not found: {resource}")]
    NotFound {
        /// Identifier or description of the missing resource.
        resource: String,
    },

    /// The caller is not allowed to access the resource.
    #[error("upstream permission denied: {reason}")]
    PermissionDenied {
        /// Detail returned by the service.
        reason: String,
    },

    /// The service is throttling requests.
    #[error("upstream throttled (retry after {retry_after:?})")]
    Throttled {
        /// Suggested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The service answered with an unexpected shape.
    #[error("malformed upstream response: {reason}")]
    Malformed {
        /// What could not be decoded.
        reason: String,
    },

    /// The service could not be reached or failed for another reason.
    #[error("upstream unavailable: {reason}")]
    Unavailable {
        /// Additional context about the failure.
        reason: String,
    },
}

impl UpstreamError {
    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for unreachable services.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` for not-found and permission failures.
    #[must_use]
    pub const fn is_access_failure(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::PermissionDenied { .. })
    }
}
