//! Error types for sourcelock.
//!
//! All errors implement `std::error::Error` and provide human-readable
//! messages. Variants are specific enough for programmatic handling: a
//! caller can distinguish "no readable input source" from "the OS rejected
//! the switch" without string matching.

use thiserror::Error;

/// Primary error type for sourcelock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The OS cannot report a valid identifier for the active input source.
    ///
    /// Surfaced by `lock()` when the current source is unreadable. During
    /// reconciliation the same condition is swallowed and retried on the
    /// next trigger, so it never reaches a caller from that path.
    #[error("current input source has no readable identifier")]
    QueryUnavailable,

    /// The OS rejected a request to select an input source.
    ///
    /// Contains the OSStatus code for debugging.
    #[error("input source activation failed (status {code})")]
    ActivationFailed {
        /// The OSStatus returned by the selection call.
        code: i32,
    },

    /// No installed input source matches the requested identifier.
    ///
    /// Can happen when a locked source is removed from the system while
    /// the lock is held.
    #[error("input source not found: {id}")]
    SourceNotFound {
        /// The identifier that could not be resolved.
        id: String,
    },

    /// Login-item registration or query failed.
    #[error("auto-start operation failed: {message}")]
    AutoStart {
        /// Human-readable failure description.
        message: String,
    },
}

/// Result type alias for sourcelock operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new `ActivationFailed` error from an OSStatus code.
    #[must_use]
    pub const fn activation_failed(code: i32) -> Self {
        Self::ActivationFailed { code }
    }

    /// Create a new `SourceNotFound` error.
    #[must_use]
    pub fn source_not_found(id: impl Into<String>) -> Self {
        Self::SourceNotFound { id: id.into() }
    }

    /// Create a new `AutoStart` error.
    #[must_use]
    pub fn auto_start(message: impl Into<String>) -> Self {
        Self::AutoStart {
            message: message.into(),
        }
    }

    /// Check if this error means the active source could not be read.
    #[must_use]
    pub const fn is_query_unavailable(&self) -> bool {
        matches!(self, Self::QueryUnavailable)
    }

    /// Check if this error came from a rejected or unresolvable activation.
    #[must_use]
    pub const fn is_activation_failure(&self) -> bool {
        matches!(
            self,
            Self::ActivationFailed { .. } | Self::SourceNotFound { .. }
        )
    }

    /// Get the OSStatus code if this is an `ActivationFailed` error.
    #[must_use]
    pub const fn status_code(&self) -> Option<i32> {
        match self {
            Self::ActivationFailed { code } => Some(*code),
            _ => None,
        }
    }
}
