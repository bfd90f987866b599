//! Result and error types for Tocar.

use thiserror::Error;

/// Result type for Tocar operations
pub type TocarResult<T> = Result<T, TocarError>;

/// Errors that can occur while driving a target document.
///
/// All four interaction-time kinds (`AssertionFailed`, `Usage`, `Target`,
/// `Timeout`) funnel into the same fail-current-case path in the suite
/// runner; the suite does not distinguish them beyond the logged message.
#[derive(Debug, Error)]
pub enum TocarError {
    /// An assertion did not hold, including locator "not found" conditions
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// The gesture state machine was used out of order
    #[error("Usage error: {message}")]
    Usage {
        /// Error message
        message: String,
    },

    /// An uncaught error surfaced from inside the target document
    #[error("Target document error: {message}")]
    Target {
        /// Error message
        message: String,
    },

    /// A test case exceeded its allotted time without signalling completion
    #[error("Test has timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// An element reference was used after the document it belonged to
    /// was unloaded or reloaded
    #[error("Stale element reference: {message}")]
    StaleElement {
        /// Error message
        message: String,
    },

    /// JSON error (storage snapshots)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TocarError {
    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a usage error
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a target document error
    #[must_use]
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target {
            message: message.into(),
        }
    }

    /// Create a stale element reference error
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleElement {
            message: message.into(),
        }
    }
}
