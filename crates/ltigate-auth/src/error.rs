//! Storage collaborator error types.

/// Errors from the nonce and consumer storage collaborators.
///
/// These are infrastructure failures, distinct from validation failures:
/// the orchestrator converts them into a `store_unavailable` problem report
/// at the pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The storage operation did not complete within the caller's timeout.
    #[error("store operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

impl StoreError {
    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Returns `true` if the operation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Type alias for storage collaborator results.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::backend("connection refused");
        assert_eq!(err.to_string(), "store backend error: connection refused");
        assert!(!err.is_timeout());

        let err = StoreError::timeout(5000);
        assert_eq!(err.to_string(), "store operation timed out after 5000ms");
        assert!(err.is_timeout());
    }
}
