//! Error types for the feed engine.
//!
//! The taxonomy maps one-to-one onto the outcomes an API layer surfaces:
//! not-found, forbidden, conflict, validation, and internal/store failures.
//! A failed item inside a batched fetch is never an error at this level;
//! the batch fetcher drops the item and the batch succeeds.

use thiserror::Error;

/// Result type for feed-engine operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced entity absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Ownership or role check failed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Duplicate interaction or similar client-state clash
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed or missing input
    #[error("validation error: {0}")]
    Validation(String),

    /// Remote store call failed; never auto-retried here
    #[error("store error: {0}")]
    Store(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_taxonomy_prefix() {
        assert_eq!(
            AppError::NotFound("post 42".into()).to_string(),
            "not found: post 42"
        );
        assert_eq!(
            AppError::Conflict("already liked".into()).to_string(),
            "conflict: already liked"
        );
    }

    #[test]
    fn serde_json_errors_map_to_internal() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        matches!(AppError::from(err), AppError::Internal(_));
    }
}
