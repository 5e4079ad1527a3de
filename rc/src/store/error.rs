//! Store error types

use std::time::Duration;
use thiserror::Error;

/// Errors a [`DataStore`](super::DataStore) can report from `repopulate`
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is shutting down")]
    ShuttingDown,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Repopulate timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Check if a later repopulate could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::ShuttingDown => false,
            StoreError::Unavailable(_) => true,
            StoreError::Timeout(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(!StoreError::ShuttingDown.is_retryable());
        assert!(StoreError::Unavailable("db locked".to_string()).is_retryable());
        assert!(StoreError::Timeout(Duration::from_secs(5)).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Unavailable("db locked".to_string());
        assert_eq!(err.to_string(), "Store unavailable: db locked");
    }
}
