//! Coordinator error types

use thiserror::Error;

/// Errors raised while building a coordinator
///
/// Nothing on the invalidation path itself returns an error.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No tokio runtime available to run repopulate tasks")]
    NoRuntime,
}
