use serde::Serialize;

// ============================================================================
// Error Taxonomy - shared across every domain module
// ============================================================================
//
// Each domain keeps its own error enum (see domain/*/errors.rs). This module
// only defines the classification every one of them maps onto, plus the
// persistence failure type the repository traits return.
//
// ============================================================================

/// Broad category of a failure, as seen by the caller of a use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Bad input: quantity, coupon, address data
    Validation,
    /// Cart item, order, coupon, variant or address absent
    NotFound,
    /// Caller does not own the row
    Forbidden,
    /// Limit reached or a concurrent writer won
    Conflict,
    /// Illegal order-status transition or total mismatch
    State,
    /// Payment gateway (or another collaborator) failed
    External,
    /// Persistence failure
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::State => "StateError",
            ErrorKind::External => "ExternalError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

/// Maps a domain error onto the taxonomy and onto the message a user sees.
pub trait Classify: std::fmt::Display {
    fn kind(&self) -> ErrorKind;

    /// Caller-facing message. Gateway and storage internals never leak.
    fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::External => {
                "The payment provider is unavailable right now, please try again.".to_string()
            }
            ErrorKind::Internal => "Something went wrong, please try again later.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Failure raised by a repository implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl Classify for RepositoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound(_) => ErrorKind::NotFound,
            RepositoryError::Conflict(_) => ErrorKind::Conflict,
            RepositoryError::Unavailable(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_details() {
        let err = RepositoryError::Unavailable("connection reset by 10.0.0.4".to_string());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.user_message().contains("10.0.0.4"));
    }

    #[test]
    fn test_taxonomy_names() {
        assert_eq!(ErrorKind::Validation.as_str(), "ValidationError");
        assert_eq!(ErrorKind::State.as_str(), "StateError");
        assert_eq!(ErrorKind::External.as_str(), "ExternalError");
    }
}
