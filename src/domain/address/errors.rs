use uuid::Uuid;

use crate::errors::{Classify, ErrorKind, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("Shipping address not found: {0}")]
    NotFound(Uuid),

    #[error("Shipping address belongs to another user")]
    Forbidden,

    #[error("Missing required address field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Classify for AddressError {
    fn kind(&self) -> ErrorKind {
        match self {
            AddressError::NotFound(_) => ErrorKind::NotFound,
            AddressError::Forbidden => ErrorKind::Forbidden,
            AddressError::MissingField(_) => ErrorKind::Validation,
            AddressError::Repository(e) => e.kind(),
        }
    }
}
