//! Service error type

use thiserror::Error;

use crate::convert::ConversionError;
use crate::repository::RepositoryError;

/// Result type for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failure surfaced at the DTO boundary
///
/// NotFound on `get` and `delete` never reaches callers as an error; every
/// other repository failure passes through unchanged.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store or repository failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Reshaping between an entity and a DTO failed
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository(err) if err.is_not_found())
    }

    /// The repository error, if this is one
    pub fn as_repository(&self) -> Option<&RepositoryError> {
        match self {
            Self::Repository(err) => Some(err),
            Self::Conversion(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;

    #[test]
    fn test_not_found_detection() {
        let err = ServiceError::from(RepositoryError::not_found("User", "1"));
        assert!(err.is_not_found());
        assert!(err.as_repository().is_some());

        let err = ServiceError::from(RepositoryError::database_error(
            RepositoryOperation::Update,
            "deadlock detected",
        ));
        assert!(!err.is_not_found());

        let err = ServiceError::from(ConversionError::NotAnObject { type_name: "u8" });
        assert!(!err.is_not_found());
        assert!(err.as_repository().is_none());
    }
}
