//! Crate-level error type
//!
//! Repository and service operations return their own structured errors
//! ([`RepositoryError`], [`ServiceError`]). This type covers setup work
//! (configuration, tracing, store connection) and lets callers fold the
//! operation errors into one `?`-friendly type.

use thiserror::Error;

use crate::convert::ConversionError;
use crate::repository::RepositoryError;
use crate::service::ServiceError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Repository operation error
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Shape conversion error
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Service operation error
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_pass_through() {
        let err: Error = RepositoryError::not_found("User", "7").into();
        assert_eq!(
            err.to_string(),
            "Repository not_found error during get: Entity not found [User: 7]"
        );
    }

    #[test]
    fn test_conversion_error_display() {
        let err: Error = ConversionError::NotAnObject { type_name: "i64" }.into();
        assert_eq!(
            err.to_string(),
            "Conversion error: i64 is not a struct-like shape"
        );
    }
}
