//! Repository error types
//!
//! Every failure surfaced by a [`Repository`](super::Repository) or a
//! [`Store`](crate::store::Store) is a [`RepositoryError`]. The `kind` tells
//! callers whether the identity lookup matched nothing
//! ([`RepositoryErrorKind::NotFound`]) or whether the store itself failed.
//!
//! # Example
//!
//! ```rust
//! use crudbase::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("User", "42");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.is_not_found());
//! ```

use std::fmt;

use crate::convert::ConversionError;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Fetching a single entity by identity
    Get,
    /// Listing entities, filtered and optionally paged
    GetList,
    /// Counting the filtered set
    Count,
    /// Inserting a single entity
    Create,
    /// Inserting entities in batches
    CreateMany,
    /// Saving an entity and its associations
    Update,
    /// Removing an entity
    Delete,
    /// Eager-loading a relation
    Preload,
    /// Resolving an explicit join
    Join,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::GetList => write!(f, "get_list"),
            Self::Count => write!(f, "count"),
            Self::Create => write!(f, "create"),
            Self::CreateMany => write!(f, "create_many"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Preload => write!(f, "preload"),
            Self::Join => write!(f, "join"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Identity lookup matched no record
    NotFound,
    /// Entity already exists (duplicate key)
    AlreadyExists,
    /// Database constraint violation
    ConstraintViolation,
    /// Request rejected before reaching the store (bad paging, bad identifier)
    ValidationFailed,
    /// Failed to connect to the store
    ConnectionFailed,
    /// The operation context deadline elapsed
    Timeout,
    /// The operation context was cancelled
    Cancelled,
    /// Underlying database error (malformed query, unknown column)
    DatabaseError,
    /// Rows could not be mapped to or from the entity shape
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use crudbase::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::not_found("User", "usr_abc123");
/// assert_eq!(
///     error.to_string(),
///     "Repository not_found error during get: Entity not found [User: usr_abc123]"
/// );
///
/// let error = RepositoryError::database_error(RepositoryOperation::GetList, "syntax error");
/// assert!(!error.is_not_found());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::Get,
            kind: RepositoryErrorKind::NotFound,
            message: "Entity not found".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Create an "already exists" error with entity context
    pub fn already_exists(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::Create,
            kind: RepositoryErrorKind::AlreadyExists,
            message: "Entity already exists".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(identifier.into()),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a constraint violation error
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Get,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "Operation cancelled by caller",
        )
    }

    /// Create a database error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Wrap a shape conversion failure that happened while mapping rows
    pub fn conversion(operation: RepositoryOperation, err: &ConversionError) -> Self {
        Self::serialization_error(operation, err.to_string())
    }

    /// Add only the entity type, leaving the id untouched
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// True when an identity lookup matched no record
    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    ///
    /// Nothing in this crate retries; the flag is for callers.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        match (&self.entity_type, &self.entity_id) {
            (Some(entity_type), Some(entity_id)) => write!(f, " [{}: {}]", entity_type, entity_id)?,
            (Some(entity_type), None) => write!(f, " [{}]", entity_type)?,
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::Get), "get");
        assert_eq!(format!("{}", RepositoryOperation::GetList), "get_list");
        assert_eq!(format!("{}", RepositoryOperation::CreateMany), "create_many");
        assert_eq!(format!("{}", RepositoryOperation::Preload), "preload");
    }

    #[test]
    fn test_not_found_convenience() {
        let error = RepositoryError::not_found("User", "usr_123");
        assert_eq!(error.operation, RepositoryOperation::Get);
        assert!(error.is_not_found());
        assert_eq!(error.entity_type, Some("User".to_string()));
        assert_eq!(error.entity_id, Some("usr_123".to_string()));
    }

    #[test]
    fn test_store_failures_are_not_not_found() {
        assert!(!RepositoryError::connection_failed("refused").is_not_found());
        assert!(!RepositoryError::cancelled(RepositoryOperation::Update).is_not_found());
        assert!(
            !RepositoryError::constraint_violation(RepositoryOperation::Create, "fk").is_not_found()
        );
    }

    #[test]
    fn test_is_retriable() {
        assert!(RepositoryError::connection_failed("refused").is_retriable());
        assert!(RepositoryError::timeout(RepositoryOperation::GetList, "timeout").is_retriable());
        assert!(!RepositoryError::cancelled(RepositoryOperation::GetList).is_retriable());
        assert!(!RepositoryError::not_found("User", "1").is_retriable());
    }

    #[test]
    fn test_display_with_entity_type_only() {
        let error = RepositoryError::database_error(RepositoryOperation::Count, "bad column")
            .with_entity_type("Order");
        assert_eq!(
            error.to_string(),
            "Repository database_error error during count: bad column [Order]"
        );
    }

    #[test]
    fn test_with_operation() {
        let error = RepositoryError::connection_failed("Connection refused")
            .with_operation(RepositoryOperation::Create);
        assert_eq!(error.operation, RepositoryOperation::Create);
        assert_eq!(error.kind, RepositoryErrorKind::ConnectionFailed);
    }
}
