//! Error taxonomy for the ingestion engine.

use rusqlite::ffi;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised while planning or applying a batch.
///
/// Validation failures always roll the whole batch back; a partially
/// applied batch is never a visible outcome. [`IngestError::is_retryable`]
/// tells the caller whether re-submitting the same batch later can succeed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A change record names an entity type the registry does not know.
    #[error("unknown entity type: {name}")]
    UnknownEntityType {
        /// The unresolved type name.
        name: String,
    },

    /// A change record names a relationship type the registry does not know.
    #[error("unknown relationship type: {name}")]
    UnknownRelationType {
        /// The unresolved type name.
        name: String,
    },

    /// An entity attribute is not declared for its type. Detected while the
    /// plan is built, before anything executes.
    #[error("received field {field} isn't a valid field of entity type {entity_type}")]
    InvalidField {
        /// The entity type the record claimed.
        entity_type: String,
        /// The undeclared attribute name.
        field: String,
    },

    /// A cardinality slot (embedded or counted) would be exceeded.
    #[error("maximum cardinality violation: {message}")]
    MaximumCardinalityViolation {
        /// What was exceeded and where.
        message: String,
    },

    /// The same relationship id was observed with different endpoints.
    #[error(
        "relationship id {relationship_id} of type {relation_type} is already bound to a different endpoint pair"
    )]
    RelationshipIdCollision {
        /// The relationship type.
        relation_type: String,
        /// The colliding id.
        relationship_id: String,
    },

    /// A relationship update affected no rows even after endpoint healing.
    #[error("relationship {relationship_id} of type {relation_type} could not be applied: {message}")]
    RelationshipMergeFailed {
        /// The relationship type.
        relation_type: String,
        /// The relationship id.
        relationship_id: String,
        /// Which healing step ran out of options.
        message: String,
    },

    /// An event the dispatcher does not support.
    #[error("unsupported topology event: {message}")]
    UnsupportedEvent {
        /// What was unsupported.
        message: String,
    },

    /// Transient contention survived every retry attempt.
    #[error("transient contention persisted after {attempts} attempts")]
    ContentionExhausted {
        /// How many attempts were made.
        attempts: u32,
    },

    /// Any other database failure; not retried.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl IngestError {
    /// Creates an unknown-entity-type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType { name: name.into() }
    }

    /// Creates an unknown-relationship-type error.
    pub fn unknown_relation_type(name: impl Into<String>) -> Self {
        Self::UnknownRelationType { name: name.into() }
    }

    /// Creates an invalid-field error.
    pub fn invalid_field(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidField {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    /// Creates a cardinality-violation error.
    pub fn cardinality_violation(message: impl Into<String>) -> Self {
        Self::MaximumCardinalityViolation {
            message: message.into(),
        }
    }

    /// Creates an id-collision error.
    pub fn id_collision(relation_type: impl Into<String>, relationship_id: impl Into<String>) -> Self {
        Self::RelationshipIdCollision {
            relation_type: relation_type.into(),
            relationship_id: relationship_id.into(),
        }
    }

    /// Creates a merge-failed error.
    pub fn merge_failed(
        relation_type: impl Into<String>,
        relationship_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RelationshipMergeFailed {
            relation_type: relation_type.into(),
            relationship_id: relationship_id.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported-event error.
    pub fn unsupported_event(message: impl Into<String>) -> Self {
        Self::UnsupportedEvent {
            message: message.into(),
        }
    }

    /// Whether re-submitting the same batch later can succeed.
    ///
    /// Contention and non-constraint database failures are worth retrying;
    /// validation failures and constraint violations mean the batch is
    /// malformed as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ContentionExhausted { .. } => true,
            Self::Database(cause) => !is_constraint_violation(cause),
            _ => false,
        }
    }
}

/// Whether a database error is transient contention (busy/locked) that a
/// fresh attempt can win.
pub(crate) fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(cause, _)
            if matches!(cause.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Whether a database error is a foreign-key violation, the signal for the
/// missing-endpoint healing paths.
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(cause, _)
            if cause.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Whether a database error is a unique or primary-key violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(cause, _)
            if cause.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || cause.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(cause, _)
            if cause.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: ErrorCode, extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code,
                extended_code,
            },
            None,
        )
    }

    #[test]
    fn busy_and_locked_are_transient() {
        assert!(is_transient(&sqlite_failure(ErrorCode::DatabaseBusy, 5)));
        assert!(is_transient(&sqlite_failure(ErrorCode::DatabaseLocked, 6)));
        assert!(!is_transient(&sqlite_failure(
            ErrorCode::ConstraintViolation,
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        )));
    }

    #[test]
    fn constraint_codes_are_classified() {
        let fk = sqlite_failure(
            ErrorCode::ConstraintViolation,
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
        );
        assert!(is_foreign_key_violation(&fk));
        assert!(!is_unique_violation(&fk));

        let unique = sqlite_failure(
            ErrorCode::ConstraintViolation,
            ffi::SQLITE_CONSTRAINT_UNIQUE,
        );
        assert!(is_unique_violation(&unique));
        assert!(!is_foreign_key_violation(&unique));
    }

    #[test]
    fn retryability_split() {
        assert!(IngestError::ContentionExhausted { attempts: 3 }.is_retryable());
        assert!(IngestError::Database(sqlite_failure(ErrorCode::CannotOpen, 14)).is_retryable());
        assert!(!IngestError::Database(sqlite_failure(
            ErrorCode::ConstraintViolation,
            ffi::SQLITE_CONSTRAINT_UNIQUE
        ))
        .is_retryable());
        assert!(!IngestError::invalid_field("Node", "bogus").is_retryable());
        assert!(!IngestError::id_collision("NODE_OWNS_PORT", "rel-1").is_retryable());
    }
}
