//! Error types for schema loading and registry construction.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while building or loading a schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Two entity types share a name.
    #[error("duplicate entity type: {name}")]
    DuplicateEntityType {
        /// The duplicated type name.
        name: String,
    },

    /// Two relation types share a name.
    #[error("duplicate relation type: {name}")]
    DuplicateRelationType {
        /// The duplicated type name.
        name: String,
    },

    /// A relation definition references an entity type that was not declared.
    #[error("relation type {relation} references unknown entity type {entity}")]
    UnknownEntityType {
        /// The relation type with the dangling reference.
        relation: String,
        /// The missing entity type name.
        entity: String,
    },

    /// A cardinality / storage-location combination the engine cannot enforce.
    #[error("unsupported cardinality on relation type {relation}: {message}")]
    UnsupportedCardinality {
        /// The offending relation type.
        relation: String,
        /// What made the combination unenforceable.
        message: String,
    },

    /// A schema definition document could not be parsed.
    #[error("invalid schema definition: {0}")]
    Definition(#[from] serde_json::Error),
}

impl SchemaError {
    /// Creates an unsupported-cardinality error.
    pub fn unsupported_cardinality(
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnsupportedCardinality {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown-entity-type error.
    pub fn unknown_entity_type(relation: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::UnknownEntityType {
            relation: relation.into(),
            entity: entity.into(),
        }
    }
}
