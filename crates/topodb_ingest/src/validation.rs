//! Cardinality validation, run as the final pass of every merge batch.

use rusqlite::{params, Connection, OptionalExtension};
use topodb_schema::{quote_ident, EntityType, RelationType, RelationshipStorage, SchemaRegistry, Side};

use crate::error::{IngestError, IngestResult};
use crate::event::Relationship;

/// Counts relationship instances against declared bounds, inside the same
/// transaction that merged them.
///
/// Only finite bounds are counted; unbounded sides cost nothing. For an
/// embedded type the storing side is bounded structurally by its single
/// slot, so only the referenced side is counted here.
pub(crate) struct CardinalityValidator<'a> {
    conn: &'a Connection,
    registry: &'a SchemaRegistry,
}

impl<'a> CardinalityValidator<'a> {
    pub(crate) fn new(conn: &'a Connection, registry: &'a SchemaRegistry) -> Self {
        Self { conn, registry }
    }

    /// Validates every relationship of the batch; the first violation
    /// fails the batch and rolls the whole transaction back.
    pub(crate) fn validate(&self, relationships: &[Relationship]) -> IngestResult<()> {
        for relationship in relationships {
            let relation_type = self
                .registry
                .relation_type(&relationship.relation_type)
                .ok_or_else(|| {
                    IngestError::unknown_relation_type(&relationship.relation_type)
                })?;
            match relation_type.storage() {
                RelationshipStorage::RelationTable { .. } => {
                    self.check_side(relation_type, relationship, Side::A)?;
                    self.check_side(relation_type, relationship, Side::B)?;
                }
                RelationshipStorage::EmbeddedASide { .. } => {
                    self.check_side(relation_type, relationship, Side::B)?;
                }
                RelationshipStorage::EmbeddedBSide { .. } => {
                    self.check_side(relation_type, relationship, Side::A)?;
                }
            }
            tracing::debug!(relationship_id = %relationship.id, "relationship cardinality valid");
        }
        Ok(())
    }

    fn check_side(
        &self,
        relation_type: &RelationType,
        relationship: &Relationship,
        side: Side,
    ) -> IngestResult<()> {
        let Some(limit) = relation_type.max_cardinality(side).limit() else {
            return Ok(());
        };
        let endpoint_id = relationship.endpoint(side);
        self.lock_endpoint_row(relation_type.endpoint_entity(side), endpoint_id)?;
        let attached = self.count_attached(relation_type, side, endpoint_id)?;
        if attached > i64::from(limit) {
            return Err(IngestError::cardinality_violation(format!(
                "relationship type {} allows at most {} instance(s) per {}-side entity, found {} attached to entity {}",
                relation_type.name(),
                limit,
                side.label(),
                attached,
                endpoint_id
            )));
        }
        Ok(())
    }

    /// Serialization point for concurrent batches touching the same
    /// endpoint. The executor opens every batch transaction with write
    /// intent, so by the time this select runs the batch already holds the
    /// writer lock; a competing batch blocks or fails as busy and is
    /// retried. This closes the write-skew race where two batches each see
    /// a count below the limit and both insert.
    fn lock_endpoint_row(&self, entity_type: &EntityType, entity_id: &str) -> IngestResult<()> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            quote_ident(entity_type.id_column()),
            quote_ident(entity_type.table()),
            quote_ident(entity_type.id_column())
        );
        let _locked: Option<String> = self
            .conn
            .query_row(&sql, params![entity_id], |row| row.get(0))
            .optional()?;
        Ok(())
    }

    /// Counts rows of this type attached to the endpoint, own-transaction
    /// writes included.
    fn count_attached(
        &self,
        relation_type: &RelationType,
        side: Side,
        endpoint_id: &str,
    ) -> IngestResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_ident(relation_type.table_name()),
            quote_ident(relation_type.side_column(side))
        );
        Ok(self
            .conn
            .query_row(&sql, params![endpoint_id], |row| row.get(0))?)
    }
}
