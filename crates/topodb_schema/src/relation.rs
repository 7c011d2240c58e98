//! Relationship type metadata and storage-location model.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{SchemaError, SchemaResult};

/// One endpoint side of a relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The A side.
    A,
    /// The B side.
    B,
}

impl Side {
    /// The opposite side.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Lower-case label, used in messages and derived column names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// Declared maximum number of relationship instances a single entity on one
/// side may participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxCardinality {
    /// Exactly one partner slot; enforced structurally for embedded storage.
    One,
    /// A finite constant greater than one, enforced by counting.
    Const(u32),
    /// No bound; never counted.
    Unbounded,
}

impl MaxCardinality {
    /// Normalizes a raw bound: `0` and `1` collapse to [`Self::One`].
    #[must_use]
    pub fn finite(bound: u32) -> Self {
        if bound <= 1 {
            Self::One
        } else {
            Self::Const(bound)
        }
    }

    /// The numeric bound, or `None` when unbounded.
    #[must_use]
    pub const fn limit(self) -> Option<u32> {
        match self {
            Self::One => Some(1),
            Self::Const(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    /// Whether the bound is exactly one.
    #[must_use]
    pub const fn is_one(self) -> bool {
        matches!(self, Self::One)
    }
}

/// Where a relationship type's rows physically live (definition form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageLocation {
    /// A dedicated join table.
    Relation,
    /// Embedded as a column triple in the A-side entity's table.
    ASide,
    /// Embedded as a column triple in the B-side entity's table.
    BSide,
}

/// Unresolved association end, as produced by the modeling step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDef {
    /// Name of the endpoint entity type.
    #[serde(rename = "entityType")]
    pub entity_type: String,
    /// The modeled association name; also feeds derived column names.
    #[serde(rename = "association")]
    pub association_name: String,
    /// Declared maximum cardinality for this side.
    #[serde(rename = "maxCardinality")]
    pub max_cardinality: MaxCardinality,
}

impl AssociationDef {
    /// Creates an association definition.
    pub fn new(
        entity_type: impl Into<String>,
        association_name: impl Into<String>,
        max_cardinality: MaxCardinality,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            association_name: association_name.into(),
            max_cardinality,
        }
    }
}

/// Unresolved relationship type, as produced by the modeling step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTypeDef {
    /// The relationship type name.
    pub name: String,
    /// A-side association.
    #[serde(rename = "aSide")]
    pub a_side: AssociationDef,
    /// B-side association.
    #[serde(rename = "bSide")]
    pub b_side: AssociationDef,
    /// Physical storage location.
    pub storage: StorageLocation,
    /// Join-table name; only meaningful for [`StorageLocation::Relation`],
    /// defaults to the lower-cased type name.
    #[serde(default)]
    pub table: Option<String>,
}

/// Resolved association end: the endpoint entity type plus the declared
/// association name and cardinality bound.
#[derive(Debug, Clone)]
pub struct AssociationEnd {
    entity: Arc<EntityType>,
    association_name: String,
    max_cardinality: MaxCardinality,
}

impl AssociationEnd {
    /// The endpoint entity type.
    #[must_use]
    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    /// The modeled association name.
    #[must_use]
    pub fn association_name(&self) -> &str {
        &self.association_name
    }

    /// Declared maximum cardinality for this side.
    #[must_use]
    pub fn max_cardinality(&self) -> MaxCardinality {
        self.max_cardinality
    }
}

/// Resolved physical storage of a relationship type, carrying every column
/// name the engine needs for that layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipStorage {
    /// Rows live in a dedicated join table keyed by relationship id.
    RelationTable {
        /// The join-table name.
        table: String,
        /// Primary-key column (the relationship id).
        id_column: String,
        /// Column holding the A-side entity id.
        a_side_column: String,
        /// Column holding the B-side entity id.
        b_side_column: String,
        /// Column holding the provenance source-id list.
        source_ids_column: String,
    },
    /// A column triple inside the A-side entity's own table; the foreign
    /// key references the B-side entity.
    EmbeddedASide {
        /// Column holding the relationship id.
        id_column: String,
        /// Foreign-key column referencing the B-side entity.
        fk_column: String,
        /// Column holding the provenance source-id list.
        source_ids_column: String,
    },
    /// A column triple inside the B-side entity's own table; the foreign
    /// key references the A-side entity.
    EmbeddedBSide {
        /// Column holding the relationship id.
        id_column: String,
        /// Foreign-key column referencing the A-side entity.
        fk_column: String,
        /// Column holding the provenance source-id list.
        source_ids_column: String,
    },
}

/// Metadata for one relationship type.
///
/// All storage-location branching in the engine dispatches over
/// [`RelationshipStorage`]; the accessors here centralize the per-variant
/// table and column resolution so callers pattern-match once.
#[derive(Debug, Clone)]
pub struct RelationType {
    name: String,
    a_side: AssociationEnd,
    b_side: AssociationEnd,
    storage: RelationshipStorage,
}

impl RelationType {
    /// Resolves a definition against the declared entity types, deriving
    /// storage column names and validating the cardinality / storage
    /// combination.
    pub(crate) fn resolve(
        def: RelationTypeDef,
        entities: &BTreeMap<String, Arc<EntityType>>,
    ) -> SchemaResult<Self> {
        let lookup = |name: &str| {
            entities
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::unknown_entity_type(&def.name, name))
        };
        let a_entity = lookup(&def.a_side.entity_type)?;
        let b_entity = lookup(&def.b_side.entity_type)?;

        let storage = match def.storage {
            StorageLocation::Relation => RelationshipStorage::RelationTable {
                table: def.table.clone().unwrap_or_else(|| def.name.to_lowercase()),
                id_column: "id".to_string(),
                a_side_column: format!("a_side_{}", a_entity.name()),
                b_side_column: format!("b_side_{}", b_entity.name()),
                source_ids_column: "source_ids".to_string(),
            },
            StorageLocation::ASide => RelationshipStorage::EmbeddedASide {
                id_column: format!("rel_id_{}", def.name),
                fk_column: format!("rel_fk_{}", def.a_side.association_name),
                source_ids_column: format!("rel_source_ids_{}", def.name),
            },
            StorageLocation::BSide => RelationshipStorage::EmbeddedBSide {
                id_column: format!("rel_id_{}", def.name),
                fk_column: format!("rel_fk_{}", def.b_side.association_name),
                source_ids_column: format!("rel_source_ids_{}", def.name),
            },
        };

        let relation = Self {
            name: def.name,
            a_side: AssociationEnd {
                entity: a_entity,
                association_name: def.a_side.association_name,
                max_cardinality: def.a_side.max_cardinality,
            },
            b_side: AssociationEnd {
                entity: b_entity,
                association_name: def.b_side.association_name,
                max_cardinality: def.b_side.max_cardinality,
            },
            storage,
        };
        relation.validate_cardinality()?;
        Ok(relation)
    }

    /// An embedded slot holds one relationship per storing row, so the
    /// storing side's declared bound must be One. Anything else would need
    /// runtime counting on both sides at once, which the engine rejects at
    /// load time rather than mis-enforcing.
    fn validate_cardinality(&self) -> SchemaResult<()> {
        if let Some(side) = self.storing_side() {
            let bound = self.max_cardinality(side);
            if !bound.is_one() {
                return Err(SchemaError::unsupported_cardinality(
                    &self.name,
                    format!(
                        "embedded storage on the {} side requires a maximum cardinality of one on that side, got {:?}",
                        side.label(),
                        bound
                    ),
                ));
            }
        }
        Ok(())
    }

    /// The relationship type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The A-side association end.
    #[must_use]
    pub fn a_side(&self) -> &AssociationEnd {
        &self.a_side
    }

    /// The B-side association end.
    #[must_use]
    pub fn b_side(&self) -> &AssociationEnd {
        &self.b_side
    }

    /// The association end for `side`.
    #[must_use]
    pub fn side(&self, side: Side) -> &AssociationEnd {
        match side {
            Side::A => &self.a_side,
            Side::B => &self.b_side,
        }
    }

    /// The resolved physical storage.
    #[must_use]
    pub fn storage(&self) -> &RelationshipStorage {
        &self.storage
    }

    /// The table rows of this relationship live in: the join table, or the
    /// storing-side entity's table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match &self.storage {
            RelationshipStorage::RelationTable { table, .. } => table,
            RelationshipStorage::EmbeddedASide { .. } => self.a_side.entity().table(),
            RelationshipStorage::EmbeddedBSide { .. } => self.b_side.entity().table(),
        }
    }

    /// The column holding the relationship id.
    #[must_use]
    pub fn id_column(&self) -> &str {
        match &self.storage {
            RelationshipStorage::RelationTable { id_column, .. }
            | RelationshipStorage::EmbeddedASide { id_column, .. }
            | RelationshipStorage::EmbeddedBSide { id_column, .. } => id_column,
        }
    }

    /// The column holding the relationship's source-id list.
    #[must_use]
    pub fn source_ids_column(&self) -> &str {
        match &self.storage {
            RelationshipStorage::RelationTable {
                source_ids_column, ..
            }
            | RelationshipStorage::EmbeddedASide {
                source_ids_column, ..
            }
            | RelationshipStorage::EmbeddedBSide {
                source_ids_column, ..
            } => source_ids_column,
        }
    }

    /// The column that identifies the A-side entity within
    /// [`Self::table_name`]: the join-table endpoint column, the storing
    /// row's own primary key, or the embedded foreign key.
    #[must_use]
    pub fn a_side_column(&self) -> &str {
        match &self.storage {
            RelationshipStorage::RelationTable { a_side_column, .. } => a_side_column,
            RelationshipStorage::EmbeddedASide { .. } => self.a_side.entity().id_column(),
            RelationshipStorage::EmbeddedBSide { fk_column, .. } => fk_column,
        }
    }

    /// The column that identifies the B-side entity within
    /// [`Self::table_name`].
    #[must_use]
    pub fn b_side_column(&self) -> &str {
        match &self.storage {
            RelationshipStorage::RelationTable { b_side_column, .. } => b_side_column,
            RelationshipStorage::EmbeddedASide { fk_column, .. } => fk_column,
            RelationshipStorage::EmbeddedBSide { .. } => self.b_side.entity().id_column(),
        }
    }

    /// The endpoint column for `side`.
    #[must_use]
    pub fn side_column(&self, side: Side) -> &str {
        match side {
            Side::A => self.a_side_column(),
            Side::B => self.b_side_column(),
        }
    }

    /// The side whose table hosts the embedded column triple, if any.
    #[must_use]
    pub fn storing_side(&self) -> Option<Side> {
        match &self.storage {
            RelationshipStorage::RelationTable { .. } => None,
            RelationshipStorage::EmbeddedASide { .. } => Some(Side::A),
            RelationshipStorage::EmbeddedBSide { .. } => Some(Side::B),
        }
    }

    /// The entity type hosting the embedded column triple, if any.
    #[must_use]
    pub fn storing_side_entity(&self) -> Option<&EntityType> {
        self.storing_side().map(|side| self.side(side).entity())
    }

    /// The embedded relationship's other endpoint type, if any.
    #[must_use]
    pub fn not_storing_side_entity(&self) -> Option<&EntityType> {
        self.storing_side()
            .map(|side| self.side(side.other()).entity())
    }

    /// The embedded foreign-key column, if any.
    #[must_use]
    pub fn fk_column(&self) -> Option<&str> {
        match &self.storage {
            RelationshipStorage::RelationTable { .. } => None,
            RelationshipStorage::EmbeddedASide { fk_column, .. }
            | RelationshipStorage::EmbeddedBSide { fk_column, .. } => Some(fk_column),
        }
    }

    /// The entity type on `side`.
    #[must_use]
    pub fn endpoint_entity(&self, side: Side) -> &EntityType {
        self.side(side).entity()
    }

    /// Declared maximum cardinality on `side`.
    #[must_use]
    pub fn max_cardinality(&self, side: Side) -> MaxCardinality {
        self.side(side).max_cardinality()
    }

    /// Whether `entity_name` appears on either side.
    #[must_use]
    pub fn references(&self, entity_name: &str) -> bool {
        self.a_side.entity().name() == entity_name || self.b_side.entity().name() == entity_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrType;

    fn entities() -> BTreeMap<String, Arc<EntityType>> {
        let mut map = BTreeMap::new();
        for (name, table) in [("Node", "node"), ("Port", "port")] {
            map.insert(
                name.to_string(),
                Arc::new(EntityType::new(name, table).with_attribute("fdn", AttrType::Primitive)),
            );
        }
        map
    }

    fn def(storage: StorageLocation, a_max: MaxCardinality, b_max: MaxCardinality) -> RelationTypeDef {
        RelationTypeDef {
            name: "NODE_OWNS_PORT".into(),
            a_side: AssociationDef::new("Node", "owned-ports", a_max),
            b_side: AssociationDef::new("Port", "owner", b_max),
            storage,
            table: None,
        }
    }

    #[test]
    fn relation_table_columns() {
        let rt = RelationType::resolve(
            def(
                StorageLocation::Relation,
                MaxCardinality::Unbounded,
                MaxCardinality::Unbounded,
            ),
            &entities(),
        )
        .unwrap();
        assert_eq!(rt.table_name(), "node_owns_port");
        assert_eq!(rt.id_column(), "id");
        assert_eq!(rt.a_side_column(), "a_side_Node");
        assert_eq!(rt.b_side_column(), "b_side_Port");
        assert_eq!(rt.source_ids_column(), "source_ids");
        assert!(rt.storing_side().is_none());
        assert!(rt.fk_column().is_none());
    }

    #[test]
    fn embedded_b_side_columns() {
        let rt = RelationType::resolve(
            def(
                StorageLocation::BSide,
                MaxCardinality::Unbounded,
                MaxCardinality::One,
            ),
            &entities(),
        )
        .unwrap();
        // Stored in the port table: the B column is the row's own pk, the A
        // column is the foreign key named after the storing association.
        assert_eq!(rt.table_name(), "port");
        assert_eq!(rt.id_column(), "rel_id_NODE_OWNS_PORT");
        assert_eq!(rt.b_side_column(), "id");
        assert_eq!(rt.a_side_column(), "rel_fk_owner");
        assert_eq!(rt.storing_side(), Some(Side::B));
        assert_eq!(rt.storing_side_entity().unwrap().name(), "Port");
        assert_eq!(rt.not_storing_side_entity().unwrap().name(), "Node");
    }

    #[test]
    fn embedded_a_side_columns() {
        let rt = RelationType::resolve(
            def(
                StorageLocation::ASide,
                MaxCardinality::One,
                MaxCardinality::Const(4),
            ),
            &entities(),
        )
        .unwrap();
        assert_eq!(rt.table_name(), "node");
        assert_eq!(rt.a_side_column(), "id");
        assert_eq!(rt.b_side_column(), "rel_fk_owned-ports");
        assert_eq!(rt.storing_side(), Some(Side::A));
    }

    #[test]
    fn embedded_storing_side_must_be_one() {
        let err = RelationType::resolve(
            def(
                StorageLocation::ASide,
                MaxCardinality::Const(2),
                MaxCardinality::One,
            ),
            &entities(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedCardinality { .. }));
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let mut bad = def(
            StorageLocation::Relation,
            MaxCardinality::Unbounded,
            MaxCardinality::Unbounded,
        );
        bad.b_side.entity_type = "Missing".into();
        let err = RelationType::resolve(bad, &entities()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEntityType { .. }));
    }

    #[test]
    fn finite_normalizes_to_one() {
        assert_eq!(MaxCardinality::finite(0), MaxCardinality::One);
        assert_eq!(MaxCardinality::finite(1), MaxCardinality::One);
        assert_eq!(MaxCardinality::finite(3), MaxCardinality::Const(3));
        assert_eq!(MaxCardinality::Unbounded.limit(), None);
        assert_eq!(MaxCardinality::Const(3).limit(), Some(3));
    }
}
