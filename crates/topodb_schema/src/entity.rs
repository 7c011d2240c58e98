//! Entity type metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attr::AttrType;

fn default_id_column() -> String {
    "id".to_string()
}

fn default_source_ids_column() -> String {
    "source_ids".to_string()
}

/// Metadata for one entity type: its table, key column and declared
/// attributes.
///
/// An entity type owns exactly one table; the primary key is the entity id.
/// Relationship types stored on this entity's side contribute extra columns
/// to the same table, but those are described by
/// [`RelationType`](crate::RelationType), not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    table: String,
    #[serde(default = "default_id_column", rename = "idColumn")]
    id_column: String,
    #[serde(default = "default_source_ids_column", rename = "sourceIdsColumn")]
    source_ids_column: String,
    #[serde(default)]
    attributes: BTreeMap<String, AttrType>,
}

impl EntityType {
    /// Creates an entity type with the default `id` and `source_ids`
    /// column names and no declared attributes.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_column: default_id_column(),
            source_ids_column: default_source_ids_column(),
            attributes: BTreeMap::new(),
        }
    }

    /// Declares an attribute on this type.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attr: AttrType) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// The modeled type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table holding rows of this type.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The primary-key column name.
    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// The column holding the provenance source-id list.
    #[must_use]
    pub fn source_ids_column(&self) -> &str {
        &self.source_ids_column
    }

    /// Looks up a declared attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<AttrType> {
        self.attributes.get(name).copied()
    }

    /// All declared attributes, ordered by name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttrType)> {
        self.attributes.iter().map(|(name, attr)| (name.as_str(), *attr))
    }
}
