//! Inbound event classification.

use serde::{Deserialize, Serialize};

use crate::event::ParsedBatch;

/// The only source-system identifier type supported by source-entity
/// deletes.
pub const SUPPORTED_SOURCE_TYPE: &str = "cmHandle";

/// The provenance URN recorded for a source identifier; source-entity
/// deletes scan source-id lists for exactly this value.
#[must_use]
pub fn source_id_urn(value: &str) -> String {
    format!("urn:{SUPPORTED_SOURCE_TYPE}:/{value}")
}

/// Declared operation kind of an inbound event envelope.
///
/// Event types carry a dotted suffix (`<producer>.<kind>`); everything
/// after the last dot decides the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Initial topology creation.
    Create,
    /// Incremental merge.
    Merge,
    /// Entity/relationship deletion.
    Delete,
    /// Deletion of everything a source system contributed.
    SourceEntityDelete,
    /// Anything the engine does not route.
    Unsupported,
}

impl EventKind {
    /// Classifies an event-type string.
    #[must_use]
    pub fn from_event_type(event_type: &str) -> Self {
        let Some((_, suffix)) = event_type.rsplit_once('.') else {
            return Self::Unsupported;
        };
        match suffix {
            "create" => Self::Create,
            "merge" => Self::Merge,
            "delete" => Self::Delete,
            "source-entity-delete" => Self::SourceEntityDelete,
            _ => Self::Unsupported,
        }
    }
}

/// A source-entity delete request: remove everything a source system
/// contributed, identified by an opaque value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntityDelete {
    /// The source identifier type; only [`SUPPORTED_SOURCE_TYPE`] is
    /// accepted.
    #[serde(rename = "type")]
    pub source_type: String,
    /// The opaque source identifier.
    pub value: String,
}

/// A classified, typed inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum TopologyEvent {
    /// Initial topology creation; processed exactly like a merge.
    Create(ParsedBatch),
    /// Incremental merge of entities and relationships.
    Merge(ParsedBatch),
    /// Deletion of the named entities and relationships.
    Delete(ParsedBatch),
    /// Source-entity delete by external identifier.
    SourceEntityDelete(SourceEntityDelete),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_by_suffix() {
        assert_eq!(
            EventKind::from_event_type("topology-inventory-ingestion.merge"),
            EventKind::Merge
        );
        assert_eq!(
            EventKind::from_event_type("topology-inventory-ingestion.source-entity-delete"),
            EventKind::SourceEntityDelete
        );
        assert_eq!(
            EventKind::from_event_type("topology-inventory-ingestion.upsert"),
            EventKind::Unsupported
        );
        assert_eq!(EventKind::from_event_type("merge"), EventKind::Unsupported);
    }

    #[test]
    fn urn_format() {
        assert_eq!(source_id_urn("abc123"), "urn:cmHandle:/abc123");
    }

    #[test]
    fn event_wire_format() {
        let json = r#"{
            "kind": "source-entity-delete",
            "data": {"type": "cmHandle", "value": "abc123"}
        }"#;
        let event: TopologyEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            TopologyEvent::SourceEntityDelete(SourceEntityDelete {
                source_type: "cmHandle".into(),
                value: "abc123".into(),
            })
        );
    }
}
