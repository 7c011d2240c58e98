//! Builders for typical fixture change records.

use serde_json::json;
use topodb_ingest::{Entity, ParsedBatch, Relationship};

/// Derives a relationship id from its type and endpoint pair, the way the
/// upstream producer does.
#[must_use]
pub fn relationship_id(relation_type: &str, a_side: &str, b_side: &str) -> String {
    format!("urn:rel:{relation_type}:{a_side}:{b_side}")
}

/// A managed element with typical attributes.
#[must_use]
pub fn managed_element(id: &str) -> Entity {
    Entity::new("ManagedElement", id)
        .with_attribute("fdn", json!(format!("SubNetwork=1,ManagedElement={id}")))
        .with_attribute("cmId", json!({"cmHandle": format!("handle-{id}")}))
}

/// A radio function with typical attributes.
#[must_use]
pub fn radio_function(id: &str) -> Entity {
    Entity::new("RadioFunction", id)
        .with_attribute("fdn", json!(format!("ManagedElement=1,RadioFunction={id}")))
        .with_attribute("capacity", json!(4_000_000_000_i64))
}

/// An antenna module with typical attributes.
#[must_use]
pub fn antenna_module(id: &str) -> Entity {
    Entity::new("AntennaModule", id)
        .with_attribute("serialNumber", json!(format!("SN-{id}")))
        .with_attribute("position", json!("POINT(19.040236 47.497913)"))
        .with_attribute("tilt", json!(2.5))
}

/// An antenna capability with typical attributes.
#[must_use]
pub fn antenna_capability(id: &str) -> Entity {
    Entity::new("AntennaCapability", id).with_attribute("bands", json!({"nr": [78, 79]}))
}

/// A site with typical attributes.
#[must_use]
pub fn site(id: &str) -> Entity {
    Entity::new("Site", id).with_attribute("name", json!(format!("Site {id}")))
}

/// A `MANAGEDELEMENT_MANAGES_RADIOFUNCTION` record.
#[must_use]
pub fn manages(managed_element_id: &str, radio_function_id: &str) -> Relationship {
    Relationship::new(
        "MANAGEDELEMENT_MANAGES_RADIOFUNCTION",
        relationship_id(
            "MANAGEDELEMENT_MANAGES_RADIOFUNCTION",
            managed_element_id,
            radio_function_id,
        ),
        managed_element_id,
        radio_function_id,
    )
}

/// An `ANTENNAMODULE_INSTALLED_AT_SITE` record.
#[must_use]
pub fn installed_at(antenna_module_id: &str, site_id: &str) -> Relationship {
    Relationship::new(
        "ANTENNAMODULE_INSTALLED_AT_SITE",
        relationship_id("ANTENNAMODULE_INSTALLED_AT_SITE", antenna_module_id, site_id),
        antenna_module_id,
        site_id,
    )
}

/// An `ANTENNAMODULE_SERVES_ANTENNACAPABILITY` record.
#[must_use]
pub fn serves(antenna_module_id: &str, capability_id: &str) -> Relationship {
    Relationship::new(
        "ANTENNAMODULE_SERVES_ANTENNACAPABILITY",
        relationship_id(
            "ANTENNAMODULE_SERVES_ANTENNACAPABILITY",
            antenna_module_id,
            capability_id,
        ),
        antenna_module_id,
        capability_id,
    )
}

/// A `RADIOFUNCTION_PROVIDES_ANTENNACAPABILITY` record.
#[must_use]
pub fn provides(radio_function_id: &str, capability_id: &str) -> Relationship {
    Relationship::new(
        "RADIOFUNCTION_PROVIDES_ANTENNACAPABILITY",
        relationship_id(
            "RADIOFUNCTION_PROVIDES_ANTENNACAPABILITY",
            radio_function_id,
            capability_id,
        ),
        radio_function_id,
        capability_id,
    )
}

/// Assembles a batch.
#[must_use]
pub fn batch(entities: Vec<Entity>, relationships: Vec<Relationship>) -> ParsedBatch {
    ParsedBatch {
        entities,
        relationships,
    }
}
