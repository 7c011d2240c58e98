//! CLI subcommand implementations.

pub mod apply;
pub mod delete_source;
pub mod init;

use std::path::Path;
use std::sync::Arc;

use topodb_ingest::TopologyStore;
use topodb_schema::{SchemaDefinition, SchemaRegistry};

/// Loads a registry from a schema definition JSON file.
pub fn load_registry(schema: &Path) -> Result<Arc<SchemaRegistry>, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(schema)?;
    Ok(Arc::new(SchemaDefinition::registry_from_json(&json)?))
}

/// Opens a store on `db` with the registry loaded from `schema`.
pub fn open_store(db: &Path, schema: &Path) -> Result<TopologyStore, Box<dyn std::error::Error>> {
    let registry = load_registry(schema)?;
    Ok(TopologyStore::open(db, registry)?)
}
