//! The `init` command: apply the generated DDL.

use std::path::Path;

use tracing::info;

/// Generates the schema definition's DDL and applies it to the database.
pub fn run(db: &Path, schema: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let registry = super::load_registry(schema)?;
    let store = topodb_ingest::TopologyStore::open(db, registry.clone())?;
    store.execute_ddl(&topodb_schema::generate_ddl(&registry))?;

    info!(
        entity_types = registry.entity_types().count(),
        relation_types = registry.relation_types().count(),
        "initialized {}",
        db.display()
    );
    Ok(())
}
