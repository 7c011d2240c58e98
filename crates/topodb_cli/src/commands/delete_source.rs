//! The `delete-source` command.

use std::path::Path;

use tracing::info;

/// Deletes every entity the identified source system contributed.
pub fn run(
    db: &Path,
    schema: &Path,
    source_type: &str,
    value: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = super::open_store(db, schema)?;
    let results = store.delete_by_source_id(source_type, value)?;
    for result in &results {
        println!("deleted {} {}", result.type_name, result.id);
    }
    info!(operations = results.len(), "source delete for {value}");
    Ok(())
}
