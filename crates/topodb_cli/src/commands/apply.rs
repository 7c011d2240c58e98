//! The `apply` command: apply a topology event file.

use std::path::Path;

use tracing::info;

use topodb_ingest::{EventKind, ParsedBatch, SourceEntityDelete, TopologyEvent};

/// Reads a JSON event file and applies it to the database.
///
/// With `--event-type`, the file holds the bare payload and the kind is
/// classified from the type string's dotted suffix, the way the transport
/// layer delivers it; otherwise the file holds a tagged event.
pub fn run(
    db: &Path,
    schema: &Path,
    file: &Path,
    event_type: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = super::open_store(db, schema)?;
    let payload = std::fs::read_to_string(file)?;

    let event = match event_type {
        Some(event_type) => match EventKind::from_event_type(event_type) {
            EventKind::Create => TopologyEvent::Create(serde_json::from_str::<ParsedBatch>(&payload)?),
            EventKind::Merge => TopologyEvent::Merge(serde_json::from_str::<ParsedBatch>(&payload)?),
            EventKind::Delete => TopologyEvent::Delete(serde_json::from_str::<ParsedBatch>(&payload)?),
            EventKind::SourceEntityDelete => TopologyEvent::SourceEntityDelete(
                serde_json::from_str::<SourceEntityDelete>(&payload)?,
            ),
            EventKind::Unsupported => {
                return Err(format!("unsupported event type: {event_type}").into());
            }
        },
        None => serde_json::from_str::<TopologyEvent>(&payload)?,
    };

    let results = store.apply_event(&event)?;
    if json {
        for result in &results {
            println!("{}", serde_json::to_string(result)?);
        }
    } else {
        for result in &results {
            let outcome = if result.attributes.is_some() {
                "merged"
            } else {
                "deleted"
            };
            println!("{outcome} {} {}", result.type_name, result.id);
        }
    }
    info!(operations = results.len(), "applied {}", file.display());
    Ok(())
}
