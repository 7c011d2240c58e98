//! The store facade: one connection, one registry, one batch at a time.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use topodb_schema::SchemaRegistry;

use crate::config::IngestConfig;
use crate::dispatch::{source_id_urn, SourceEntityDelete, TopologyEvent, SUPPORTED_SOURCE_TYPE};
use crate::error::{IngestError, IngestResult};
use crate::event::ParsedBatch;
use crate::executor::{self, RetryListener};
use crate::plan;
use crate::result::OperationResult;

/// A handle to one topology store.
///
/// Owns a single connection; concurrent batches belong on separate stores
/// over the same database file (one connection per in-flight transaction).
/// The registry is injected and immutable; the persisted schema is owned by
/// an external migration step, with [`TopologyStore::execute_ddl`] as the
/// hook tests and tooling use to apply one.
pub struct TopologyStore {
    conn: Connection,
    registry: Arc<SchemaRegistry>,
    config: IngestConfig,
    retry_listener: Option<Arc<dyn RetryListener + Send + Sync>>,
}

impl TopologyStore {
    /// Opens a store on a database file with default configuration.
    pub fn open(path: &Path, registry: Arc<SchemaRegistry>) -> IngestResult<Self> {
        Self::open_with_config(path, registry, IngestConfig::default())
    }

    /// Opens a store on a database file.
    pub fn open_with_config(
        path: &Path,
        registry: Arc<SchemaRegistry>,
        config: IngestConfig,
    ) -> IngestResult<Self> {
        Self::from_connection(Connection::open(path)?, registry, config)
    }

    /// Opens an in-memory store, private to this handle.
    pub fn open_in_memory(registry: Arc<SchemaRegistry>) -> IngestResult<Self> {
        Self::from_connection(
            Connection::open_in_memory()?,
            registry,
            IngestConfig::default(),
        )
    }

    fn from_connection(
        conn: Connection,
        registry: Arc<SchemaRegistry>,
        config: IngestConfig,
    ) -> IngestResult<Self> {
        // The engine's healing and clearing paths rely on enforced keys.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(config.busy_timeout)?;
        Ok(Self {
            conn,
            registry,
            config,
            retry_listener: None,
        })
    }

    /// Installs a retry observer.
    pub fn set_retry_listener(&mut self, listener: Arc<dyn RetryListener + Send + Sync>) {
        self.retry_listener = Some(listener);
    }

    /// The injected registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Read access to the underlying connection, for callers' own queries.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Applies a DDL script (testkit fixtures, CLI `init`).
    pub fn execute_ddl(&self, ddl: &str) -> IngestResult<()> {
        self.conn.execute_batch(ddl)?;
        Ok(())
    }

    /// Merges a batch atomically; returns one result per applied change.
    pub fn merge_batch(&mut self, batch: &ParsedBatch) -> IngestResult<Vec<OperationResult>> {
        let ops = plan::merge_plan(&self.registry, batch)?;
        self.execute_plan(&ops)
    }

    /// Deletes a batch's entities and relationships atomically.
    pub fn delete_batch(&mut self, batch: &ParsedBatch) -> IngestResult<Vec<OperationResult>> {
        let ops = plan::delete_plan(&self.registry, batch)?;
        self.execute_plan(&ops)
    }

    /// Deletes every entity contributed by the identified source system.
    pub fn delete_by_source_id(
        &mut self,
        source_type: &str,
        value: &str,
    ) -> IngestResult<Vec<OperationResult>> {
        if source_type != SUPPORTED_SOURCE_TYPE {
            return Err(IngestError::unsupported_event(format!(
                "source-entity-delete supports only the {SUPPORTED_SOURCE_TYPE} type, got {source_type}"
            )));
        }
        let ops = plan::source_entity_delete_plan(source_id_urn(value));
        self.execute_plan(&ops)
    }

    /// Routes a classified event to its processor.
    pub fn apply_event(&mut self, event: &TopologyEvent) -> IngestResult<Vec<OperationResult>> {
        match event {
            TopologyEvent::Create(batch) | TopologyEvent::Merge(batch) => self.merge_batch(batch),
            TopologyEvent::Delete(batch) => self.delete_batch(batch),
            TopologyEvent::SourceEntityDelete(SourceEntityDelete { source_type, value }) => {
                self.delete_by_source_id(source_type, value)
            }
        }
    }

    fn execute_plan(
        &mut self,
        ops: &[plan::DeferredOp],
    ) -> IngestResult<Vec<OperationResult>> {
        let listener = self
            .retry_listener
            .as_ref()
            .map(|listener| listener.as_ref() as &dyn RetryListener);
        executor::execute(&mut self.conn, &self.registry, ops, &self.config, listener)
    }
}

impl std::fmt::Debug for TopologyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Entity, Relationship};
    use serde_json::json;
    use topodb_schema::{
        generate_ddl, AssociationDef, AttrType, EntityType, MaxCardinality, RelationTypeDef,
        StorageLocation,
    };

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(
            SchemaRegistry::builder()
                .entity(EntityType::new("Node", "node").with_attribute("fdn", AttrType::Primitive))
                .entity(EntityType::new("Port", "port"))
                .relation(RelationTypeDef {
                    name: "NODE_OWNS_PORT".into(),
                    a_side: AssociationDef::new("Node", "owned-ports", MaxCardinality::Unbounded),
                    b_side: AssociationDef::new("Port", "owner", MaxCardinality::One),
                    storage: StorageLocation::BSide,
                    table: None,
                })
                .build()
                .unwrap(),
        )
    }

    fn store() -> TopologyStore {
        let registry = registry();
        let store = TopologyStore::open_in_memory(Arc::clone(&registry)).unwrap();
        store.execute_ddl(&generate_ddl(&registry)).unwrap();
        store
    }

    #[test]
    fn merge_then_delete_round_trip() {
        let mut store = store();
        let batch = ParsedBatch {
            entities: vec![
                Entity::new("Node", "node-1").with_attribute("fdn", json!("MRBTS-1")),
                Entity::new("Port", "port-1"),
            ],
            relationships: vec![Relationship::new(
                "NODE_OWNS_PORT",
                "rel-1",
                "node-1",
                "port-1",
            )],
        };
        let results = store.merge_batch(&batch).unwrap();
        assert_eq!(results.len(), 3);

        let results = store
            .delete_batch(&ParsedBatch {
                entities: vec![Entity::new("Node", "node-1")],
                relationships: Vec::new(),
            })
            .unwrap();
        // The embedded relationship is cleared before the row goes.
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut store = store();
        let results = store.merge_batch(&ParsedBatch::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn unsupported_source_type_is_rejected() {
        let mut store = store();
        let err = store.delete_by_source_id("serial", "abc").unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedEvent { .. }));
    }

    #[test]
    fn events_route_to_processors() {
        let mut store = store();
        let event = TopologyEvent::Create(ParsedBatch {
            entities: vec![Entity::new("Node", "node-1")],
            relationships: Vec::new(),
        });
        let results = store.apply_event(&event).unwrap();
        assert_eq!(results.len(), 1);
    }
}
