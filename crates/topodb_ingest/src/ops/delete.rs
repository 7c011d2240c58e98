//! Delete operations: entity deletes with relationship clearing,
//! storage-location-aware relationship deletes, and provenance scans.

use rusqlite::{params, Connection};
use topodb_schema::{quote_ident, EntityType, RelationType, RelationshipStorage, SchemaRegistry};

use crate::error::{IngestError, IngestResult};
use crate::result::OperationResult;
use crate::value;

use super::EmbeddedSlot;

/// Deletes one entity row, clearing every relationship that references it
/// first so the delete itself cannot trip a foreign key.
pub(crate) fn delete_entity(
    conn: &Connection,
    registry: &SchemaRegistry,
    entity_type: &EntityType,
    id: &str,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    for relation_type in registry.relation_types_referencing(entity_type.name()) {
        match relation_type.storage() {
            RelationshipStorage::RelationTable { .. } => {
                clear_relation_table_rows(conn, relation_type, id, results)?;
            }
            RelationshipStorage::EmbeddedASide { .. } | RelationshipStorage::EmbeddedBSide { .. } => {
                clear_embedded_rows(conn, relation_type, entity_type, id, results)?;
            }
        }
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote_ident(entity_type.table()),
        quote_ident(entity_type.id_column())
    );
    let affected = conn.execute(&sql, params![id])?;
    if affected > 0 {
        results.push(OperationResult::deletion(id, entity_type.name()));
    }
    Ok(())
}

/// Deletes join-table rows with the entity on either side.
fn clear_relation_table_rows(
    conn: &Connection,
    relation_type: &RelationType,
    deleted_id: &str,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    let table = quote_ident(relation_type.table_name());
    let id_column = quote_ident(relation_type.id_column());
    let a_column = quote_ident(relation_type.a_side_column());
    let b_column = quote_ident(relation_type.b_side_column());

    let select =
        format!("SELECT {id_column} FROM {table} WHERE {a_column} = ?1 OR {b_column} = ?1");
    let ids = collect_ids(conn, &select, deleted_id)?;
    if ids.is_empty() {
        return Ok(());
    }

    let delete = format!("DELETE FROM {table} WHERE {a_column} = ?1 OR {b_column} = ?1");
    conn.execute(&delete, params![deleted_id])?;
    for relationship_id in ids {
        results.push(OperationResult::deletion(
            relationship_id,
            relation_type.name(),
        ));
    }
    Ok(())
}

/// Nulls out embedded slots that reference the entity — as the hosting row
/// itself, as the foreign-key target, or both for a self-relation.
fn clear_embedded_rows(
    conn: &Connection,
    relation_type: &RelationType,
    deleted_entity: &EntityType,
    deleted_id: &str,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    let Some(slot) = EmbeddedSlot::of(relation_type) else {
        return Ok(());
    };

    let mut match_columns = Vec::new();
    if slot.host.name() == deleted_entity.name() {
        match_columns.push(slot.host.id_column());
    }
    if slot.other.name() == deleted_entity.name() {
        match_columns.push(slot.fk_column);
    }

    let table = quote_ident(slot.host.table());
    let rel_id = quote_ident(slot.id_column);
    let fk = quote_ident(slot.fk_column);
    let source_column = quote_ident(slot.source_ids_column);
    for column in match_columns {
        let matched = quote_ident(column);
        let select =
            format!("SELECT {rel_id} FROM {table} WHERE {matched} = ?1 AND {rel_id} IS NOT NULL");
        let ids = collect_ids(conn, &select, deleted_id)?;
        if ids.is_empty() {
            continue;
        }

        let clear = format!(
            "UPDATE {table} SET {rel_id} = NULL, {fk} = NULL, {source_column} = ?2 \
             WHERE {matched} = ?1"
        );
        conn.execute(&clear, params![deleted_id, value::EMPTY_SOURCE_IDS])?;
        for relationship_id in ids {
            results.push(OperationResult::deletion(
                relationship_id,
                relation_type.name(),
            ));
        }
    }
    Ok(())
}

/// Deletes one relationship per its storage location: drop the join row, or
/// null out the embedded column triple.
pub(crate) fn delete_relationship(
    conn: &Connection,
    registry: &SchemaRegistry,
    relation_type_name: &str,
    relationship_id: &str,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    let relation_type = registry
        .relation_type(relation_type_name)
        .ok_or_else(|| IngestError::unknown_relation_type(relation_type_name))?;

    let affected = match EmbeddedSlot::of(relation_type) {
        None => {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_ident(relation_type.table_name()),
                quote_ident(relation_type.id_column())
            );
            conn.execute(&sql, params![relationship_id])?
        }
        Some(slot) => {
            let table = quote_ident(slot.host.table());
            let rel_id = quote_ident(slot.id_column);
            let fk = quote_ident(slot.fk_column);
            let source_column = quote_ident(slot.source_ids_column);
            let sql = format!(
                "UPDATE {table} SET {rel_id} = NULL, {fk} = NULL, {source_column} = ?2 \
                 WHERE {rel_id} = ?1"
            );
            conn.execute(&sql, params![relationship_id, value::EMPTY_SOURCE_IDS])?
        }
    };
    if affected > 0 {
        results.push(OperationResult::deletion(
            relationship_id,
            relation_type.name(),
        ));
    }
    Ok(())
}

/// Deletes every entity whose source-id list contains `urn`, cascading like
/// [`delete_entity`]. A full scan per entity table; this path is rare
/// compared to normal merges and keeps the store free of secondary indexes.
pub(crate) fn delete_by_source_id(
    conn: &Connection,
    registry: &SchemaRegistry,
    urn: &str,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    for entity_type in registry.entity_types() {
        let ids = scan_source_ids(conn, entity_type, urn)?;
        for id in &ids {
            delete_entity(conn, registry, entity_type, id, results)?;
        }
    }
    Ok(())
}

fn scan_source_ids(
    conn: &Connection,
    entity_type: &EntityType,
    urn: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let table = quote_ident(entity_type.table());
    let id_column = quote_ident(entity_type.id_column());
    let source_column = quote_ident(entity_type.source_ids_column());
    let sql = format!(
        "SELECT {id_column} FROM {table} WHERE {source_column} IS NOT NULL \
         AND EXISTS (SELECT 1 FROM json_each({table}.{source_column}) WHERE json_each.value = ?1)"
    );
    collect_ids(conn, &sql, urn)
}

fn collect_ids(conn: &Connection, sql: &str, param: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![param], |row| row.get::<_, String>(0))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Relationship;
    use crate::ops::merge;
    use topodb_schema::{
        generate_ddl, AssociationDef, EntityType, MaxCardinality, RelationTypeDef, SchemaRegistry,
        StorageLocation,
    };

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .entity(EntityType::new("Node", "node"))
            .entity(EntityType::new("Port", "port"))
            .relation(RelationTypeDef {
                name: "NODE_OWNS_PORT".into(),
                a_side: AssociationDef::new("Node", "owned-ports", MaxCardinality::Unbounded),
                b_side: AssociationDef::new("Port", "owner", MaxCardinality::One),
                storage: StorageLocation::BSide,
                table: None,
            })
            .relation(RelationTypeDef {
                name: "NODE_PEERS_NODE".into(),
                a_side: AssociationDef::new("Node", "peers", MaxCardinality::Unbounded),
                b_side: AssociationDef::new("Node", "peered-by", MaxCardinality::Unbounded),
                storage: StorageLocation::Relation,
                table: None,
            })
            .build()
            .unwrap()
    }

    fn connection(registry: &SchemaRegistry) -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn.execute_batch(&generate_ddl(registry)).unwrap();
        conn
    }

    fn seed_relationship(
        conn: &mut rusqlite::Connection,
        registry: &SchemaRegistry,
        relationship: &Relationship,
    ) {
        let mut tx = conn.transaction().unwrap();
        let mut results = Vec::new();
        merge::merge_relationship(&mut tx, registry, relationship, &mut results).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn delete_entity_cascades_both_storage_locations() {
        let registry = registry();
        let mut conn = connection(&registry);
        seed_relationship(
            &mut conn,
            &registry,
            &Relationship::new("NODE_PEERS_NODE", "peer-1", "node-1", "node-2"),
        );
        seed_relationship(
            &mut conn,
            &registry,
            &Relationship::new("NODE_OWNS_PORT", "owns-1", "node-1", "port-1"),
        );

        let node = registry.entity_type("Node").unwrap();
        let mut results = Vec::new();
        delete_entity(&conn, &registry, node, "node-1", &mut results).unwrap();

        // Both relationships cleared, then the entity row itself.
        assert_eq!(results.len(), 3);
        assert!(results.contains(&OperationResult::deletion("peer-1", "NODE_PEERS_NODE")));
        assert!(results.contains(&OperationResult::deletion("owns-1", "NODE_OWNS_PORT")));
        assert_eq!(*results.last().unwrap(), OperationResult::deletion("node-1", "Node"));

        let peers: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"node_peers_node\"", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(peers, 0);
        let dangling: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM \"port\" WHERE \"rel_fk_owner\" IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dangling, 0);
    }

    #[test]
    fn delete_missing_entity_reports_nothing() {
        let registry = registry();
        let conn = connection(&registry);
        let node = registry.entity_type("Node").unwrap();
        let mut results = Vec::new();
        delete_entity(&conn, &registry, node, "absent", &mut results).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn delete_embedded_relationship_keeps_the_row() {
        let registry = registry();
        let mut conn = connection(&registry);
        seed_relationship(
            &mut conn,
            &registry,
            &Relationship::new("NODE_OWNS_PORT", "owns-1", "node-1", "port-1"),
        );

        let mut results = Vec::new();
        delete_relationship(&conn, &registry, "NODE_OWNS_PORT", "owns-1", &mut results).unwrap();
        assert_eq!(results, vec![OperationResult::deletion("owns-1", "NODE_OWNS_PORT")]);

        // The port row survives with a cleared slot.
        let (rel_id, source_ids): (Option<String>, Option<String>) = conn
            .query_row(
                "SELECT \"rel_id_NODE_OWNS_PORT\", \"rel_source_ids_NODE_OWNS_PORT\" \
                 FROM \"port\" WHERE \"id\" = 'port-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(rel_id.is_none());
        assert_eq!(source_ids.as_deref(), Some("[]"));
    }

    #[test]
    fn source_id_scan_finds_json_array_members() {
        let registry = registry();
        let conn = connection(&registry);
        conn.execute(
            "INSERT INTO \"node\" (\"id\", \"source_ids\") VALUES \
             ('node-1', '[\"urn:cmHandle:/abc\"]'), \
             ('node-2', '[\"urn:cmHandle:/other\"]'), \
             ('node-3', NULL)",
            [],
        )
        .unwrap();

        let mut results = Vec::new();
        delete_by_source_id(&conn, &registry, "urn:cmHandle:/abc", &mut results).unwrap();
        assert_eq!(results, vec![OperationResult::deletion("node-1", "Node")]);

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"node\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 2);
    }
}
