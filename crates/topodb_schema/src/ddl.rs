//! SQLite DDL generation from a registry.
//!
//! Reproduces the persisted-state contract the ingestion engine honors: one
//! table per entity type, embedded relationship column triples on the
//! hosting entity's table, one join table per relation-table-located type.
//! Production migrations remain an external concern; this output backs the
//! testkit fixtures and the CLI `init` command.

use std::fmt::Write as _;

use crate::registry::SchemaRegistry;
use crate::relation::RelationshipStorage;

/// Quotes an identifier for embedding in SQL.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generates the full `CREATE TABLE` script for a registry.
///
/// Entity tables come first so the join tables' foreign keys have targets;
/// embedded foreign keys may reference entity tables created later in the
/// script, which SQLite accepts as long as enforcement happens at DML time.
#[must_use]
pub fn generate_ddl(registry: &SchemaRegistry) -> String {
    let mut ddl = String::new();

    for entity in registry.entity_types() {
        let mut columns = vec![format!(
            "{} TEXT PRIMARY KEY",
            quote_ident(entity.id_column())
        )];
        for (name, attr) in entity.attributes() {
            columns.push(format!("{} {}", quote_ident(name), attr.column_type()));
        }
        columns.push(format!("{} TEXT", quote_ident(entity.source_ids_column())));

        // Column triples of relationship types embedded in this table.
        for rt in registry.relation_types() {
            let (triple, other) = match rt.storage() {
                RelationshipStorage::EmbeddedASide {
                    id_column,
                    fk_column,
                    source_ids_column,
                } if rt.a_side().entity().name() == entity.name() => (
                    (id_column, fk_column, source_ids_column),
                    rt.b_side().entity(),
                ),
                RelationshipStorage::EmbeddedBSide {
                    id_column,
                    fk_column,
                    source_ids_column,
                } if rt.b_side().entity().name() == entity.name() => (
                    (id_column, fk_column, source_ids_column),
                    rt.a_side().entity(),
                ),
                _ => continue,
            };
            let (id_column, fk_column, source_ids_column) = triple;
            columns.push(format!("{} TEXT UNIQUE", quote_ident(id_column)));
            columns.push(format!(
                "{} TEXT REFERENCES {}({})",
                quote_ident(fk_column),
                quote_ident(other.table()),
                quote_ident(other.id_column())
            ));
            columns.push(format!("{} TEXT", quote_ident(source_ids_column)));
        }

        let _ = writeln!(
            ddl,
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            quote_ident(entity.table()),
            columns.join(",\n    ")
        );
    }

    for rt in registry.relation_types() {
        let RelationshipStorage::RelationTable {
            table,
            id_column,
            a_side_column,
            b_side_column,
            source_ids_column,
        } = rt.storage()
        else {
            continue;
        };
        let a_entity = rt.a_side().entity();
        let b_entity = rt.b_side().entity();
        let _ = writeln!(
            ddl,
            "CREATE TABLE IF NOT EXISTS {} (\n    {} TEXT PRIMARY KEY,\n    {} TEXT NOT NULL REFERENCES {}({}),\n    {} TEXT NOT NULL REFERENCES {}({}),\n    {} TEXT\n);",
            quote_ident(table),
            quote_ident(id_column),
            quote_ident(a_side_column),
            quote_ident(a_entity.table()),
            quote_ident(a_entity.id_column()),
            quote_ident(b_side_column),
            quote_ident(b_entity.table()),
            quote_ident(b_entity.id_column()),
            quote_ident(source_ids_column)
        );
    }

    ddl
}
