//! Merge operations: entity upserts and storage-location-aware
//! relationship merges with endpoint healing.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use topodb_schema::{quote_ident, EntityType, RelationType, SchemaRegistry, Side};

use crate::error::{self, IngestError, IngestResult};
use crate::event::Relationship;
use crate::plan::EntityMerge;
use crate::result::OperationResult;
use crate::value;

use super::{record_entity_once, EmbeddedSlot};

/// Upserts one entity row; records a result only when a row was actually
/// inserted or changed.
pub(crate) fn merge_entity(
    conn: &Connection,
    registry: &SchemaRegistry,
    op: &EntityMerge,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    let entity_type = registry
        .entity_type(&op.entity_type)
        .ok_or_else(|| IngestError::unknown_entity_type(&op.entity_type))?;
    let changed = upsert_entity_row(conn, entity_type, op)?;
    if changed > 0 {
        results.push(OperationResult::entity(
            op.id.clone(),
            op.entity_type.clone(),
            op.result_attributes.clone(),
        ));
    }
    Ok(())
}

fn upsert_entity_row(
    conn: &Connection,
    entity_type: &EntityType,
    op: &EntityMerge,
) -> Result<usize, rusqlite::Error> {
    let table = quote_ident(entity_type.table());
    let id_column = quote_ident(entity_type.id_column());

    if op.columns.is_empty() {
        let sql = format!(
            "INSERT INTO {table} ({id_column}) VALUES (?1) ON CONFLICT({id_column}) DO NOTHING"
        );
        return conn.execute(&sql, params![op.id]);
    }

    let mut column_names = vec![id_column.clone()];
    let mut values: Vec<SqlValue> = vec![SqlValue::Text(op.id.clone())];
    for (name, column_value) in &op.columns {
        column_names.push(quote_ident(name));
        values.push(column_value.clone());
    }
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let assignments: Vec<String> = op
        .columns
        .iter()
        .map(|(name, _)| {
            let quoted = quote_ident(name);
            format!("{quoted} = excluded.{quoted}")
        })
        .collect();
    // Update only when a column actually differs, so re-merging identical
    // data reports no change.
    let changed_guard: Vec<String> = op
        .columns
        .iter()
        .map(|(name, _)| {
            let quoted = quote_ident(name);
            format!("{table}.{quoted} IS NOT excluded.{quoted}")
        })
        .collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT({id_column}) DO UPDATE SET {} WHERE {}",
        column_names.join(", "),
        placeholders.join(", "),
        assignments.join(", "),
        changed_guard.join(" OR ")
    );
    conn.execute(&sql, params_from_iter(values))
}

/// Merges one relationship, branching on its storage location.
pub(crate) fn merge_relationship(
    tx: &mut Transaction<'_>,
    registry: &SchemaRegistry,
    relationship: &Relationship,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    let relation_type = registry
        .relation_type(&relationship.relation_type)
        .ok_or_else(|| IngestError::unknown_relation_type(&relationship.relation_type))?;
    match EmbeddedSlot::of(relation_type) {
        None => merge_relation_table(tx, relation_type, relationship, results),
        Some(slot) => merge_embedded(tx, relation_type, &slot, relationship, results),
    }
}

fn merge_relation_table(
    tx: &mut Transaction<'_>,
    relation_type: &RelationType,
    relationship: &Relationship,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    // First attempt under a savepoint: a foreign-key failure must leave the
    // outer transaction clean before healing runs.
    let first = {
        let sp = tx.savepoint()?;
        match upsert_relation_row(&sp, relation_type, relationship) {
            Ok(affected) => {
                sp.commit()?;
                Ok(affected)
            }
            Err(cause) => Err(cause),
        }
    };

    let affected = match first {
        Ok(affected) => affected,
        Err(cause) if error::is_foreign_key_violation(&cause) => {
            // One or both endpoints have not arrived yet; insert
            // placeholders and retry the upsert once.
            create_missing_endpoints(tx, relation_type, relationship, results)?;
            upsert_relation_row(tx, relation_type, relationship)?
        }
        Err(cause) => return Err(cause.into()),
    };

    if affected > 0 {
        results.push(OperationResult::from_relationship(relationship));
        Ok(())
    } else {
        // The endpoint-equality guard matched nothing: this id already
        // names a different pair.
        Err(IngestError::id_collision(
            relation_type.name(),
            &relationship.id,
        ))
    }
}

fn upsert_relation_row(
    conn: &Connection,
    relation_type: &RelationType,
    relationship: &Relationship,
) -> Result<usize, rusqlite::Error> {
    let table = quote_ident(relation_type.table_name());
    let id_column = quote_ident(relation_type.id_column());
    let a_column = quote_ident(relation_type.a_side_column());
    let b_column = quote_ident(relation_type.b_side_column());
    // The update fires only when the existing row's endpoints equal the
    // incoming pair; an id reused with different endpoints affects zero
    // rows instead of overwriting the stored pair.
    let endpoint_guard = format!(
        "{table}.{a_column} = excluded.{a_column} AND {table}.{b_column} = excluded.{b_column}"
    );

    if let Some(source_ids) = &relationship.source_ids {
        let source_column = quote_ident(relation_type.source_ids_column());
        let sql = format!(
            "INSERT INTO {table} ({id_column}, {a_column}, {b_column}, {source_column}) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT({id_column}) DO UPDATE SET \
             {a_column} = excluded.{a_column}, {b_column} = excluded.{b_column}, \
             {source_column} = excluded.{source_column} \
             WHERE {endpoint_guard}"
        );
        conn.execute(
            &sql,
            params![
                relationship.id,
                relationship.a_side,
                relationship.b_side,
                value::source_ids_text(source_ids)
            ],
        )
    } else {
        let sql = format!(
            "INSERT INTO {table} ({id_column}, {a_column}, {b_column}) VALUES (?1, ?2, ?3) \
             ON CONFLICT({id_column}) DO UPDATE SET \
             {a_column} = excluded.{a_column}, {b_column} = excluded.{b_column} \
             WHERE {endpoint_guard}"
        );
        conn.execute(
            &sql,
            params![relationship.id, relationship.a_side, relationship.b_side],
        )
    }
}

fn create_missing_endpoints(
    conn: &Connection,
    relation_type: &RelationType,
    relationship: &Relationship,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    for side in [Side::A, Side::B] {
        let endpoint = relation_type.endpoint_entity(side);
        let id = relationship.endpoint(side);
        if insert_placeholder(conn, endpoint, id)? > 0 {
            record_entity_once(results, OperationResult::placeholder(id, endpoint.name()));
        }
    }
    Ok(())
}

/// Inserts a primary-key-only row unless it already exists.
pub(super) fn insert_placeholder(
    conn: &Connection,
    entity_type: &EntityType,
    id: &str,
) -> Result<usize, rusqlite::Error> {
    let sql = format!(
        "INSERT INTO {} ({}) VALUES (?1) ON CONFLICT DO NOTHING",
        quote_ident(entity_type.table()),
        quote_ident(entity_type.id_column())
    );
    conn.execute(&sql, params![id])
}

enum FirstAttempt {
    Applied {
        storing_placeholder: Option<OperationResult>,
    },
    ForeignKeyViolation {
        storing_was_created: bool,
    },
}

fn merge_embedded(
    tx: &mut Transaction<'_>,
    relation_type: &RelationType,
    slot: &EmbeddedSlot<'_>,
    relationship: &Relationship,
    results: &mut Vec<OperationResult>,
) -> IngestResult<()> {
    let storing_id = relationship.endpoint(slot.storing_side);
    let other_id = relationship.endpoint(slot.storing_side.other());

    // First attempt under a savepoint so a foreign-key failure also undoes
    // a storing-side placeholder created along the way.
    let first = {
        let sp = tx.savepoint()?;
        match update_embedded_slot(&sp, slot, relationship, storing_id, other_id) {
            Ok(affected) if affected > 0 => {
                sp.commit()?;
                FirstAttempt::Applied {
                    storing_placeholder: None,
                }
            }
            Ok(_) => match select_slot(&sp, slot, storing_id)? {
                None => {
                    // The storing row itself has not arrived; create it and
                    // retry the slot update once.
                    insert_placeholder(&sp, slot.host, storing_id)?;
                    match update_embedded_slot(&sp, slot, relationship, storing_id, other_id) {
                        Ok(affected) if affected > 0 => {
                            sp.commit()?;
                            FirstAttempt::Applied {
                                storing_placeholder: Some(OperationResult::placeholder(
                                    storing_id,
                                    slot.host.name(),
                                )),
                            }
                        }
                        Ok(_) => {
                            return Err(IngestError::merge_failed(
                                relation_type.name(),
                                &relationship.id,
                                "slot update affected no rows after creating the storing-side entity",
                            ));
                        }
                        Err(cause) if error::is_foreign_key_violation(&cause) => {
                            FirstAttempt::ForeignKeyViolation {
                                storing_was_created: true,
                            }
                        }
                        Err(cause) if error::is_unique_violation(&cause) => {
                            return Err(IngestError::id_collision(
                                relation_type.name(),
                                &relationship.id,
                            ));
                        }
                        Err(cause) => return Err(cause.into()),
                    }
                }
                Some((stored_id, stored_fk)) => {
                    return Err(diagnose_occupied_slot(
                        relation_type,
                        relationship,
                        slot,
                        storing_id,
                        stored_id.as_deref(),
                        stored_fk.as_deref(),
                        other_id,
                    ));
                }
            },
            Err(cause) if error::is_foreign_key_violation(&cause) => {
                FirstAttempt::ForeignKeyViolation {
                    storing_was_created: false,
                }
            }
            Err(cause) if error::is_unique_violation(&cause) => {
                return Err(IngestError::id_collision(
                    relation_type.name(),
                    &relationship.id,
                ));
            }
            Err(cause) => return Err(cause.into()),
        }
    };

    match first {
        FirstAttempt::Applied {
            storing_placeholder,
        } => {
            if let Some(placeholder) = storing_placeholder {
                record_entity_once(results, placeholder);
            }
        }
        FirstAttempt::ForeignKeyViolation {
            storing_was_created,
        } => {
            // The savepoint rollback undid any placeholder from the failed
            // attempt; re-create it before healing the missing endpoint,
            // then retry the slot update once on the outer transaction.
            if storing_was_created && insert_placeholder(tx, slot.host, storing_id)? > 0 {
                record_entity_once(
                    results,
                    OperationResult::placeholder(storing_id, slot.host.name()),
                );
            }
            if insert_placeholder(tx, slot.other, other_id)? > 0 {
                record_entity_once(
                    results,
                    OperationResult::placeholder(other_id, slot.other.name()),
                );
            }
            match update_embedded_slot(tx, slot, relationship, storing_id, other_id) {
                Ok(affected) if affected > 0 => {}
                Ok(_) => {
                    return Err(IngestError::merge_failed(
                        relation_type.name(),
                        &relationship.id,
                        "slot update affected no rows after creating the missing endpoints",
                    ));
                }
                Err(cause) if error::is_unique_violation(&cause) => {
                    return Err(IngestError::id_collision(
                        relation_type.name(),
                        &relationship.id,
                    ));
                }
                Err(cause) => return Err(cause.into()),
            }
        }
    }

    results.push(OperationResult::from_relationship(relationship));
    Ok(())
}

fn update_embedded_slot(
    conn: &Connection,
    slot: &EmbeddedSlot<'_>,
    relationship: &Relationship,
    storing_id: &str,
    other_id: &str,
) -> Result<usize, rusqlite::Error> {
    let table = quote_ident(slot.host.table());
    let pk = quote_ident(slot.host.id_column());
    let rel_id = quote_ident(slot.id_column);
    let fk = quote_ident(slot.fk_column);
    // Free slot, or the same relationship with the same endpoint; anything
    // else stays untouched and is diagnosed by the caller.
    let slot_guard = format!("{pk} = ?3 AND ({rel_id} IS NULL OR ({rel_id} = ?1 AND {fk} = ?2))");

    if let Some(source_ids) = &relationship.source_ids {
        let source_column = quote_ident(slot.source_ids_column);
        let sql = format!(
            "UPDATE {table} SET {rel_id} = ?1, {fk} = ?2, {source_column} = ?4 WHERE {slot_guard}"
        );
        conn.execute(
            &sql,
            params![
                relationship.id,
                other_id,
                storing_id,
                value::source_ids_text(source_ids)
            ],
        )
    } else {
        let sql = format!("UPDATE {table} SET {rel_id} = ?1, {fk} = ?2 WHERE {slot_guard}");
        conn.execute(&sql, params![relationship.id, other_id, storing_id])
    }
}

fn select_slot(
    conn: &Connection,
    slot: &EmbeddedSlot<'_>,
    storing_id: &str,
) -> Result<Option<(Option<String>, Option<String>)>, rusqlite::Error> {
    let sql = format!(
        "SELECT {}, {} FROM {} WHERE {} = ?1",
        quote_ident(slot.id_column),
        quote_ident(slot.fk_column),
        quote_ident(slot.host.table()),
        quote_ident(slot.host.id_column())
    );
    conn.query_row(&sql, params![storing_id], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .optional()
}

fn diagnose_occupied_slot(
    relation_type: &RelationType,
    relationship: &Relationship,
    slot: &EmbeddedSlot<'_>,
    storing_id: &str,
    stored_id: Option<&str>,
    stored_fk: Option<&str>,
    incoming_other_id: &str,
) -> IngestError {
    if super::conflict::slot_occupied_by_other(stored_id, &relationship.id) {
        IngestError::cardinality_violation(format!(
            "another relationship with id {} of type {} already exists on entity {} of type {}, can't override it with relationship {}",
            stored_id.unwrap_or("<unset>"),
            relation_type.name(),
            storing_id,
            slot.host.name(),
            relationship.id
        ))
    } else if super::conflict::same_relationship_different_endpoint(
        stored_id,
        stored_fk,
        &relationship.id,
        incoming_other_id,
    ) {
        IngestError::id_collision(relation_type.name(), &relationship.id)
    } else {
        // Both predicates clean means the guarded update should have
        // matched; treat it as a consistency failure rather than ignore it.
        IngestError::merge_failed(
            relation_type.name(),
            &relationship.id,
            "storing row exists and the slot matches, but the update affected no rows",
        )
    }
}
