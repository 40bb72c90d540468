/// Field-level diff between two board states.
///
/// Produces the minimal partial update that turns `before` into `after`:
/// only fields that actually changed are named, so concurrent writers
/// touching other fields are never overwritten.
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::store::{FieldPath, PartialUpdate, StoreError};
use crate::types::Board;

fn json<T: Serialize>(board_id: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Malformed {
        board_id: board_id.to_string(),
        reason: e.to_string(),
    })
}

/// Diff a keyed collection. Added or removed entries are written whole;
/// changed entries are written whole unless `fields` yields a finer diff.
fn diff_entries<T, F>(
    update: &mut PartialUpdate,
    root: &FieldPath,
    before: &BTreeMap<String, T>,
    after: &BTreeMap<String, T>,
    board_id: &str,
    mut fields: F,
) -> Result<(), StoreError>
where
    T: Serialize + PartialEq,
    F: FnMut(&mut PartialUpdate, &FieldPath, &T, &T) -> Result<bool, StoreError>,
{
    for id in before.keys() {
        if !after.contains_key(id) {
            update.delete(root.child(id));
        }
    }
    for (id, next) in after {
        let path = root.child(id);
        match before.get(id) {
            None => {
                update.set(path, json(board_id, next)?);
            }
            Some(prev) if prev != next => {
                if !fields(update, &path, prev, next)? {
                    update.set(path, json(board_id, next)?);
                }
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Minimal partial update turning `before` into `after`.
pub fn board_patch(before: &Board, after: &Board) -> Result<PartialUpdate, StoreError> {
    let id = after.id.as_str();
    let mut update = PartialUpdate::new();

    if before.title != after.title {
        update.set(FieldPath::field("title"), json(id, &after.title)?);
    }
    if before.description != after.description {
        update.set(FieldPath::field("description"), json(id, &after.description)?);
    }
    if before.member_ids != after.member_ids {
        update.set(FieldPath::field("memberIds"), json(id, &after.member_ids)?);
    }
    if before.column_ids != after.column_ids {
        update.set(FieldPath::field("columnIds"), json(id, &after.column_ids)?);
    }

    diff_entries(
        &mut update,
        &FieldPath::field("columns"),
        &before.columns,
        &after.columns,
        id,
        |update, path, prev, next| {
            if prev.id != next.id {
                return Ok(false);
            }
            if prev.title != next.title {
                update.set(path.child("title"), json(id, &next.title)?);
            }
            if prev.card_ids != next.card_ids {
                update.set(path.child("cardIds"), json(id, &next.card_ids)?);
            }
            if prev.order != next.order {
                update.set(path.child("order"), json(id, &next.order)?);
            }
            Ok(true)
        },
    )?;

    diff_entries(
        &mut update,
        &FieldPath::field("cards"),
        &before.cards,
        &after.cards,
        id,
        |_, _, _, _| Ok(false),
    )?;

    // A timestamp bump alone is not a change worth writing.
    if !update.is_empty() && before.updated_at != after.updated_at {
        update.set(FieldPath::field("updatedAt"), json(id, &after.updated_at)?);
    }
    Ok(update)
}

/// Column ids a partial update writes to, directly or through `cardIds`.
pub fn touched_columns(update: &PartialUpdate) -> HashSet<String> {
    update
        .paths()
        .filter_map(|path| match path.segments() {
            [root, col_id, ..] if root == "columns" => Some(col_id.clone()),
            _ => None,
        })
        .collect()
}
