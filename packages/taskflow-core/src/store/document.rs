/// Boundary between untyped store documents and the strict board model.
///
/// Remote payloads are parsed and invariant-checked here; nothing downstream
/// ever sees an unvalidated document.
use serde_json::Value;

use super::StoreError;
use crate::types::Board;

/// Parse a raw document into a validated `Board`.
///
/// Documents stored without an `id` field (the id is the document key) get
/// `board_id` filled in; a mismatching id is rejected.
pub fn parse_board(board_id: &str, mut doc: Value) -> Result<Board, StoreError> {
    let malformed = |reason: String| StoreError::Malformed {
        board_id: board_id.to_string(),
        reason,
    };

    let obj = doc
        .as_object_mut()
        .ok_or_else(|| malformed("document is not an object".to_string()))?;
    match obj.get("id") {
        None | Some(Value::Null) => {
            obj.insert("id".to_string(), Value::String(board_id.to_string()));
        }
        Some(Value::String(id)) if id == board_id => {}
        Some(other) => return Err(malformed(format!("document id {} does not match", other))),
    }

    let board: Board = serde_json::from_value(doc).map_err(|e| malformed(e.to_string()))?;
    board
        .check_invariants()
        .map_err(|e| malformed(e.to_string()))?;
    Ok(board)
}

/// Serialize a board into its document form.
pub fn to_document(board: &Board) -> Result<Value, StoreError> {
    serde_json::to_value(board).map_err(|e| StoreError::Malformed {
        board_id: board.id.clone(),
        reason: e.to_string(),
    })
}
