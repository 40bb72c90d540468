/// Identifier generation for new cards and columns.
///
/// Ids look like `card-1f3a9c0b7d2e` / `col-0a1b2c3d4e5f`: a kind prefix and
/// 12 hex chars of a v4 UUID. Collisions with ids already on the board are
/// retried, so a generated id is always unique within that board.
use uuid::Uuid;

use crate::types::Board;

const ID_HEX_LEN: usize = 12;

fn random_suffix() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(ID_HEX_LEN);
    hex
}

fn unique_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = format!("{}-{}", prefix, random_suffix());
        if !taken(&id) {
            return id;
        }
        log::debug!("[taskflow.ids] Generated id {} already taken, retrying", id);
    }
}

pub fn new_card_id(board: &Board) -> String {
    unique_id("card", |id| board.cards.contains_key(id))
}

pub fn new_column_id(board: &Board) -> String {
    unique_id("col", |id| board.columns.contains_key(id))
}

/// Id for a newly created board document.
pub fn new_board_id() -> String {
    format!("board-{}", random_suffix())
}
