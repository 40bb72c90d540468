//! Board exports: spreadsheet-friendly CSV and a printable HTML document.
//!
//! Both renderers are pure: board in, text out. Cards are listed in board
//! order (columns by `columnIds`, cards by `cardIds`).
pub mod csv;
pub mod printable;

use chrono::{DateTime, NaiveDate};

use crate::types::{Board, Card, Column};

pub use self::csv::render_csv;
pub use printable::render_printable_document;

/// Cards paired with their column, in display order.
pub(crate) fn cards_in_order(board: &Board) -> impl Iterator<Item = (&Column, &Card)> {
    board.ordered_columns().flat_map(move |col| {
        col.card_ids
            .iter()
            .filter_map(move |id| board.cards.get(id).map(|card| (col, card)))
    })
}

/// Calendar date (UTC) of an epoch-millisecond timestamp.
pub(crate) fn date_of(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// File name offered for a download, e.g. `My Board-export.csv`.
pub fn export_file_name(board: &Board, extension: &str) -> String {
    let title: String = board
        .title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}-export.{}", title, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_board;

    #[test]
    fn test_cards_follow_board_order() {
        let board = sample_board();
        let order: Vec<&str> = cards_in_order(&board).map(|(_, c)| c.id.as_str()).collect();
        assert_eq!(order, vec!["card1", "card2", "card3"]);
    }

    #[test]
    fn test_export_file_name() {
        let mut board = sample_board();
        board.title = "Q3/Q4 plan".into();
        assert_eq!(export_file_name(&board, "csv"), "Q3_Q4 plan-export.csv");
    }
}
