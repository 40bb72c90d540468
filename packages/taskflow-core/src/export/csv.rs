use super::{cards_in_order, date_of};
use crate::types::Board;

const HEADERS: [&str; 6] = ["Title", "Column", "Priority", "Labels", "Description", "Created"];

/// Quote a text field, doubling embedded quotes.
fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// One header row plus one row per card.
pub fn render_csv(board: &Board) -> String {
    let mut lines = Vec::with_capacity(board.cards.len() + 1);
    lines.push(HEADERS.join(","));

    for (column, card) in cards_in_order(board) {
        let labels: Vec<&str> = card.labels.iter().map(|l| l.as_str()).collect();
        let created = date_of(card.created_at)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let row = [
            quoted(&card.title),
            quoted(&column.title),
            card.priority.to_string(),
            quoted(&labels.join(", ")),
            quoted(&card.description),
            created,
        ];
        lines.push(row.join(","));
    }

    lines.join("\n")
}
