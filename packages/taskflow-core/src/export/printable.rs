use chrono::NaiveDate;
use std::fmt::Write;

use crate::types::Board;

const STYLE: &str = "\
    body { font-family: sans-serif; margin: 20px; color: #172b4d; }
    h1 { color: #0052cc; border-bottom: 2px solid #0052cc; padding-bottom: 8px; }
    .card { border: 1px solid #dfe1e6; border-radius: 4px; padding: 12px; margin: 8px 0; }
    .card-title { font-weight: 700; font-size: 14px; }
    .card-meta { color: #6b778c; font-size: 12px; margin-top: 4px; }
    .card-description { font-size: 13px; margin-top: 6px; }
    .priority-high { color: #de350b; }
    .priority-medium { color: #ff8b00; }
    .priority-low { color: #36b37e; }";

/// Escape text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Self-contained HTML page listing every column and its cards, ready to print.
pub fn render_printable_document(board: &Board, exported_on: NaiveDate) -> String {
    let title = escape_html(&board.title);
    let mut html = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <title>{}</title>\n  <style>\n{}\n  </style>\n</head>\n<body>\n  <h1>{}</h1>\n",
        title, STYLE, title
    );
    let _ = writeln!(
        html,
        "  <p>Exported on {} - {} cards</p>",
        exported_on.format("%Y-%m-%d"),
        board.card_count()
    );

    for column in board.ordered_columns() {
        let _ = writeln!(
            html,
            "  <h2>{} ({})</h2>",
            escape_html(&column.title),
            column.card_ids.len()
        );
        for card in column.card_ids.iter().filter_map(|id| board.cards.get(id)) {
            let _ = writeln!(html, "  <div class=\"card\">");
            let _ = writeln!(
                html,
                "    <div class=\"card-title\">{}</div>",
                escape_html(&card.title)
            );
            let _ = write!(
                html,
                "    <div class=\"card-meta\">Priority: <span class=\"priority-{p}\">{p}</span>",
                p = card.priority
            );
            if !card.labels.is_empty() {
                let labels: Vec<&str> = card.labels.iter().map(|l| l.as_str()).collect();
                let _ = write!(html, " | Labels: {}", labels.join(", "));
            }
            let _ = writeln!(html, "</div>");
            if !card.description.is_empty() {
                let _ = writeln!(
                    html,
                    "    <p class=\"card-description\">{}</p>",
                    escape_html(&card.description)
                );
            }
            let _ = writeln!(html, "  </div>");
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_board;

    fn exported_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_lists_columns_in_order_with_counts() {
        let html = render_printable_document(&sample_board(), exported_on());
        assert!(html.contains("<h1>My Project</h1>"));
        assert!(html.contains("Exported on 2024-03-01 - 3 cards"));
        let todo = html.find("<h2>To Do (2)</h2>").unwrap();
        let doing = html.find("<h2>Doing (1)</h2>").unwrap();
        let done = html.find("<h2>Done (0)</h2>").unwrap();
        assert!(todo < doing && doing < done);
    }

    #[test]
    fn test_user_text_is_escaped() {
        let mut board = sample_board();
        board.title = "<script>alert(1)</script>".into();
        board.cards.get_mut("card1").unwrap().description = "a & b \"quoted\"".into();

        let html = render_printable_document(&board, exported_on());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("a &amp; b &quot;quoted&quot;"));
    }
}
