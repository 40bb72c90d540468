/// Pure board mutations: input board + intent -> new board.
///
/// Every referenced column and card is checked before anything changes, so a
/// failed call never leaves a partially mutated board behind. Indices past the
/// end of a list clamp to the last valid slot, since drag gestures can report
/// boundary indices.
use crate::error::{BoardError, EntityKind};
use crate::mutation::{ids, CardPatch};
use crate::types::{Board, Card, Column};

/// Trim a title, rejecting one that is empty afterwards.
pub fn clean_title(title: &str) -> Result<String, BoardError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(BoardError::validation("title must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn column_mut<'a>(board: &'a mut Board, column_id: &str) -> Result<&'a mut Column, BoardError> {
    board
        .columns
        .get_mut(column_id)
        .ok_or_else(|| BoardError::not_found(EntityKind::Column, column_id))
}

fn card_mut<'a>(board: &'a mut Board, card_id: &str) -> Result<&'a mut Card, BoardError> {
    board
        .cards
        .get_mut(card_id)
        .ok_or_else(|| BoardError::not_found(EntityKind::Card, card_id))
}

/// Resolve the caller-reported source index of `id` in `ids`.
///
/// The index is trusted (no search), but the entry found there must be `id`.
fn source_index(ids: &[String], id: &str, reported: usize, list: &str) -> Result<usize, BoardError> {
    if ids.is_empty() {
        return Err(BoardError::validation(format!(
            "{} is empty, cannot move {}",
            list, id
        )));
    }
    let index = reported.min(ids.len() - 1);
    if ids[index] != id {
        return Err(BoardError::validation(format!(
            "{} is not at index {} of {} (stale drag coordinates)",
            id, reported, list
        )));
    }
    Ok(index)
}

/// Move a card within or across columns.
pub fn move_card(
    board: &Board,
    card_id: &str,
    from_column_id: &str,
    from_index: usize,
    to_column_id: &str,
    to_index: usize,
    now: i64,
) -> Result<Board, BoardError> {
    if from_column_id == to_column_id && from_index == to_index {
        return Ok(board.clone());
    }

    board.card(card_id)?;
    let source = board.column(from_column_id)?;
    let dest = board.column(to_column_id)?;
    let from = source_index(&source.card_ids, card_id, from_index, from_column_id)?;

    if from_column_id == to_column_id {
        let mut card_ids = source.card_ids.clone();
        let moved = card_ids.remove(from);
        card_ids.insert(to_index.min(card_ids.len()), moved);
        if card_ids == source.card_ids {
            return Ok(board.clone());
        }

        let mut next = board.clone();
        column_mut(&mut next, from_column_id)?.card_ids = card_ids;
        next.updated_at = now;
        return Ok(next);
    }

    if dest.card_ids.iter().any(|id| id == card_id) {
        return Err(BoardError::validation(format!(
            "{} is already in {}",
            card_id, to_column_id
        )));
    }

    let mut source_ids = source.card_ids.clone();
    let moved = source_ids.remove(from);
    let mut dest_ids = dest.card_ids.clone();
    dest_ids.insert(to_index.min(dest_ids.len()), moved);

    let mut next = board.clone();
    column_mut(&mut next, from_column_id)?.card_ids = source_ids;
    column_mut(&mut next, to_column_id)?.card_ids = dest_ids;
    next.updated_at = now;
    Ok(next)
}

/// Reorder `column_ids`. Column contents are untouched.
pub fn move_column(
    board: &Board,
    column_id: &str,
    from_index: usize,
    to_index: usize,
    now: i64,
) -> Result<Board, BoardError> {
    if from_index == to_index {
        return Ok(board.clone());
    }

    board.column(column_id)?;
    let from = source_index(&board.column_ids, column_id, from_index, "columnIds")?;

    let mut column_ids = board.column_ids.clone();
    let moved = column_ids.remove(from);
    column_ids.insert(to_index.min(column_ids.len()), moved);
    if column_ids == board.column_ids {
        return Ok(board.clone());
    }

    let mut next = board.clone();
    next.column_ids = column_ids;
    next.updated_at = now;
    Ok(next)
}

/// Append a default card to a column. Returns the new board and the card id.
pub fn add_card(
    board: &Board,
    column_id: &str,
    title: &str,
    now: i64,
) -> Result<(Board, String), BoardError> {
    let title = clean_title(title)?;
    let order = board.column(column_id)?.card_ids.len();

    let mut next = board.clone();
    let card_id = ids::new_card_id(board);
    column_mut(&mut next, column_id)?.card_ids.push(card_id.clone());
    next.cards
        .insert(card_id.clone(), Card::new(card_id.clone(), title, order, now));
    next.updated_at = now;
    Ok((next, card_id))
}

/// Append an empty column. Returns the new board and the column id.
pub fn add_column(board: &Board, title: &str, now: i64) -> Result<(Board, String), BoardError> {
    let title = clean_title(title)?;

    let mut next = board.clone();
    let column_id = ids::new_column_id(board);
    let order = next.column_ids.len();
    next.column_ids.push(column_id.clone());
    next.columns
        .insert(column_id.clone(), Column::new(column_id.clone(), title, order));
    next.updated_at = now;
    Ok((next, column_id))
}

/// Remove a card record and every reference to it.
pub fn delete_card(board: &Board, card_id: &str, now: i64) -> Result<Board, BoardError> {
    board.card(card_id)?;

    let mut next = board.clone();
    for column in next.columns.values_mut() {
        column.card_ids.retain(|id| id != card_id);
    }
    next.cards.remove(card_id);
    next.updated_at = now;
    Ok(next)
}

/// Remove a column and, with it, every card it holds.
pub fn delete_column(board: &Board, column_id: &str, now: i64) -> Result<Board, BoardError> {
    let column = board.column(column_id)?;

    let mut next = board.clone();
    for card_id in &column.card_ids {
        next.cards.remove(card_id);
    }
    next.columns.remove(column_id);
    next.column_ids.retain(|id| id != column_id);
    next.updated_at = now;
    Ok(next)
}

/// Edit the fields of one card (the card detail editor).
pub fn update_card(
    board: &Board,
    card_id: &str,
    patch: &CardPatch,
    now: i64,
) -> Result<Board, BoardError> {
    let title = patch.title.as_deref().map(clean_title).transpose()?;
    let current = board.card(card_id)?;

    let mut updated = current.clone();
    if let Some(title) = title {
        updated.title = title;
    }
    if let Some(description) = &patch.description {
        updated.description = description.clone();
    }
    if let Some(priority) = patch.priority {
        updated.priority = priority;
    }
    if let Some(labels) = &patch.labels {
        updated.labels = labels.clone();
    }
    if let Some(assignee) = &patch.assignee_id {
        updated.assignee_id = assignee.clone();
    }
    if &updated == current {
        return Ok(board.clone());
    }

    let mut next = board.clone();
    updated.updated_at = now;
    *card_mut(&mut next, card_id)? = updated;
    next.updated_at = now;
    Ok(next)
}

pub fn rename_column(
    board: &Board,
    column_id: &str,
    title: &str,
    now: i64,
) -> Result<Board, BoardError> {
    let title = clean_title(title)?;
    if board.column(column_id)?.title == title {
        return Ok(board.clone());
    }

    let mut next = board.clone();
    column_mut(&mut next, column_id)?.title = title;
    next.updated_at = now;
    Ok(next)
}

pub fn update_board_details(
    board: &Board,
    title: Option<&str>,
    description: Option<&str>,
    now: i64,
) -> Result<Board, BoardError> {
    let title = title.map(clean_title).transpose()?;

    let mut next = board.clone();
    if let Some(title) = title {
        next.title = title;
    }
    if let Some(description) = description {
        next.description = description.trim().to_string();
    }
    if next == *board {
        return Ok(next);
    }
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_board;
    use crate::types::{Label, Priority};
    use std::collections::{BTreeSet, HashSet};

    fn ids(board: &Board, column: &str) -> Vec<String> {
        board.columns[column].card_ids.clone()
    }

    #[test]
    fn test_move_card_across_columns() {
        let board = sample_board();
        let next = move_card(&board, "card1", "col-1", 0, "col-3", 0, 2_000).unwrap();
        assert_eq!(ids(&next, "col-1"), vec!["card2"]);
        assert_eq!(ids(&next, "col-3"), vec!["card1"]);
        assert_eq!(next.updated_at, 2_000);
        next.check_invariants().unwrap();
    }

    #[test]
    fn test_move_card_same_position_is_identity() {
        let board = sample_board();
        let next = move_card(&board, "card2", "col-1", 1, "col-1", 1, 2_000).unwrap();
        assert_eq!(next, board);
    }

    #[test]
    fn test_move_card_within_column() {
        let board = sample_board();
        let next = move_card(&board, "card1", "col-1", 0, "col-1", 1, 2_000).unwrap();
        assert_eq!(ids(&next, "col-1"), vec!["card2", "card1"]);
    }

    #[test]
    fn test_move_card_clamps_destination_index() {
        let board = sample_board();
        let next = move_card(&board, "card1", "col-1", 0, "col-2", 99, 2_000).unwrap();
        assert_eq!(ids(&next, "col-2"), vec!["card3", "card1"]);

        // Past-the-end within the same column lands at the end.
        let next = move_card(&board, "card1", "col-1", 0, "col-1", 99, 2_000).unwrap();
        assert_eq!(ids(&next, "col-1"), vec!["card2", "card1"]);
    }

    #[test]
    fn test_move_card_clamps_source_index() {
        let board = sample_board();
        let next = move_card(&board, "card2", "col-1", 7, "col-3", 0, 2_000).unwrap();
        assert_eq!(ids(&next, "col-1"), vec!["card1"]);
        assert_eq!(ids(&next, "col-3"), vec!["card2"]);
    }

    #[test]
    fn test_clamped_move_to_current_slot_is_identity() {
        let board = sample_board();
        let next = move_card(&board, "card2", "col-1", 1, "col-1", 50, 2_000).unwrap();
        assert_eq!(next, board);
    }

    #[test]
    fn test_move_card_rejects_stale_coordinates() {
        let board = sample_board();
        let err = move_card(&board, "card2", "col-1", 0, "col-3", 0, 2_000).unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
    }

    #[test]
    fn test_move_card_missing_references() {
        let board = sample_board();
        assert!(matches!(
            move_card(&board, "nope", "col-1", 0, "col-3", 0, 1),
            Err(BoardError::NotFound { kind: EntityKind::Card, .. })
        ));
        assert!(matches!(
            move_card(&board, "card1", "col-1", 0, "col-x", 0, 1),
            Err(BoardError::NotFound { kind: EntityKind::Column, .. })
        ));
        assert!(matches!(
            move_card(&board, "card1", "col-x", 0, "col-3", 0, 1),
            Err(BoardError::NotFound { kind: EntityKind::Column, .. })
        ));
    }

    #[test]
    fn test_move_card_round_trip_restores_columns() {
        let board = sample_board();
        let there = move_card(&board, "card2", "col-1", 1, "col-2", 0, 2_000).unwrap();
        let back = move_card(&there, "card2", "col-2", 0, "col-1", 1, 3_000).unwrap();
        assert_eq!(ids(&back, "col-1"), ids(&board, "col-1"));
        assert_eq!(ids(&back, "col-2"), ids(&board, "col-2"));
    }

    #[test]
    fn test_move_column() {
        let board = sample_board();
        let next = move_column(&board, "col-3", 2, 0, 2_000).unwrap();
        assert_eq!(next.column_ids, vec!["col-3", "col-1", "col-2"]);
        assert_eq!(next.columns, board.columns);

        let same = move_column(&board, "col-2", 1, 1, 2_000).unwrap();
        assert_eq!(same, board);

        assert!(move_column(&board, "col-2", 0, 2, 2_000).is_err());
    }

    #[test]
    fn test_add_card_trims_title() {
        let board = sample_board();
        let (next, id) = add_card(&board, "col-1", "  Ship it  ", 2_000).unwrap();
        let card = &next.cards[&id];
        assert_eq!(card.title, "Ship it");
        assert_eq!(card.priority, Priority::Medium);
        assert!(card.labels.is_empty());
        assert!(card.assignee_id.is_none());
        assert_eq!(card.order, 2);
        assert_eq!(ids(&next, "col-1"), vec!["card1".to_string(), "card2".into(), id]);
    }

    #[test]
    fn test_add_card_rejects_blank_title() {
        let board = sample_board();
        assert!(matches!(
            add_card(&board, "col-1", "   ", 2_000),
            Err(BoardError::Validation(_))
        ));
        assert!(matches!(
            add_card(&board, "col-x", "Title", 2_000),
            Err(BoardError::NotFound { .. })
        ));
    }

    #[test]
    fn test_add_column() {
        let board = sample_board();
        let (next, id) = add_column(&board, "Review", 2_000).unwrap();
        assert_eq!(next.column_ids.last(), Some(&id));
        assert_eq!(next.columns[&id].order, 3);
        assert!(next.columns[&id].card_ids.is_empty());
        assert!(add_column(&board, "", 2_000).is_err());
    }

    #[test]
    fn test_delete_card() {
        let board = sample_board();
        let next = delete_card(&board, "card1", 2_000).unwrap();
        assert_eq!(ids(&next, "col-1"), vec!["card2"]);
        assert!(!next.cards.contains_key("card1"));
        next.check_invariants().unwrap();
        assert!(delete_card(&board, "ghost", 2_000).is_err());
    }

    #[test]
    fn test_delete_column_cascades_cards() {
        let board = sample_board();
        let next = delete_column(&board, "col-1", 2_000).unwrap();
        assert_eq!(next.column_ids, vec!["col-2", "col-3"]);
        assert!(!next.columns.contains_key("col-1"));
        assert!(!next.cards.contains_key("card1"));
        assert!(!next.cards.contains_key("card2"));
        assert!(next.cards.contains_key("card3"));
        next.check_invariants().unwrap();
    }

    #[test]
    fn test_update_card_fields() {
        let board = sample_board();
        let patch = CardPatch {
            priority: Some(Priority::High),
            labels: Some(BTreeSet::from([Label::Bug, Label::Docs])),
            assignee_id: Some(Some("user-2".into())),
            ..Default::default()
        };
        let next = update_card(&board, "card1", &patch, 2_000).unwrap();
        let card = &next.cards["card1"];
        assert_eq!(card.priority, Priority::High);
        assert_eq!(card.labels.len(), 2);
        assert_eq!(card.assignee_id.as_deref(), Some("user-2"));
        assert_eq!(card.updated_at, 2_000);

        let cleared = update_card(
            &next,
            "card1",
            &CardPatch {
                assignee_id: Some(None),
                ..Default::default()
            },
            3_000,
        )
        .unwrap();
        assert!(cleared.cards["card1"].assignee_id.is_none());
    }

    #[test]
    fn test_update_card_without_changes_is_identity() {
        let board = sample_board();
        let next = update_card(&board, "card1", &CardPatch::default(), 2_000).unwrap();
        assert_eq!(next, board);
    }

    #[test]
    fn test_rename_column_and_board_details() {
        let board = sample_board();
        let next = rename_column(&board, "col-2", " In Review ", 2_000).unwrap();
        assert_eq!(next.columns["col-2"].title, "In Review");

        let next = update_board_details(&board, Some("Roadmap"), Some(" Q3 "), 2_000).unwrap();
        assert_eq!(next.title, "Roadmap");
        assert_eq!(next.description, "Q3");
        assert!(update_board_details(&board, Some(" "), None, 2_000).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn board_with(cards_per_column: &[usize]) -> Board {
            let mut board = Board::seeded("prop", "Prop", "", "owner", 0);
            let column_ids = board.column_ids.clone();
            let mut n = 0;
            for (col_id, count) in column_ids.iter().zip(cards_per_column) {
                for _ in 0..*count {
                    let id = format!("card-{}", n);
                    n += 1;
                    board.columns.get_mut(col_id).unwrap().card_ids.push(id.clone());
                    board.cards.insert(id.clone(), Card::new(id, "t".into(), 0, 0));
                }
            }
            board
        }

        /// (source column, position seed, dest column, dest index)
        fn moves() -> impl Strategy<Value = Vec<(usize, usize, usize, usize)>> {
            prop::collection::vec((0usize..3, 0usize..64, 0usize..3, 0usize..12), 0..40)
        }

        proptest! {
            #[test]
            fn prop_moves_conserve_cards(
                counts in prop::collection::vec(0usize..6, 3),
                moves in moves(),
            ) {
                let mut board = board_with(&counts);
                let total = board.card_count();
                let all: HashSet<String> = board.cards.keys().cloned().collect();

                for (from_col, seed, to_col, to_index) in moves {
                    let from_id = board.column_ids[from_col].clone();
                    let to_id = board.column_ids[to_col].clone();
                    let source = &board.columns[&from_id].card_ids;
                    if source.is_empty() {
                        continue;
                    }
                    let from_index = seed % source.len();
                    let card_id = source[from_index].clone();
                    board = move_card(&board, &card_id, &from_id, from_index, &to_id, to_index, 1)
                        .unwrap();

                    prop_assert_eq!(board.card_count(), total);
                    prop_assert!(board.check_invariants().is_ok());
                }

                let placed: HashSet<String> = board
                    .columns
                    .values()
                    .flat_map(|c| c.card_ids.iter().cloned())
                    .collect();
                prop_assert_eq!(placed, all);
            }

            #[test]
            fn prop_move_round_trip(
                counts in prop::collection::vec(1usize..6, 3),
                from_col in 0usize..3,
                seed in 0usize..64,
                to_col in 0usize..3,
                to_seed in 0usize..64,
            ) {
                let board = board_with(&counts);
                let a = board.column_ids[from_col].clone();
                let b = board.column_ids[to_col].clone();
                let i = seed % board.columns[&a].card_ids.len();
                let card = board.columns[&a].card_ids[i].clone();
                let dest_len = board.columns[&b].card_ids.len();
                let j = if a == b { to_seed % dest_len } else { to_seed % (dest_len + 1) };

                let there = move_card(&board, &card, &a, i, &b, j, 1).unwrap();
                let back = move_card(&there, &card, &b, j, &a, i, 2).unwrap();

                prop_assert_eq!(&back.columns[&a].card_ids, &board.columns[&a].card_ids);
                prop_assert_eq!(&back.columns[&b].card_ids, &board.columns[&b].card_ids);
            }
        }
    }
}
