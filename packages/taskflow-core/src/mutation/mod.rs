pub mod diff;
pub mod engine;
pub mod ids;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::BoardError;
use crate::permissions::Capability;
use crate::types::{Board, Label, Priority};

/// A board change requested by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mutation {
    #[serde(rename_all = "camelCase")]
    MoveCard {
        card_id: String,
        from_column_id: String,
        from_index: usize,
        to_column_id: String,
        to_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    MoveColumn {
        column_id: String,
        from_index: usize,
        to_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    AddCard { column_id: String, title: String },
    AddColumn { title: String },
    #[serde(rename_all = "camelCase")]
    DeleteCard { card_id: String },
    #[serde(rename_all = "camelCase")]
    DeleteColumn { column_id: String },
    #[serde(rename_all = "camelCase")]
    UpdateCard { card_id: String, patch: CardPatch },
    #[serde(rename_all = "camelCase")]
    RenameColumn { column_id: String, title: String },
    UpdateBoardDetails {
        title: Option<String>,
        description: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    InviteMember { user_id: String },
    #[serde(rename_all = "camelCase")]
    RemoveMember { user_id: String },
    DeleteBoard,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::MoveCard { .. } => "move_card",
            Mutation::MoveColumn { .. } => "move_column",
            Mutation::AddCard { .. } => "add_card",
            Mutation::AddColumn { .. } => "add_column",
            Mutation::DeleteCard { .. } => "delete_card",
            Mutation::DeleteColumn { .. } => "delete_column",
            Mutation::UpdateCard { .. } => "update_card",
            Mutation::RenameColumn { .. } => "rename_column",
            Mutation::UpdateBoardDetails { .. } => "update_board_details",
            Mutation::InviteMember { .. } => "invite_member",
            Mutation::RemoveMember { .. } => "remove_member",
            Mutation::DeleteBoard => "delete_board",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Mutation::InviteMember { .. } | Mutation::RemoveMember { .. } => Capability::Invite,
            Mutation::DeleteBoard => Capability::Delete,
            _ => Capability::Edit,
        }
    }

    /// Input-only checks that do not depend on board state.
    pub fn validate(&self) -> Result<(), BoardError> {
        match self {
            Mutation::AddCard { title, .. }
            | Mutation::AddColumn { title }
            | Mutation::RenameColumn { title, .. } => {
                engine::clean_title(title)?;
            }
            Mutation::UpdateCard { patch, .. } => {
                if let Some(title) = &patch.title {
                    engine::clean_title(title)?;
                }
            }
            Mutation::UpdateBoardDetails { title, .. } => {
                if let Some(title) = title {
                    engine::clean_title(title)?;
                }
            }
            Mutation::InviteMember { user_id } | Mutation::RemoveMember { user_id } => {
                if user_id.trim().is_empty() {
                    return Err(BoardError::validation("user id must not be empty"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Field edits for a single card. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeSet<Label>>,
    /// `Some(None)` clears the assignee.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub assignee_id: Option<Option<String>>,
}

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Result of applying a board-content mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub board: Board,
    /// Id of the column or card the mutation created, if any.
    pub created_id: Option<String>,
}

impl Applied {
    fn unchanged(board: &Board) -> Self {
        Self {
            board: board.clone(),
            created_id: None,
        }
    }

    fn changed(board: Board) -> Self {
        Self {
            board,
            created_id: None,
        }
    }
}

/// Apply a board-content mutation through the engine.
///
/// Membership and board deletion go through dedicated store primitives; for
/// those the board comes back unchanged.
pub fn apply(board: &Board, mutation: &Mutation, now: i64) -> Result<Applied, BoardError> {
    match mutation {
        Mutation::MoveCard {
            card_id,
            from_column_id,
            from_index,
            to_column_id,
            to_index,
        } => engine::move_card(
            board,
            card_id,
            from_column_id,
            *from_index,
            to_column_id,
            *to_index,
            now,
        )
        .map(Applied::changed),
        Mutation::MoveColumn {
            column_id,
            from_index,
            to_index,
        } => engine::move_column(board, column_id, *from_index, *to_index, now)
            .map(Applied::changed),
        Mutation::AddCard { column_id, title } => {
            let (board, id) = engine::add_card(board, column_id, title, now)?;
            Ok(Applied {
                board,
                created_id: Some(id),
            })
        }
        Mutation::AddColumn { title } => {
            let (board, id) = engine::add_column(board, title, now)?;
            Ok(Applied {
                board,
                created_id: Some(id),
            })
        }
        Mutation::DeleteCard { card_id } => {
            engine::delete_card(board, card_id, now).map(Applied::changed)
        }
        Mutation::DeleteColumn { column_id } => {
            engine::delete_column(board, column_id, now).map(Applied::changed)
        }
        Mutation::UpdateCard { card_id, patch } => {
            engine::update_card(board, card_id, patch, now).map(Applied::changed)
        }
        Mutation::RenameColumn { column_id, title } => {
            engine::rename_column(board, column_id, title, now).map(Applied::changed)
        }
        Mutation::UpdateBoardDetails { title, description } => engine::update_board_details(
            board,
            title.as_deref(),
            description.as_deref(),
            now,
        )
        .map(Applied::changed),
        Mutation::InviteMember { .. } | Mutation::RemoveMember { .. } | Mutation::DeleteBoard => {
            log::debug!(
                "[taskflow.mutation] {} has no content change, board {} left as is",
                mutation.name(),
                board.id
            );
            Ok(Applied::unchanged(board))
        }
    }
}
