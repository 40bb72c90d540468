use std::fmt;

use crate::permissions::Role;
use crate::store::StoreError;

/// Kinds of records a mutation can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Board,
    Column,
    Card,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Board => "Board",
            EntityKind::Column => "Column",
            EntityKind::Card => "Card",
        })
    }
}

/// Errors surfaced by board mutations and sessions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BoardError {
    /// Rejected before any state change.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: role '{role}' cannot {action}")]
    Permission { role: Role, action: &'static str },

    /// Backend failure; optimistic state has been rolled back.
    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
}

impl BoardError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        BoardError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        BoardError::Validation(msg.into())
    }

    pub fn is_store(&self) -> bool {
        matches!(self, BoardError::Store(_))
    }
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BoardNotFound(id) => BoardError::NotFound {
                kind: EntityKind::Board,
                id,
            },
            other => BoardError::Store(other),
        }
    }
}
