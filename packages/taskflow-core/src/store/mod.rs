pub mod document;
pub mod memory;
pub mod path;
pub mod wire;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{Board, BoardSummary};
pub use path::{FieldPath, PartialUpdate, PatchValue};

/// Contract of the remote document store backing a board.
/// Implementations: MemoryStore (in-process), the backend's HTTP client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Long-lived push stream of board snapshots. The first item is the
    /// current state. Dropping the subscription unsubscribes.
    async fn subscribe(&self, board_id: &str) -> Result<BoardSubscription, StoreError>;

    /// Write only the named paths. Never a full-document overwrite.
    async fn apply_partial_update(
        &self,
        board_id: &str,
        update: PartialUpdate,
    ) -> Result<(), StoreError>;

    /// Atomic set-union on `memberIds`.
    async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Atomic set-remove on `memberIds`.
    async fn remove_member(&self, board_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Create a board seeded with the default columns. Returns its id.
    async fn create_board(
        &self,
        title: &str,
        description: &str,
        owner_id: &str,
    ) -> Result<String, StoreError>;

    async fn read_board(&self, board_id: &str) -> Result<Board, StoreError>;

    /// Boards the user is a member of, newest first.
    async fn list_boards(&self, user_id: &str) -> Result<Vec<BoardSummary>, StoreError>;

    async fn delete_board(&self, board_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Malformed board document {board_id}: {reason}")]
    Malformed { board_id: String, reason: String },

    #[error("Invalid field path '{0}'")]
    InvalidPath(String),

    #[error("Update rejected: {0}")]
    Rejected(String),

    #[error("Permission denied by store: {0}")]
    PermissionDenied(String),

    #[error("Write not acknowledged within {0} ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Subscription to board {0} closed")]
    Disconnected(String),
}

/// Receiving end of a board subscription.
///
/// Snapshots are produced by a feeder task owned by the store; dropping the
/// subscription stops that task.
pub struct BoardSubscription {
    board_id: String,
    rx: mpsc::Receiver<Result<Board, StoreError>>,
    feeder: Option<JoinHandle<()>>,
}

impl BoardSubscription {
    pub fn new(
        board_id: &str,
        rx: mpsc::Receiver<Result<Board, StoreError>>,
        feeder: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            board_id: board_id.to_string(),
            rx,
            feeder,
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Next pushed snapshot. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<Board, StoreError>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        log::debug!("[taskflow.store] Unsubscribed from board {}", self.board_id);
    }
}

impl Drop for BoardSubscription {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

/// Capacity of the per-subscription snapshot buffer.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 32;
