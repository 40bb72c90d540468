/// In-process document store.
///
/// Holds board documents in memory with:
/// - Partial-path writes validated against the strict board model
/// - Atomic set-union/remove on `memberIds`
/// - A broadcast channel per board feeding subscriptions
/// - A monotonic version counter per write (for ETags and tests)
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc};

use super::document::{parse_board, to_document};
use super::{
    BoardSubscription, DocumentStore, PartialUpdate, StoreError, SUBSCRIPTION_BUFFER,
};
use crate::mutation::ids;
use crate::types::{now_millis, Board, BoardSummary};

const BROADCAST_CAPACITY: usize = 64;

/// State for a single stored board.
struct DocState {
    board: Board,
    version: u64,
    /// Dropped on deletion, which ends every subscription.
    tx: broadcast::Sender<Board>,
}

pub struct MemoryStore {
    /// board_id -> DocState
    boards: RwLock<HashMap<String, DocState>>,
    /// Global version counter (monotonic, shared across all boards)
    next_version: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert a complete board (seeding, tests). Replaces any existing document.
    pub fn insert_board(&self, board: Board) -> Result<(), StoreError> {
        board.check_invariants().map_err(|e| StoreError::Malformed {
            board_id: board.id.clone(),
            reason: e.to_string(),
        })?;
        let version = self.next_version();
        let mut boards = self.boards.write().unwrap_or_else(PoisonError::into_inner);
        match boards.get_mut(&board.id) {
            Some(state) => {
                state.board = board.clone();
                state.version = version;
                let _ = state.tx.send(board);
            }
            None => {
                let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
                boards.insert(board.id.clone(), DocState { board, version, tx });
            }
        }
        Ok(())
    }

    /// Version of the last write to a board.
    pub fn board_version(&self, board_id: &str) -> Option<u64> {
        self.boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(board_id)
            .map(|s| s.version)
    }

    pub fn board_count(&self) -> usize {
        self.boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run `change` against a board under the write lock, then publish the result.
    fn modify<F>(&self, board_id: &str, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Board) -> Result<Option<Board>, StoreError>,
    {
        let mut boards = self.boards.write().unwrap_or_else(PoisonError::into_inner);
        let state = boards
            .get_mut(board_id)
            .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))?;

        let Some(next) = change(&state.board)? else {
            return Ok(());
        };
        state.board = next.clone();
        state.version = self.next_version.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine: nobody is subscribed.
        let _ = state.tx.send(next);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(&self, board_id: &str) -> Result<BoardSubscription, StoreError> {
        let (current, mut updates) = {
            let boards = self.boards.read().unwrap_or_else(PoisonError::into_inner);
            let state = boards
                .get(board_id)
                .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))?;
            // Snapshot and receiver taken under one lock: no write slips between them.
            (state.board.clone(), state.tx.subscribe())
        };

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = board_id.to_string();
        let feeder = tokio::spawn(async move {
            if tx.send(Ok(current)).await.is_err() {
                return;
            }
            loop {
                match updates.recv().await {
                    Ok(board) => {
                        if tx.send(Ok(board)).await.is_err() {
                            break;
                        }
                    }
                    // Every message is a full snapshot; skipping ahead loses nothing.
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("[taskflow.store] Subscriber of {} skipped {} snapshots", id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::info!("[taskflow.store] Board {} deleted, ending subscription", id);
                        break;
                    }
                }
            }
        });

        log::debug!("[taskflow.store] Subscribed to board {}", board_id);
        Ok(BoardSubscription::new(board_id, rx, Some(feeder)))
    }

    async fn apply_partial_update(
        &self,
        board_id: &str,
        update: PartialUpdate,
    ) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }
        self.modify(board_id, |board| {
            let mut doc = to_document(board)?;
            update.apply_to(&mut doc)?;
            let next = parse_board(board_id, doc).map_err(|e| match e {
                StoreError::Malformed { reason, .. } => StoreError::Rejected(reason),
                other => other,
            })?;
            log::debug!(
                "[taskflow.store] Applied {} path(s) to board {}: {:?}",
                update.len(),
                board_id,
                update.path_strings()
            );
            Ok(Some(next))
        })
    }

    async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), StoreError> {
        self.modify(board_id, |board| {
            if board.member_ids.contains(user_id) {
                return Ok(None);
            }
            let mut next = board.clone();
            next.member_ids.insert(user_id.to_string());
            next.updated_at = now_millis();
            log::info!("[taskflow.store] Added member {} to board {}", user_id, board_id);
            Ok(Some(next))
        })
    }

    async fn remove_member(&self, board_id: &str, user_id: &str) -> Result<(), StoreError> {
        self.modify(board_id, |board| {
            if board.owner_id == user_id {
                return Err(StoreError::Rejected(
                    "the owner cannot be removed from a board".to_string(),
                ));
            }
            if !board.member_ids.contains(user_id) {
                return Ok(None);
            }
            let mut next = board.clone();
            next.member_ids.remove(user_id);
            next.updated_at = now_millis();
            log::info!("[taskflow.store] Removed member {} from board {}", user_id, board_id);
            Ok(Some(next))
        })
    }

    async fn create_board(
        &self,
        title: &str,
        description: &str,
        owner_id: &str,
    ) -> Result<String, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::Rejected("board title must not be empty".to_string()));
        }
        if owner_id.trim().is_empty() {
            return Err(StoreError::Rejected("owner id must not be empty".to_string()));
        }

        let mut board_id = ids::new_board_id();
        while self.board_version(&board_id).is_some() {
            board_id = ids::new_board_id();
        }
        let board = Board::seeded(
            &board_id,
            title.trim(),
            description.trim(),
            owner_id,
            now_millis(),
        );
        self.insert_board(board)?;
        log::info!("[taskflow.store] Created board {} for {}", board_id, owner_id);
        Ok(board_id)
    }

    async fn read_board(&self, board_id: &str) -> Result<Board, StoreError> {
        self.boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(board_id)
            .map(|s| s.board.clone())
            .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))
    }

    async fn list_boards(&self, user_id: &str) -> Result<Vec<BoardSummary>, StoreError> {
        let boards = self.boards.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<BoardSummary> = boards
            .values()
            .filter(|s| s.board.member_ids.contains(user_id))
            .map(|s| s.board.summary())
            .collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    async fn delete_board(&self, board_id: &str) -> Result<(), StoreError> {
        let removed = self
            .boards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(board_id);
        match removed {
            Some(_) => {
                log::info!("[taskflow.store] Deleted board {}", board_id);
                Ok(())
            }
            None => Err(StoreError::BoardNotFound(board_id.to_string())),
        }
    }
}
