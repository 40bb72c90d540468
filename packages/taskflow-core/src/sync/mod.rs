/// Optimistic board synchronization.
///
/// `machine` is the pure Idle/Syncing/Error state machine with its rollback
/// snapshot; `controller` drives it from a tokio task against a `DocumentStore`.
pub mod controller;
pub mod machine;

use serde::Serialize;

pub use controller::BoardSession;
pub use machine::{Begun, SyncMachine, WritePlan};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Error => "error",
        }
    }
}

/// What a UI layer shows next to the board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    /// Requests accepted but not yet started.
    pub queued: usize,
    pub last_error: Option<String>,
    /// `false` once the store subscription has ended.
    pub connected: bool,
}

/// Result of a settled mutation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Id of the card or column the mutation created.
    pub created_id: Option<String>,
    /// Paths named by the partial write. Empty for no-ops and membership changes.
    pub written_paths: Vec<String>,
}
