/// Optimistic-update state machine for one board.
///
/// States:
///   Idle    - local board matches what the store last confirmed
///   Syncing - one write in flight; the pre-mutation snapshot is held for rollback
///   Error   - the last write failed and was rolled back; cleared by the next `begin`
///
/// The machine does no I/O. The controller calls `begin`, performs the
/// returned `WritePlan`, and reports the outcome through `settle`.
/// Authoritative pushes arrive through `on_remote` at any time.
use std::collections::HashSet;

use super::SyncState;
use crate::error::BoardError;
use crate::mutation::{self, diff, Mutation};
use crate::permissions;
use crate::store::document::to_document;
use crate::store::{PartialUpdate, StoreError};
use crate::types::Board;

/// Store call required to persist a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum WritePlan {
    /// Nothing changed; no write needed.
    Noop,
    Patch(PartialUpdate),
    AddMember(String),
    RemoveMember(String),
    DeleteBoard,
}

impl WritePlan {
    pub fn is_noop(&self) -> bool {
        matches!(self, WritePlan::Noop)
    }
}

/// A started mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Begun {
    pub plan: WritePlan,
    pub created_id: Option<String>,
}

struct InFlight {
    /// Board to restore on failure. Rebased on every authoritative push.
    snapshot: Board,
    /// Paths the in-flight write owns until it settles.
    overlay: PartialUpdate,
    /// Columns whose card lists the write touches; they win during repair.
    touched: HashSet<String>,
}

pub struct SyncMachine {
    board: Board,
    state: SyncState,
    in_flight: Option<InFlight>,
    last_error: Option<String>,
}

impl SyncMachine {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            state: SyncState::Idle,
            in_flight: None,
            last_error: None,
        }
    }

    /// Local (possibly optimistic) board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_writing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Accept a mutation: check it, apply it locally, and plan the write.
    ///
    /// Rejections (validation, permission, missing entities) leave every
    /// piece of state untouched, including a previous `Error`.
    pub fn begin(
        &mut self,
        mutation: &Mutation,
        user_id: &str,
        now: i64,
    ) -> Result<Begun, BoardError> {
        if self.in_flight.is_some() {
            return Err(BoardError::validation(
                "a write is already in flight for this board",
            ));
        }
        mutation.validate()?;
        permissions::authorize(&self.board, user_id, mutation)?;

        let (next, plan, created_id) = match mutation {
            Mutation::InviteMember { user_id: member } => {
                let member = member.trim();
                if self.board.member_ids.contains(member) {
                    return Err(BoardError::validation(format!(
                        "{} is already a member of this board",
                        member
                    )));
                }
                let mut next = self.board.clone();
                next.member_ids.insert(member.to_string());
                next.updated_at = now;
                (next, WritePlan::AddMember(member.to_string()), None)
            }
            Mutation::RemoveMember { user_id: member } => {
                let member = member.trim();
                if member == self.board.owner_id {
                    return Err(BoardError::validation(
                        "the owner cannot be removed from a board",
                    ));
                }
                if !self.board.member_ids.contains(member) {
                    return Err(BoardError::validation(format!(
                        "{} is not a member of this board",
                        member
                    )));
                }
                let mut next = self.board.clone();
                next.member_ids.remove(member);
                next.updated_at = now;
                (next, WritePlan::RemoveMember(member.to_string()), None)
            }
            Mutation::DeleteBoard => (self.board.clone(), WritePlan::DeleteBoard, None),
            content => {
                let applied = mutation::apply(&self.board, content, now)?;
                (applied.board, WritePlan::Noop, applied.created_id)
            }
        };

        let overlay = diff::board_patch(&self.board, &next)?;
        let plan = match plan {
            WritePlan::Noop if overlay.is_empty() => {
                log::debug!(
                    "[taskflow.sync] {} on board {} changed nothing",
                    mutation.name(),
                    self.board.id
                );
                self.state = SyncState::Idle;
                self.last_error = None;
                return Ok(Begun {
                    plan: WritePlan::Noop,
                    created_id,
                });
            }
            WritePlan::Noop => WritePlan::Patch(overlay.clone()),
            other => other,
        };

        let touched = diff::touched_columns(&overlay);
        let snapshot = std::mem::replace(&mut self.board, next);
        self.in_flight = Some(InFlight {
            snapshot,
            overlay,
            touched,
        });
        self.state = SyncState::Syncing;
        self.last_error = None;
        log::debug!(
            "[taskflow.sync] {} on board {} applied optimistically",
            mutation.name(),
            self.board.id
        );
        Ok(Begun { plan, created_id })
    }

    /// Report the outcome of the in-flight write.
    ///
    /// On failure the pre-mutation snapshot (rebased on any pushes since)
    /// becomes the local board again.
    pub fn settle(&mut self, result: Result<(), StoreError>) -> Result<(), BoardError> {
        let Some(in_flight) = self.in_flight.take() else {
            log::warn!(
                "[taskflow.sync] Settle on board {} with no write in flight",
                self.board.id
            );
            return result.map_err(BoardError::from);
        };

        match result {
            Ok(()) => {
                self.state = SyncState::Idle;
                Ok(())
            }
            Err(err) => {
                log::warn!(
                    "[taskflow.sync] Write to board {} failed, rolling back: {}",
                    self.board.id,
                    err
                );
                self.board = in_flight.snapshot;
                self.state = SyncState::Error;
                self.last_error = Some(err.to_string());
                Err(BoardError::from(err))
            }
        }
    }

    /// Reconcile an authoritative push. Returns `true` if the local board changed.
    ///
    /// Remote state wins, except for paths owned by the in-flight write,
    /// which keep their local value until the write settles.
    pub fn on_remote(&mut self, remote: Board) -> bool {
        let next = match &mut self.in_flight {
            None => remote,
            Some(in_flight) => {
                let merged = overlay_onto(&remote, &in_flight.overlay, &in_flight.touched);
                in_flight.snapshot = remote;
                merged
            }
        };
        if next == self.board {
            return false;
        }
        self.board = next;
        true
    }
}

/// Re-apply the in-flight paths on top of a remote board and repair the result.
fn overlay_onto(remote: &Board, overlay: &PartialUpdate, touched: &HashSet<String>) -> Board {
    let merged = to_document(remote).and_then(|mut doc| {
        overlay.apply_to(&mut doc)?;
        serde_json::from_value::<Board>(doc).map_err(|e| StoreError::Malformed {
            board_id: remote.id.clone(),
            reason: e.to_string(),
        })
    });

    match merged {
        Ok(mut board) => {
            board.repair(touched);
            board
        }
        Err(err) => {
            log::warn!(
                "[taskflow.sync] Pending write no longer fits board {}, taking remote state: {}",
                remote.id,
                err
            );
            remote.clone()
        }
    }
}
