//! Board model, mutation engine and optimistic sync for TaskFlow kanban boards.
pub mod config;
pub mod error;
pub mod export;
pub mod mutation;
pub mod permissions;
pub mod store;
pub mod sync;
pub mod types;

pub use error::{BoardError, EntityKind};
pub use mutation::{CardPatch, Mutation};
pub use permissions::Role;
pub use store::{DocumentStore, StoreError};
pub use sync::{BoardSession, MutationOutcome, SyncState, SyncStatus};
pub use types::{Board, BoardSummary, Card, Column, Label, Priority};
