/// Live-subscription message types shared between the backend and its clients.
///
/// Protocol:
///   Client opens `GET /boards/{id}/live` as a WebSocket.
///   Server sends `Snapshot` with the current document, then one per change.
///   `Missing` means the board does not exist (or was deleted); the server closes after it.
use serde::{Deserialize, Serialize};

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveMessage {
    /// Raw board document; clients validate it before use.
    Snapshot { board: serde_json::Value },
    Missing { board_id: String },
    Error { message: String },
}
