/// Live board subscription over WebSocket.
///
/// Protocol:
///   Client opens `/boards/{board_id}/live`.
///   Server sends `Snapshot` with the current document, then one per change.
///   Server sends `Missing` and closes when the board does not exist or is deleted.
///   Client messages other than Close are ignored.
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use taskflow_core::store::document::to_document;
use taskflow_core::store::wire::LiveMessage;
use taskflow_core::store::{DocumentStore, StoreError};

use crate::state::AppState;

pub fn live_router() -> Router<AppState> {
    Router::new().route("/boards/{board_id}/live", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(board_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_live_session(socket, board_id, state))
}

fn encode(msg: &LiveMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            log::warn!("[taskflow.live] Failed to encode message: {}", e);
            None
        }
    }
}

async fn handle_live_session(socket: WebSocket, board_id: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut subscription = match state.store.subscribe(&board_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            let msg = match e {
                StoreError::BoardNotFound(_) => LiveMessage::Missing {
                    board_id: board_id.clone(),
                },
                other => LiveMessage::Error {
                    message: other.to_string(),
                },
            };
            if let Some(msg) = encode(&msg) {
                let _ = ws_tx.send(msg).await;
            }
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };
    log::info!("[taskflow.live] Client subscribed to board {}", board_id);

    loop {
        tokio::select! {
            pushed = subscription.next() => {
                let msg = match pushed {
                    Some(Ok(board)) => match to_document(&board) {
                        Ok(doc) => LiveMessage::Snapshot { board: doc },
                        Err(e) => LiveMessage::Error { message: e.to_string() },
                    },
                    Some(Err(e)) => LiveMessage::Error { message: e.to_string() },
                    None => {
                        if let Some(msg) = encode(&LiveMessage::Missing { board_id: board_id.clone() }) {
                            let _ = ws_tx.send(msg).await;
                        }
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                };
                let Some(msg) = encode(&msg) else { continue };
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    log::info!("[taskflow.live] Client left board {}", board_id);
}
