/// `DocumentStore` over the backend's HTTP + WebSocket surface.
///
/// Writes go through REST (`PATCH /boards/{id}`, member routes) and carry the
/// caller in the `user` query parameter; subscriptions are WebSocket
/// connections to `/boards/{id}/live`. Every pushed document is parsed and
/// invariant-checked before it leaves this module.
use async_trait::async_trait;
use futures_util::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde::Deserialize;
use taskflow_core::config::UserIdentity;
use taskflow_core::store::document::parse_board;
use taskflow_core::store::wire::LiveMessage;
use taskflow_core::store::{BoardSubscription, DocumentStore, PartialUpdate, StoreError};
use taskflow_core::{Board, BoardSummary};
use tokio::sync::mpsc;

use crate::api::ErrorResponse;

const SUBSCRIPTION_BUFFER: usize = 32;

/// Characters escaped in URL path segments and query values.
const URL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

pub struct HttpDocumentStore {
    base_url: String,
    user_id: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct CreatedBoard {
    id: String,
}

#[derive(Deserialize)]
struct BoardList {
    boards: Vec<BoardSummary>,
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, URL_ESCAPE).to_string()
}

fn network(context: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Network(format!("{}: {}", context, err))
}

impl HttpDocumentStore {
    /// `base_url` like `http://127.0.0.1:8080`; `user_id` is sent with every write.
    pub fn new(base_url: &str, user_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn for_identity(base_url: &str, identity: &UserIdentity) -> Self {
        Self::new(base_url, &identity.id)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn board_url(&self, board_id: &str) -> String {
        format!("{}/boards/{}", self.base_url, encode(board_id))
    }

    fn user_query(&self) -> String {
        format!("user={}", encode(&self.user_id))
    }

    fn live_url(&self, board_id: &str) -> String {
        format!(
            "{}/live",
            self.board_url(board_id)
                .replacen("http://", "ws://", 1)
                .replacen("https://", "wss://", 1)
        )
    }

    /// Map a non-success response to the store error taxonomy.
    async fn check(board_id: &str, resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::BoardNotFound(board_id.to_string()),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                StoreError::PermissionDenied(message)
            }
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                StoreError::Rejected(message)
            }
            _ => StoreError::Network(format!("{} ({})", message, status)),
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn subscribe(&self, board_id: &str) -> Result<BoardSubscription, StoreError> {
        use tokio_tungstenite::tungstenite::Message;

        let url = self.live_url(board_id);
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| network("WS connect failed", e))?;
        log::info!("[taskflow.client] Connected to {}", url);

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = board_id.to_string();
        let feeder = tokio::spawn(async move {
            // Pongs are answered by tungstenite; the write half stays unused.
            let (_ws_tx, mut ws_rx) = ws_stream.split();
            while let Some(msg) = ws_rx.next().await {
                let text = match msg {
                    Ok(Message::Text(t)) => t.to_string(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = tx.send(Err(network("WS read error", e))).await;
                        break;
                    }
                };

                let item = match serde_json::from_str::<LiveMessage>(&text) {
                    Ok(LiveMessage::Snapshot { board }) => parse_board(&id, board),
                    Ok(LiveMessage::Missing { .. }) => {
                        log::info!("[taskflow.client] Board {} is gone", id);
                        break;
                    }
                    Ok(LiveMessage::Error { message }) => Err(StoreError::Network(message)),
                    Err(e) => Err(StoreError::Malformed {
                        board_id: id.clone(),
                        reason: e.to_string(),
                    }),
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
            log::debug!("[taskflow.client] Live stream for {} ended", id);
        });

        Ok(BoardSubscription::new(board_id, rx, Some(feeder)))
    }

    async fn apply_partial_update(
        &self,
        board_id: &str,
        update: PartialUpdate,
    ) -> Result<(), StoreError> {
        let resp = self
            .http
            .patch(format!("{}?{}", self.board_url(board_id), self.user_query()))
            .json(&update)
            .send()
            .await
            .map_err(|e| network("PATCH failed", e))?;
        Self::check(board_id, resp).await?;
        Ok(())
    }

    async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .post(format!(
                "{}/members?{}",
                self.board_url(board_id),
                self.user_query()
            ))
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await
            .map_err(|e| network("Add member failed", e))?;
        Self::check(board_id, resp).await?;
        Ok(())
    }

    async fn remove_member(&self, board_id: &str, user_id: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .delete(format!(
                "{}/members/{}?{}",
                self.board_url(board_id),
                encode(user_id),
                self.user_query()
            ))
            .send()
            .await
            .map_err(|e| network("Remove member failed", e))?;
        Self::check(board_id, resp).await?;
        Ok(())
    }

    async fn create_board(
        &self,
        title: &str,
        description: &str,
        owner_id: &str,
    ) -> Result<String, StoreError> {
        let resp = self
            .http
            .post(format!("{}/boards", self.base_url))
            .json(&serde_json::json!({
                "title": title,
                "description": description,
                "ownerId": owner_id,
            }))
            .send()
            .await
            .map_err(|e| network("Create board failed", e))?;
        let created: CreatedBoard = Self::check("", resp)
            .await?
            .json()
            .await
            .map_err(|e| network("Parse create response", e))?;
        Ok(created.id)
    }

    async fn read_board(&self, board_id: &str) -> Result<Board, StoreError> {
        let resp = self
            .http
            .get(self.board_url(board_id))
            .send()
            .await
            .map_err(|e| network("GET board failed", e))?;
        let doc: serde_json::Value = Self::check(board_id, resp)
            .await?
            .json()
            .await
            .map_err(|e| network("Parse board response", e))?;
        parse_board(board_id, doc)
    }

    async fn list_boards(&self, user_id: &str) -> Result<Vec<BoardSummary>, StoreError> {
        let resp = self
            .http
            .get(format!("{}/boards?user={}", self.base_url, encode(user_id)))
            .send()
            .await
            .map_err(|e| network("List boards failed", e))?;
        let list: BoardList = Self::check("", resp)
            .await?
            .json()
            .await
            .map_err(|e| network("Parse board list", e))?;
        Ok(list.boards)
    }

    async fn delete_board(&self, board_id: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .delete(format!("{}?{}", self.board_url(board_id), self.user_query()))
            .send()
            .await
            .map_err(|e| network("Delete board failed", e))?;
        Self::check(board_id, resp).await?;
        Ok(())
    }
}
