use axum::{
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use taskflow_core::{BoardError, StoreError};

mod board;
mod events;
mod export;

use crate::state::AppState;

/// Axum REST API routes.
///
///   GET    /status                               -> health check (+ sync settings)
///   GET    /boards?user=...                      -> boards the user is a member of
///   POST   /boards                               -> create board (seeded columns)
///   GET    /boards/{boardId}                     -> board document (+ ETag)
///   PATCH  /boards/{boardId}?user=...            -> partial-path update (edit role)
///   DELETE /boards/{boardId}?user=...            -> delete board (owner)
///   POST   /boards/{boardId}/members?user=...    -> add member (owner)
///   DELETE /boards/{boardId}/members/{member}?user=... -> remove member (owner)
///   GET    /boards/{boardId}/export.csv          -> CSV export
///   GET    /boards/{boardId}/export.html         -> printable export
///   GET    /logs                                 -> recent backend log entries
///   GET    /logs/stream                          -> SSE stream of log entries
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(events::status))
        .route("/boards", get(board::list_boards).post(board::create_board))
        .route(
            "/boards/{board_id}",
            get(board::get_board)
                .patch(board::patch_board)
                .delete(board::delete_board),
        )
        .route("/boards/{board_id}/members", post(board::add_member))
        .route(
            "/boards/{board_id}/members/{member_id}",
            delete(board::remove_member),
        )
        .route("/boards/{board_id}/export.csv", get(export::export_csv))
        .route("/boards/{board_id}/export.html", get(export::export_html))
        .route("/logs", get(events::list_logs))
        .route("/logs/stream", get(events::stream_logs))
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Caller identity for gated routes. Authentication is out of scope; the
/// caller names itself.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

impl UserQuery {
    pub fn user_id(&self) -> &str {
        self.user.as_deref().map(str::trim).unwrap_or("")
    }
}

fn api_error(status: StatusCode, target: &'static str, error: impl Into<String>) -> ApiError {
    let error = error.into();
    log_api_issue(status, target, &error);
    (status, Json(ErrorResponse { error }))
}

pub fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::BoardNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidPath(_) | StoreError::Rejected(_) => StatusCode::BAD_REQUEST,
        StoreError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        StoreError::Malformed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        StoreError::Network(_) | StoreError::Disconnected(_) => StatusCode::BAD_GATEWAY,
    }
}

fn store_error(target: &'static str, err: StoreError) -> ApiError {
    api_error(store_status(&err), target, err.to_string())
}

fn board_error(target: &'static str, err: BoardError) -> ApiError {
    let status = match &err {
        BoardError::Validation(_) => StatusCode::BAD_REQUEST,
        BoardError::Permission { .. } => StatusCode::FORBIDDEN,
        BoardError::NotFound { .. } => StatusCode::NOT_FOUND,
        BoardError::Store(inner) => store_status(inner),
    };
    api_error(status, target, err.to_string())
}

fn insert_header_safe(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match value.parse() {
        Ok(parsed) => {
            headers.insert(name, parsed);
        }
        Err(e) => {
            log::warn!("Failed to set header {}={} ({})", name, value, e);
        }
    }
}

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}
