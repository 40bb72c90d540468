use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use taskflow_core::permissions::{self, Capability};
use taskflow_core::store::document::to_document;
use taskflow_core::store::{DocumentStore, PartialUpdate};
use taskflow_core::Board;

use super::{api_error, board_error, insert_header_safe, store_error, ApiError, UserQuery};
use crate::state::AppState;

/// Top-level fields that a partial update may not touch. Membership has its
/// own endpoints; identity and creation time never change.
const PROTECTED_FIELDS: &[&str] = &["id", "ownerId", "memberIds", "createdAt"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardBody {
    title: String,
    #[serde(default)]
    description: String,
    owner_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberBody {
    user_id: String,
}

/// Load a board and check that the caller may perform `capability` on it.
async fn authorized_board(
    state: &AppState,
    board_id: &str,
    query: &UserQuery,
    capability: Capability,
    target: &'static str,
) -> Result<Board, ApiError> {
    let board = state
        .store
        .read_board(board_id)
        .await
        .map_err(|e| store_error(target, e))?;
    permissions::require(&board, query.user_id(), capability)
        .map_err(|e| board_error(target, e))?;
    Ok(board)
}

pub async fn list_boards(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query.user_id();
    if user_id.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "taskflow.api.list_boards",
            "Missing user query parameter",
        ));
    }
    let boards = state
        .store
        .list_boards(user_id)
        .await
        .map_err(|e| store_error("taskflow.api.list_boards", e))?;
    Ok(Json(serde_json::json!({ "boards": boards })))
}

pub async fn create_board(
    State(state): State<AppState>,
    Json(body): Json<CreateBoardBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let board_id = state
        .store
        .create_board(&body.title, &body.description, body.owner_id.trim())
        .await
        .map_err(|e| store_error("taskflow.api.create_board", e))?;
    log::info!(
        target: "taskflow.api.create_board",
        "Created board {} for {}",
        board_id,
        body.owner_id
    );
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": board_id }))))
}

pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap, Json<serde_json::Value>), ApiError> {
    let board = state
        .store
        .read_board(&board_id)
        .await
        .map_err(|e| store_error("taskflow.api.get_board", e))?;
    let etag = format!("\"{}\"", board.fingerprint());

    let mut resp_headers = HeaderMap::new();
    insert_header_safe(&mut resp_headers, "etag", &etag);

    // Check If-None-Match for conditional response
    if let Some(value) = headers.get("if-none-match").and_then(|v| v.to_str().ok()) {
        if value == etag {
            return Ok((
                StatusCode::NOT_MODIFIED,
                resp_headers,
                Json(serde_json::json!({})),
            ));
        }
    }

    let doc = to_document(&board).map_err(|e| store_error("taskflow.api.get_board", e))?;
    Ok((StatusCode::OK, resp_headers, Json(doc)))
}

pub async fn patch_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    Query(query): Query<UserQuery>,
    Json(update): Json<PartialUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    const TARGET: &str = "taskflow.api.patch_board";
    if update.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, TARGET, "Empty update"));
    }
    if let Some(path) = update
        .paths()
        .find(|p| {
            p.segments()
                .first()
                .is_some_and(|root| PROTECTED_FIELDS.contains(&root.as_str()))
        })
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            TARGET,
            format!("Field '{}' cannot be changed by a partial update", path),
        ));
    }

    authorized_board(&state, &board_id, &query, Capability::Edit, TARGET).await?;
    let paths = update.len();
    state
        .store
        .apply_partial_update(&board_id, update)
        .await
        .map_err(|e| store_error(TARGET, e))?;

    log::debug!(
        target: TARGET,
        "{} wrote {} path(s) on board {}",
        query.user_id(),
        paths,
        board_id
    );
    Ok(Json(serde_json::json!({
        "success": true,
        "version": state.store.board_version(&board_id),
    })))
}

pub async fn delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    const TARGET: &str = "taskflow.api.delete_board";
    authorized_board(&state, &board_id, &query, Capability::Delete, TARGET).await?;
    state
        .store
        .delete_board(&board_id)
        .await
        .map_err(|e| store_error(TARGET, e))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    Query(query): Query<UserQuery>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    const TARGET: &str = "taskflow.api.add_member";
    let member = body.user_id.trim();
    if member.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, TARGET, "Missing userId"));
    }
    authorized_board(&state, &board_id, &query, Capability::Invite, TARGET).await?;
    state
        .store
        .add_member(&board_id, member)
        .await
        .map_err(|e| store_error(TARGET, e))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((board_id, member_id)): Path<(String, String)>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    const TARGET: &str = "taskflow.api.remove_member";
    authorized_board(&state, &board_id, &query, Capability::Invite, TARGET).await?;
    state
        .store
        .remove_member(&board_id, &member_id)
        .await
        .map_err(|e| store_error(TARGET, e))?;
    Ok(Json(serde_json::json!({ "success": true })))
}
