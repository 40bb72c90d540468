/// Export routes: thin wrappers around `taskflow_core::export`.
///
///   GET /boards/{board_id}/export.csv   -> CSV download
///   GET /boards/{board_id}/export.html  -> printable HTML page
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use taskflow_core::export::{export_file_name, render_csv, render_printable_document};
use taskflow_core::store::DocumentStore;

use super::{insert_header_safe, store_error, ApiError};
use crate::state::AppState;

pub async fn export_csv(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<(StatusCode, HeaderMap, String), ApiError> {
    let board = state
        .store
        .read_board(&board_id)
        .await
        .map_err(|e| store_error("taskflow.api.export_csv", e))?;

    let mut headers = HeaderMap::new();
    insert_header_safe(&mut headers, "content-type", "text/csv; charset=utf-8");
    insert_header_safe(
        &mut headers,
        "content-disposition",
        &format!("attachment; filename=\"{}\"", export_file_name(&board, "csv")),
    );
    Ok((StatusCode::OK, headers, render_csv(&board)))
}

pub async fn export_html(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<(StatusCode, HeaderMap, String), ApiError> {
    let board = state
        .store
        .read_board(&board_id)
        .await
        .map_err(|e| store_error("taskflow.api.export_html", e))?;

    let mut headers = HeaderMap::new();
    insert_header_safe(&mut headers, "content-type", "text/html; charset=utf-8");
    let today = chrono::Utc::now().date_naive();
    Ok((
        StatusCode::OK,
        headers,
        render_printable_document(&board, today),
    ))
}
