/// HTTP server: binds the listener and serves axum on a background tokio task.
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::api::api_router;
use crate::live::live_router;
use crate::state::AppState;

/// Full application router with CORS.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_router()
        .merge(live_router())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve. Returns the bound port (useful with port 0) and the server task.
pub async fn spawn_server(state: AppState) -> std::io::Result<(u16, JoinHandle<()>)> {
    let bind_addr = state.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, state.port)).await?;
    let actual_port = listener.local_addr()?.port();

    log::info!(
        "HTTP server listening on http://{}:{}",
        bind_addr,
        actual_port
    );

    let app = build_app(state);
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("HTTP server exited with error: {}", e);
        }
    });

    Ok((actual_port, task))
}
