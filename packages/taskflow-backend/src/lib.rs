/// TaskFlow backend: config loading, logging, the reference document-store
/// service (HTTP + WebSocket) and a client adapter for it.
pub mod api;
pub mod client;
pub mod config;
pub mod live;
pub mod log_bridge;
pub mod server;
pub mod state;

use std::sync::Arc;
use taskflow_core::store::memory::MemoryStore;

use crate::state::AppState;

/// Start the backend and serve until Ctrl-C.
pub async fn run() -> std::io::Result<()> {
    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("failed to initialize backend logger: {}", e));
    }

    let config_path = config::default_config_path();
    let config = config::load_effective_config(&config_path);

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, &config);
    let (port, server) = server::spawn_server(state).await?;
    log::info!(
        "TaskFlow backend ready on {}:{} (log file {})",
        config.bind_address,
        port,
        log_bridge::log_file_path()
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            log::info!("Shutting down");
        }
        _ = server => {
            log::warn!("HTTP server task ended");
        }
    }
    Ok(())
}
