/// Shared application state passed to axum handlers.
use std::sync::Arc;
use taskflow_core::config::SyncSettings;
use taskflow_core::store::memory::MemoryStore;

use crate::config::BackendConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub port: u16,
    pub bind_address: String,
    /// Advertised to clients at `/status`.
    pub sync: SyncSettings,
    pub started_at_ms: i64,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, config: &BackendConfig) -> Self {
        Self {
            store,
            port: config.port,
            bind_address: config.bind_address.clone(),
            sync: config.sync.clone(),
            started_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}
