/// Shared configuration types used by board sessions and the backend.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for a board session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// A write not acknowledged within this window is rolled back.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Time allowed for the first snapshot when opening a board.
    #[serde(default = "default_subscribe_timeout_ms")]
    pub subscribe_timeout_ms: u64,
    /// Pending requests per session before new ones are refused.
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_subscribe_timeout_ms() -> u64 {
    10_000
}

fn default_queue_limit() -> usize {
    64
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            subscribe_timeout_ms: default_subscribe_timeout_ms(),
            queue_limit: default_queue_limit(),
        }
    }
}

impl SyncSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }

    /// Queue capacity, never zero.
    pub fn queue_capacity(&self) -> usize {
        self.queue_limit.max(1)
    }
}

/// User identity (shared format between sessions and the backend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: SyncSettings = serde_json::from_str(r#"{"queue_limit": 3}"#).unwrap();
        assert_eq!(settings.queue_limit, 3);
        assert_eq!(settings.write_timeout(), Duration::from_secs(10));
        assert_eq!(settings.subscribe_timeout_ms, 10_000);
    }

    #[test]
    fn test_zero_queue_limit_still_admits_one() {
        let settings = SyncSettings {
            queue_limit: 0,
            ..Default::default()
        };
        assert_eq!(settings.queue_capacity(), 1);
    }

    #[test]
    fn test_identity_email_is_optional() {
        let identity: UserIdentity =
            serde_json::from_str(r#"{"id": "user-1", "name": "Ana"}"#).unwrap();
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.email, None);
    }
}
