use std::time::Duration;

use serde::Deserialize;

use crate::client::transport::RetryPolicy;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub realtime: RealtimeSettings,
}

/// Where the server binds and the secret used to verify bearer tokens.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
}

/// Client-side timing knobs: reconnection backoff and typing emission.
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    pub max_retry_attempts: u32,
    pub typing_debounce_ms: u64,
    pub typing_idle_ms: u64,
}

impl RealtimeSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(self.retry_base_ms),
            cap: Duration::from_millis(self.retry_cap_ms),
            max_attempts: self.max_retry_attempts,
        }
    }

    pub fn typing_debounce(&self) -> Duration {
        Duration::from_millis(self.typing_debounce_ms)
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }
}

/// Partial configuration loaded from files or environment. Missing values
/// fall back to defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub realtime: Option<PartialRealtimeSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRealtimeSettings {
    pub retry_base_ms: Option<u64>,
    pub retry_cap_ms: Option<u64>,
    pub max_retry_attempts: Option<u32>,
    pub typing_debounce_ms: Option<u64>,
    pub typing_idle_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                jwt_secret: "change_me".to_string(),
            },
            realtime: RealtimeSettings {
                retry_base_ms: 1000,
                retry_cap_ms: 30_000,
                max_retry_attempts: 5,
                typing_debounce_ms: 300,
                typing_idle_ms: 3000,
            },
        }
    }
}
