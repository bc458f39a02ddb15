//! Registry configuration
//!
//! Deserialized from the `registry` section of the server configuration.

use std::time::Duration;

use serde::Deserialize;
use url::Url;
use wayfinder_common::{BACKEND_MEMORY, DEFAULT_KEY_PREFIX, RegistryError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Backend selector: `memory` or `redis`
    pub backend: String,
    /// Period of the expiry sweep for the memory backend; 0 disables it
    pub sweep_interval_secs: u64,
    /// Deadline applied to every registry call; 0 means none
    pub request_timeout_ms: u64,
    pub redis: RedisConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BACKEND_MEMORY.to_string(),
            sweep_interval_secs: 5,
            request_timeout_ms: 0,
            redis: RedisConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Interval of the periodic sweep for the selected backend, if any
    pub fn sweep_interval(&self) -> Option<Duration> {
        let secs = if self.backend.eq_ignore_ascii_case(BACKEND_MEMORY) {
            self.sweep_interval_secs
        } else {
            self.redis.cleanup_interval_secs
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Full connection URL; takes precedence over the discrete fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub key_prefix: String,
    pub pool_size: usize,
    pub command_timeout_ms: u64,
    /// Period of the proactive membership cleanup; 0 relies on lazy cleanup only
    pub cleanup_interval_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            pool_size: 16,
            command_timeout_ms: 3000,
            cleanup_interval_secs: 0,
        }
    }
}

impl RedisConfig {
    /// Connection URL, with credentials percent-encoded into the userinfo
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))
            .map_err(|e| RegistryError::Misconfiguration(format!("invalid redis address: {}", e)))?;
        let credentials = match &self.username {
            Some(user) => url.set_username(user),
            None => Ok(()),
        }
        .and_then(|_| url.set_password(self.password.as_deref()));
        credentials.map_err(|_| {
            RegistryError::Misconfiguration("redis credentials cannot be set on this address".to_string())
        })?;
        Ok(url.into())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.max(1))
    }
}
