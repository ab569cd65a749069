//! Global configuration types for testhook.
//!
//! `GlobalConfig` represents the top-level `testhook.toml`. Every field has a
//! default, so an empty file (or no file) is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Idle period after which an armed test webhook that was never called is removed.
pub const TEST_WEBHOOK_TIMEOUT_MS: u64 = 120_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix test webhooks are served under.
    #[serde(default = "default_test_path_prefix")]
    pub test_path_prefix: String,
    /// Public base URL, if the server sits behind a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5678
}

fn default_test_path_prefix() -> String {
    "webhook-test".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            test_path_prefix: default_test_path_prefix(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// Base URL test webhooks are reachable under.
    pub fn webhook_test_base_url(&self) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port));
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.test_path_prefix.trim_matches('/')
        )
    }
}

/// Test-webhook registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_timeout_ms")]
    pub test_webhook_timeout_ms: u64,
    /// Capacity of the push broadcast channel.
    #[serde(default = "default_push_capacity")]
    pub push_capacity: usize,
}

fn default_timeout_ms() -> u64 {
    TEST_WEBHOOK_TIMEOUT_MS
}

fn default_push_capacity() -> usize {
    1024
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            test_webhook_timeout_ms: default_timeout_ms(),
            push_capacity: default_push_capacity(),
        }
    }
}

impl RegistryConfig {
    pub fn test_webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.test_webhook_timeout_ms)
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
    /// Export spans through OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}
