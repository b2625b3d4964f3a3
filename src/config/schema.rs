//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config file.

use serde::{Deserialize, Serialize};

/// Root configuration for the signing proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API endpoint and call limits.
    pub upstream: UpstreamConfig,

    /// Signing key.
    pub signer: SignerConfig,

    /// Nonce tracking and resync.
    pub nonce: NonceConfig,

    /// Inbound request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8001".to_string(),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; "https://" is assumed when no scheme is given.
    pub url: String,

    /// Bearer token, empty for none.
    pub api_key: String,

    /// Maximum outstanding upstream calls.
    pub max_concurrent_calls: usize,

    /// Deadline for read-only and administrative calls, in seconds.
    pub timeout_secs: u64,

    /// Deadline for signed submissions, in seconds.
    pub submit_timeout_secs: u64,

    /// Cap on bytes buffered for JSON inspection.
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            max_concurrent_calls: 32,
            timeout_secs: 5,
            submit_timeout_secs: 30,
            max_response_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Signing key configuration.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SignerConfig {
    /// Hex private key. `SIGNING_PROXY_PRIVATE_KEY` takes precedence.
    pub private_key: String,
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Nonce tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NonceConfig {
    /// Background resync interval in seconds.
    pub sync_interval_secs: u64,

    /// Consecutive stuck polls before an allocation is rolled back.
    pub stuck_poll_threshold: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 20,
            stuck_poll_threshold: 3,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
