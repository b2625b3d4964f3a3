//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Returns every error found, not
//! just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }

    if config.upstream.url.trim().is_empty() {
        errors.push(ValidationError::new("upstream.url", "must be set"));
    }
    if config.upstream.max_concurrent_calls == 0 {
        errors.push(ValidationError::new("upstream.max_concurrent_calls", "must be > 0"));
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be > 0"));
    }
    if config.upstream.submit_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.submit_timeout_secs", "must be > 0"));
    }
    if config.upstream.max_response_bytes == 0 {
        errors.push(ValidationError::new("upstream.max_response_bytes", "must be > 0"));
    }

    if config.nonce.sync_interval_secs == 0 {
        errors.push(ValidationError::new("nonce.sync_interval_secs", "must be > 0"));
    }
    if config.nonce.stuck_poll_threshold == 0 {
        errors.push(ValidationError::new("nonce.stuck_poll_threshold", "must be > 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
