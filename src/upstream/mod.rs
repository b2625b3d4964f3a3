//! Upstream API subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamRequest (request.rs)
//!     → client.rs (admission slot, bearer auth, deadline)
//!     → Delivery::Buffer: body read fully → envelope.rs
//!     → Delivery::Stream: stream.rs tees body to the caller → envelope.rs
//! ```
//!
//! # Design Decisions
//! - At most `max_concurrent_calls` calls in flight; slots always released
//! - Every call has a deadline; timed-out streams are aborted, not truncated
//! - Status code and raw bytes are kept even when JSON decoding fails

pub mod client;
pub mod envelope;
pub mod request;
pub mod stream;

use std::time::Duration;
use thiserror::Error;

pub use client::UpstreamClient;
pub use envelope::UpstreamEnvelope;
pub use request::{Deadline, QueryParams, UpstreamRequest};
pub use stream::{response_channel, Delivery, PendingResponse, ResponseHead, ResponseSink};

/// Errors from calls to the upstream API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// Well-formed response reporting failure.
    #[error("upstream API error: {message}")]
    Api { status: u16, message: String },

    #[error("undecodable upstream response: {0}")]
    Decode(String),

    #[error("could not encode upstream request: {0}")]
    Encode(String),

    #[error("upstream client is shut down")]
    Closed,
}

impl UpstreamError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::InvalidUrl(_) => "invalid_url",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::ResponseTooLarge { .. } => "too_large",
            UpstreamError::Api { .. } => "api",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::Encode(_) => "encode",
            UpstreamError::Closed => "closed",
        }
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;
