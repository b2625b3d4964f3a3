//! Caller-visible failures.
//!
//! Every internal failure becomes a 503 with the upstream API's own error
//! envelope shape, so callers parse proxy and API errors the same way.

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::SigningError;
use crate::upstream::{UpstreamEnvelope, UpstreamError};

/// Body of a failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub errors: Vec<String>,
}

/// Errors that fail an inbound request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Caller must set valid chain parameter")]
    InvalidChain(Option<String>),

    #[error("could not read request body: {0}")]
    Body(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("could not decode unsigned transactions: {0}")]
    UnsignedTransactions(String),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        let body = ErrorBody {
            status: "FAIL",
            errors: vec![self.to_string()],
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Replay a buffered upstream response verbatim.
pub fn forward(envelope: UpstreamEnvelope) -> Response {
    let mut response = Body::from(Bytes::clone(&envelope.raw)).into_response();
    *response.status_mut() = envelope.status_code;
    if let Some(ct) = envelope
        .content_type
        .as_deref()
        .and_then(|ct| header::HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    response
}
