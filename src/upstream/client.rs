//! HTTP client for the upstream API.
//!
//! # Responsibilities
//! - Bound outstanding calls with an admission semaphore
//! - Attach bearer authentication
//! - Enforce a per-call deadline covering the whole exchange, body included
//! - Tee streamed bodies to the caller while buffering JSON for inspection

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::blockchain::LedgerName;
use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::envelope::{is_json_content_type, UpstreamEnvelope};
use crate::upstream::request::{Deadline, QueryParams, UpstreamRequest};
use crate::upstream::stream::{Delivery, ResponseHead, ResponseSink};
use crate::upstream::{UpstreamError, UpstreamResult};
use axum::body::Bytes;
use axum::http::StatusCode;

/// Client for the upstream API, bound to the proxy's account.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    account: String,
    admission: Arc<Semaphore>,
    short_timeout: Duration,
    submit_timeout: Duration,
    max_response_bytes: usize,
}

impl UpstreamClient {
    /// Create a client calling on behalf of `account`.
    pub fn new(config: &UpstreamConfig, account: impl Into<String>) -> UpstreamResult<Self> {
        let base_url = normalize_base_url(&config.url)?;

        // Upstream load balancers misbehave with reused connections.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let api_key = Some(config.api_key.trim().to_string()).filter(|k| !k.is_empty());

        Ok(Self {
            http,
            base_url,
            api_key,
            account: account.into(),
            admission: Arc::new(Semaphore::new(config.max_concurrent_calls)),
            short_timeout: Duration::from_secs(config.timeout_secs),
            submit_timeout: Duration::from_secs(config.submit_timeout_secs),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Account the proxy signs for.
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Free admission slots.
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    fn deadline_for(&self, request: &UpstreamRequest) -> Duration {
        request.timeout.unwrap_or(match request.deadline {
            Deadline::Short => self.short_timeout,
            Deadline::Submit => self.submit_timeout,
        })
    }

    /// Issue one call.
    ///
    /// Waits for an admission slot, then runs the exchange under the call's
    /// deadline. The slot is released when this returns or is dropped. On
    /// failure or expiry a partially streamed body is aborted.
    pub async fn call(
        &self,
        request: UpstreamRequest,
        mut delivery: Delivery,
    ) -> UpstreamResult<UpstreamEnvelope> {
        let _permit = self
            .admission
            .acquire()
            .await
            .map_err(|_| UpstreamError::Closed)?;

        let deadline = self.deadline_for(&request);
        let target = request.target();
        let abort = match &mut delivery {
            Delivery::Stream(sink) => Some(sink.abort_handle()),
            Delivery::Buffer => None,
        };

        tracing::debug!(method = %request.method, target = %target, ?deadline, "Upstream call");

        let outcome = timeout(deadline, self.exchange(request, delivery))
            .await
            .unwrap_or_else(|_| Err(UpstreamError::Timeout(deadline)));

        if let (Err(e), Some(abort)) = (&outcome, abort) {
            abort.abort(&e.to_string());
        }

        match &outcome {
            Ok(envelope) => {
                metrics::record_upstream_call("ok");
                if envelope.has_errors() {
                    tracing::warn!(target = %target, error = %envelope.describe(), "API error");
                }
            }
            Err(e) => {
                metrics::record_upstream_call(e.kind());
                tracing::warn!(target = %target, error = %e, "Upstream call failed");
            }
        }

        outcome
    }

    async fn exchange(
        &self,
        request: UpstreamRequest,
        delivery: Delivery,
    ) -> UpstreamResult<UpstreamEnvelope> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        if !request.query.is_empty() {
            url.set_query(Some(&request.query.encode()));
        }

        let mut builder = self.http.request(request.method, url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(ct) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match delivery {
            Delivery::Buffer => self.buffer(response, status, content_type).await,
            Delivery::Stream(sink) => self.tee(response, status, content_type, sink).await,
        }
    }

    async fn buffer(
        &self,
        response: reqwest::Response,
        status: StatusCode,
        content_type: Option<String>,
    ) -> UpstreamResult<UpstreamEnvelope> {
        let mut body = response.bytes_stream();
        let mut raw = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| UpstreamError::Transport(e.to_string()))?;
            if raw.len() + chunk.len() > self.max_response_bytes {
                return Err(UpstreamError::ResponseTooLarge {
                    limit: self.max_response_bytes,
                });
            }
            raw.extend_from_slice(&chunk);
        }

        let raw = Bytes::from(raw);
        if is_json_content_type(content_type.as_deref()) {
            Ok(UpstreamEnvelope::decode(status, content_type, raw))
        } else {
            tracing::debug!(content_type = ?content_type, "Non-JSON upstream response");
            Ok(UpstreamEnvelope::opaque(status, content_type, raw))
        }
    }

    async fn tee(
        &self,
        response: reqwest::Response,
        status: StatusCode,
        content_type: Option<String>,
        mut sink: ResponseSink,
    ) -> UpstreamResult<UpstreamEnvelope> {
        sink.send_head(ResponseHead {
            status,
            content_type: content_type.clone(),
        });

        let inspect = is_json_content_type(content_type.as_deref());
        if !inspect {
            tracing::debug!(content_type = ?content_type, "Non-JSON upstream response");
        }

        let mut body = response.bytes_stream();
        let mut raw = Vec::new();
        let mut overflowed = false;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| UpstreamError::Transport(e.to_string()))?;

            if inspect && !overflowed {
                if raw.len() + chunk.len() > self.max_response_bytes {
                    tracing::debug!(limit = self.max_response_bytes, "Skipping inspection of large response");
                    overflowed = true;
                    raw = Vec::new();
                } else {
                    raw.extend_from_slice(&chunk);
                }
            }

            if !sink.send_chunk(chunk).await && (!inspect || overflowed) {
                break;
            }
        }

        if inspect && !overflowed {
            Ok(UpstreamEnvelope::decode(status, content_type, Bytes::from(raw)))
        } else {
            Ok(UpstreamEnvelope::opaque(status, content_type, Bytes::new()))
        }
    }

    /// Mined nonce of the proxy's account on `ledger`.
    pub async fn nonce(&self, ledger: LedgerName) -> UpstreamResult<u64> {
        let request = UpstreamRequest::get("/nonce").query(
            QueryParams::new()
                .with("account", self.account.as_str())
                .with("chain", ledger.as_str()),
        );
        self.call(request, Delivery::Buffer).await?.into_result()
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .field("account", &self.account)
            .field("available_slots", &self.available_slots())
            .finish_non_exhaustive()
    }
}

/// Trim trailing slashes and default the scheme to https.
fn normalize_base_url(raw: &str) -> UpstreamResult<String> {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        return Err(UpstreamError::InvalidUrl("empty upstream url".to_string()));
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    url::Url::parse(&with_scheme).map_err(|e| UpstreamError::InvalidUrl(format!("{with_scheme}: {e}")))?;
    Ok(with_scheme)
}
