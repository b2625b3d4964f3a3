//! Outbound request description.

use axum::body::Bytes;
use axum::http::Method;
use serde::Serialize;
use std::time::Duration;

use crate::upstream::{UpstreamError, UpstreamResult};

/// Ordered query parameters with `url.Values`-style get/set semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (already percent-encoded) query string.
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value for `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = index <= first || k != key;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    /// Set `key` only when it is absent or empty.
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) {
        if self.get(key).map_or(true, str::is_empty) {
            self.set(key, value);
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// Which of the two configured deadlines applies to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Read-only and administrative calls.
    Short,
    /// Signed submissions.
    Submit,
}

/// A single call to the upstream API.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub content_type: Option<String>,
    pub body: Option<Bytes>,
    pub deadline: Deadline,
    /// Overrides the configured duration for `deadline`.
    pub timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            content_type: None,
            body: None,
            deadline: Deadline::Short,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Raw body with the caller's content type.
    pub fn body(mut self, content_type: Option<String>, body: Bytes) -> Self {
        self.content_type = content_type;
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    pub fn json<T: Serialize>(mut self, value: &T) -> UpstreamResult<Self> {
        let body = serde_json::to_vec(value).map_err(|e| UpstreamError::Encode(e.to_string()))?;
        self.content_type = Some("application/json; charset=utf8".to_string());
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// `path?query`, for logs.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query.encode())
        }
    }
}
