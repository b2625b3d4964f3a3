//! The upstream API's JSON response envelope.

use axum::http::StatusCode;
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::upstream::{UpstreamError, UpstreamResult};

#[derive(Debug, Default, Deserialize)]
struct EnvelopeBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Option<Box<RawValue>>,
    #[serde(default)]
    result: Option<Box<RawValue>>,
}

/// One upstream response: status code and raw bytes, plus the decoded
/// `{status, errors, result}` fields when the body was JSON.
#[derive(Debug)]
pub struct UpstreamEnvelope {
    pub status_code: StatusCode,
    pub content_type: Option<String>,
    /// Bytes buffered for inspection. Empty for streamed non-JSON bodies.
    pub raw: Bytes,
    pub status: Option<String>,
    pub errors: Option<Box<RawValue>>,
    pub result: Option<Box<RawValue>>,
    /// Set when the body claimed to be JSON but did not parse.
    pub decode_error: Option<String>,
}

impl UpstreamEnvelope {
    /// Envelope for a body that was not inspected.
    pub fn opaque(status_code: StatusCode, content_type: Option<String>, raw: Bytes) -> Self {
        Self {
            status_code,
            content_type,
            raw,
            status: None,
            errors: None,
            result: None,
            decode_error: None,
        }
    }

    /// Decode a JSON body. Decode failures are recorded, not returned.
    pub fn decode(status_code: StatusCode, content_type: Option<String>, raw: Bytes) -> Self {
        let mut envelope = Self::opaque(status_code, content_type, Bytes::new());
        match serde_json::from_slice::<EnvelopeBody>(&raw) {
            Ok(body) => {
                envelope.status = body.status;
                envelope.errors = body.errors;
                envelope.result = body.result;
            }
            Err(e) => envelope.decode_error = Some(e.to_string()),
        }
        envelope.raw = raw;
        envelope
    }

    pub fn is_json(&self) -> bool {
        is_json_content_type(self.content_type.as_deref())
    }

    /// True when `errors` is present and not `null` or `[]`.
    pub fn has_errors(&self) -> bool {
        match self.errors.as_deref().map(|e| e.get().trim()) {
            None | Some("null") => false,
            Some(errors) => errors.trim_start_matches('[').trim_start() != "]",
        }
    }

    /// Decode the `result` field.
    pub fn result<T: DeserializeOwned>(&self) -> UpstreamResult<T> {
        if let Some(e) = &self.decode_error {
            return Err(UpstreamError::Decode(format!("{}: {}", self.status_code.as_u16(), e)));
        }
        let result = self
            .result
            .as_deref()
            .ok_or_else(|| UpstreamError::Decode(format!("missing result: {}", self.describe())))?;
        serde_json::from_str(result.get())
            .map_err(|e| UpstreamError::Decode(format!("{}: {}", self.status_code.as_u16(), e)))
    }

    /// Decode `result` from a successful response, failing with the API's
    /// own error description otherwise.
    pub fn into_result<T: DeserializeOwned>(self) -> UpstreamResult<T> {
        if !self.status_code.is_success() || self.has_errors() {
            return Err(UpstreamError::Api {
                status: self.status_code.as_u16(),
                message: self.describe(),
            });
        }
        self.result()
    }

    /// One-line description for logs and error messages.
    pub fn describe(&self) -> String {
        let code = self.status_code.as_u16();
        if let Some(e) = &self.decode_error {
            return format!("{code}: {e}");
        }
        if self.has_errors() {
            if let Some(errors) = &self.errors {
                return errors.get().to_string();
            }
        }
        match &self.status {
            Some(status) if !status.is_empty() => format!("{code}: {status}"),
            _ if !self.raw.is_empty() => {
                format!("{code}: {:?}", String::from_utf8_lossy(&self.raw))
            }
            _ => format!("{code}: unknown error"),
        }
    }
}

pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(status: u16, body: &'static str) -> UpstreamEnvelope {
        UpstreamEnvelope::decode(
            StatusCode::from_u16(status).unwrap(),
            Some("application/json".into()),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_decodes_result() {
        let env = json(200, r#"{"status":"OK","result":17}"#);
        assert_eq!(env.status.as_deref(), Some("OK"));
        assert!(!env.has_errors());
        assert_eq!(env.result::<u64>().unwrap(), 17);
    }

    #[test]
    fn test_error_envelope() {
        let env = json(400, r#"{"status":"FAIL","errors":["bad bounty guid"]}"#);
        assert!(env.has_errors());
        assert_eq!(env.describe(), r#"["bad bounty guid"]"#);
        assert!(matches!(
            env.into_result::<u64>(),
            Err(UpstreamError::Api { status: 400, .. })
        ));
    }

    #[test]
    fn test_empty_errors_are_not_errors() {
        assert!(!json(200, r#"{"errors":[],"result":1}"#).has_errors());
        assert!(!json(200, r#"{"errors":null,"result":1}"#).has_errors());
        assert!(!json(200, r#"{"errors":[ ],"result":1}"#).has_errors());
    }

    #[test]
    fn test_decode_failure_keeps_raw() {
        let env = json(502, "<html>bad gateway</html>");
        assert!(env.decode_error.is_some());
        assert_eq!(env.raw.as_ref(), b"<html>bad gateway</html>");
        assert!(env.describe().starts_with("502: "));
        assert!(env.result::<u64>().is_err());
    }

    #[test]
    fn test_describe_fallbacks() {
        let env = json(500, r#"{"status":"FAIL"}"#);
        assert_eq!(env.describe(), "500: FAIL");

        let env = UpstreamEnvelope::opaque(StatusCode::BAD_GATEWAY, None, Bytes::new());
        assert_eq!(env.describe(), "502: unknown error");

        let env = UpstreamEnvelope::opaque(
            StatusCode::BAD_GATEWAY,
            Some("text/plain".into()),
            Bytes::from_static(b"down"),
        );
        assert_eq!(env.describe(), "502: \"down\"");
    }

    #[test]
    fn test_missing_result() {
        let env = json(200, r#"{"status":"OK"}"#);
        assert!(matches!(env.result::<u64>(), Err(UpstreamError::Decode(_))));
    }

    #[test]
    fn test_json_content_type() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("application/json; charset=utf-8")));
        assert!(!is_json_content_type(Some("text/html")));
        assert!(!is_json_content_type(None));
    }
}
