// src/utils/context.rs
//! Per-request logging context.

use axum::http::HeaderMap;
use uuid::Uuid;

/// Header carrying a caller supplied correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Context threaded through every service call made on behalf of one
/// inbound request. Log lines emitted for the request carry its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
}

impl RequestContext {
    /// Creates a context with a fresh correlation id.
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Uses the `X-Correlation-Id` header when present and non-empty.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|id| Self {
                correlation_id: id.to_string(),
            })
            .unwrap_or_default()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_id_is_reused() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_HEADER, "abc-123".parse().unwrap());
        assert_eq!(RequestContext::from_headers(&headers).correlation_id, "abc-123");
    }

    #[test]
    fn test_blank_header_generates_id() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_HEADER, "  ".parse().unwrap());
        let ctx = RequestContext::from_headers(&headers);
        assert!(Uuid::parse_str(&ctx.correlation_id).is_ok());
    }
}
