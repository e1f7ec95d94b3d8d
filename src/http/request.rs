//! Request identification and per-request spans.
//!
//! # Responsibilities
//! - Generate a UUID v4 `x-request-id` when the client sent none
//! - Echo the ID back on the response
//! - Open a span per request carrying service identity and the ID
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The ID is forwarded to the upstream on protected calls

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

use crate::config::ServiceConfig;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Builds the per-request span for `TraceLayer`.
#[derive(Debug, Clone)]
pub struct RequestSpan {
    service: Arc<str>,
    environment: Arc<str>,
}

impl RequestSpan {
    pub fn new(service: &ServiceConfig) -> Self {
        Self {
            service: Arc::from(service.name.as_str()),
            environment: Arc::from(service.environment.as_str()),
        }
    }
}

impl tower_http::trace::MakeSpan<Body> for RequestSpan {
    fn make_span(&mut self, request: &Request<Body>) -> Span {
        tracing::info_span!(
            "request",
            service = %self.service,
            environment = %self.environment,
            method = %request.method(),
            path = %request.uri().path(),
            request_id = request_id(request.headers()).unwrap_or("unknown"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_uuids() {
        let request = Request::builder().body(()).unwrap();
        let mut maker = MakeRequestUuid;
        let id = maker.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());

        let other = maker.make_request_id(&request).unwrap();
        assert_ne!(id.header_value(), other.header_value());
    }

    #[test]
    fn test_request_id_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), None);
        headers.insert(request_id_header(), HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), Some("abc-123"));
    }
}
