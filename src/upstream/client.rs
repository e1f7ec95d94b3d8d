//! HTTP client for the protected upstream.
//!
//! # Responsibilities
//! - Issue `GET` against the configured upstream endpoint
//! - Propagate the inbound request ID
//! - Buffer the (small) response body
//! - Report every transport problem as a typed error
//!
//! Deadlines are not applied here; the breaker-wrapped caller owns them.

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::http::request::X_REQUEST_ID;

/// Upstream bodies are tiny JSON payloads; anything larger is an error.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Transport-level failure talking to the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid upstream URI: {0}")]
    InvalidUri(String),

    #[error("upstream request failed: {0}")]
    Request(String),

    #[error("failed to read upstream body: {0}")]
    Body(String),

    #[error("upstream call exceeded deadline of {0:?}")]
    Timeout(Duration),
}

/// What came back from a completed upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Client bound to one upstream endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    uri: Uri,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, TransportError> {
        let url = config.url();
        let uri: Uri = url
            .parse()
            .map_err(|e| TransportError::InvalidUri(format!("{}: {}", url, e)))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.timeout()));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { client, uri })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Probe the upstream once.
    pub async fn get(&self, request_id: Option<&str>) -> Result<UpstreamResponse, TransportError> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(self.uri.clone())
            .header(header::USER_AGENT, "puch-red");
        if let Some(id) = request_id {
            builder = builder.header(X_REQUEST_ID, id);
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), MAX_BODY_BYTES)
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        tracing::debug!(uri = %self.uri, status = %parts.status, "Upstream responded");

        Ok(UpstreamResponse {
            status: parts.status,
            body,
        })
    }
}
