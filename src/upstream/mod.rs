//! Upstream (green) access from the downstream service.

pub mod client;

pub use client::{TransportError, UpstreamClient, UpstreamResponse};
