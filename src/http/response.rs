//! Response helpers.
//!
//! Both services answer with small JSON documents of the form
//! `{"message": "..."}`; mapped breaker outcomes use the same shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resilience::MappedOutcome;

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// `(status, {"message": message})`
pub fn message(status: StatusCode, message: &'static str) -> Response {
    (status, Json(Message { message })).into_response()
}

impl IntoResponse for MappedOutcome {
    fn into_response(self) -> Response {
        message(self.status, self.message)
    }
}
