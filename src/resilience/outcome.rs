//! Outcome mapping.
//!
//! Turns a classified call, or the breaker's refusal to make one, into the
//! status, message and log severity the downstream answers with. Pure: the
//! same input always maps to the same output.

use axum::http::StatusCode;

use crate::resilience::caller::CallOutcome;
use crate::resilience::circuit_breaker::BreakerRejection;

/// Level at which a mapped outcome is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Caller-visible answer for one protected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedOutcome {
    pub status: StatusCode,
    pub message: &'static str,
    pub severity: Severity,
}

impl MappedOutcome {
    const fn new(status: StatusCode, message: &'static str, severity: Severity) -> Self {
        Self {
            status,
            message,
            severity,
        }
    }
}

pub fn map_outcome(result: &Result<CallOutcome, BreakerRejection>) -> MappedOutcome {
    match result {
        Ok(CallOutcome::Ok(_)) => MappedOutcome::new(StatusCode::OK, "OK", Severity::Info),
        Ok(CallOutcome::SlowOk(_)) => MappedOutcome::new(StatusCode::OK, "OK", Severity::Warn),
        Ok(CallOutcome::UpstreamGone) => MappedOutcome::new(
            StatusCode::TOO_MANY_REQUESTS,
            "upstream still overloaded",
            Severity::Error,
        ),
        Ok(CallOutcome::TransportError(_)) => MappedOutcome::new(
            StatusCode::BAD_REQUEST,
            "upstream has a problem",
            Severity::Error,
        ),
        Err(BreakerRejection::TooManyRequests) => MappedOutcome::new(
            StatusCode::TOO_MANY_REQUESTS,
            "don't overload upstream",
            Severity::Error,
        ),
        Err(BreakerRejection::Open) => MappedOutcome::new(
            StatusCode::FORBIDDEN,
            "upstream about to degrade further",
            Severity::Error,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::TransportError;
    use axum::body::Bytes;

    #[test]
    fn test_mapping_table() {
        let cases = [
            (Ok(CallOutcome::Ok(Bytes::new())), StatusCode::OK, Severity::Info),
            (Ok(CallOutcome::SlowOk(Bytes::new())), StatusCode::OK, Severity::Warn),
            (Ok(CallOutcome::UpstreamGone), StatusCode::TOO_MANY_REQUESTS, Severity::Error),
            (
                Ok(CallOutcome::TransportError(TransportError::Request("refused".into()))),
                StatusCode::BAD_REQUEST,
                Severity::Error,
            ),
            (Err(BreakerRejection::TooManyRequests), StatusCode::TOO_MANY_REQUESTS, Severity::Error),
            (Err(BreakerRejection::Open), StatusCode::FORBIDDEN, Severity::Error),
        ];

        for (input, status, severity) in cases {
            let mapped = map_outcome(&input);
            assert_eq!(mapped.status, status, "{:?}", input);
            assert_eq!(mapped.severity, severity, "{:?}", input);
        }
    }

    #[test]
    fn test_refusal_and_half_open_are_distinguishable() {
        let gone = map_outcome(&Ok(CallOutcome::UpstreamGone));
        let busy = map_outcome(&Err(BreakerRejection::TooManyRequests));
        assert_eq!(gone.status, busy.status);
        assert_ne!(gone.message, busy.message);
    }

    #[test]
    fn test_mapping_is_pure() {
        let inputs = [
            Ok(CallOutcome::SlowOk(Bytes::from_static(b"x"))),
            Ok(CallOutcome::TransportError(TransportError::Timeout(
                std::time::Duration::from_secs(2),
            ))),
            Err(BreakerRejection::Open),
        ];
        for input in &inputs {
            assert_eq!(map_outcome(input), map_outcome(input));
        }
    }
}
