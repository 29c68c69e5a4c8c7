// src/pipeline/http.rs
use crate::Error as CrateError;
use snafu::Snafu;

/// Errors produced by a target call.
///
/// Every variant is a per-item failure: the consumer converts it into a
/// [`FailureDetail`](super::FailureDetail) and moves on to the next item.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    /// The request never got a response (connection refused, reset, DNS).
    #[snafu(display("HTTP transport error: {}", source))]
    Transport { source: CrateError },

    /// The client refused to build the request, such as for a non-HTTP endpoint scheme.
    #[snafu(display("Invalid HTTP request: {}", details))]
    InvalidRequest { details: String },

    /// The target answered with anything other than 200.
    #[snafu(display("HTTP server error response (status {}): {}", status, body))]
    ServerError { status: u16, body: String },

    /// No response arrived within the request timeout.
    #[snafu(display("HTTP request timed out"))]
    Timeout,

    /// A 200 response whose body was not valid JSON.
    #[snafu(display("Failed to decode response body: {}", details))]
    Decode { details: String },

    /// Other, unspecified HTTP client errors.
    #[snafu(display("Generic HTTP client error: {}", source))]
    ClientError { source: CrateError },
}

impl HttpError {
    /// HTTP status carried by the error, if the target responded at all.
    pub const fn status(&self) -> Option<u16> {
        match self {
            HttpError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
