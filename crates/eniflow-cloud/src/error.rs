//! Provider error type

use serde::Deserialize;
use thiserror::Error;

/// Code used for failures raised on the client side before a response
/// was received (connection reset, read timeout, ...).
pub const TRANSPORT_ERROR_CODE: &str = "Transport";

/// Code used when the provider answered with a body we could not decode.
pub const UNDECODABLE_RESPONSE_CODE: &str = "UndecodableResponse";

/// An error returned by a single provider call.
///
/// Carries the provider's machine-readable code verbatim. Interpretation of
/// the code is left to [`crate::classify`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Machine-readable error code (e.g. "InvalidOperation.InvalidEniState")
    pub code: String,

    /// Human-readable message returned by the provider
    pub message: String,

    /// HTTP status of the response, if one was received
    pub http_status: Option<u16>,

    /// Provider request id, for support tickets
    pub request_id: Option<String>,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            http_status: None,
            request_id: None,
        }
    }

    /// A client-side failure with no provider response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR_CODE, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Decode the provider's JSON error envelope.
    ///
    /// A body that is not a valid envelope still yields an error value so
    /// the caller never loses the original failure; the raw body becomes the
    /// message.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let err = Self::new(envelope.code, envelope.message).with_status(status);
                match envelope.request_id {
                    Some(request_id) => err.with_request_id(request_id),
                    None => err,
                }
            }
            Err(e) => {
                tracing::debug!("Failed to decode provider error body: {}", e);
                Self::new(UNDECODABLE_RESPONSE_CODE, body.trim()).with_status(status)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorEnvelope {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
