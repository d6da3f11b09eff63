//! Error types for the deployment client, and the classifier that turns
//! failed HTTP responses into them.
//!
//! # Design
//! `Error` is a closed enum so callers match on the failure kind instead of
//! downcasting. Server rejections keep whatever diagnostic detail the server
//! put in its JSON envelope. Decoding that envelope never fails harder than
//! the original failure: an unreadable body yields an error with the status
//! code recorded and everything else empty.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::context::Cancelled;
use crate::http::HttpResponse;

/// Every failure a client operation can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Response(ResponseError),

    #[error(transparent)]
    InvalidResource(InvalidResource),
}

/// Client construction failures. Raised before any network use.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url {0:?} cannot carry a path")]
    NotABaseUrl(String),

    #[error("base url {0:?} must not carry a query or fragment")]
    QueryOrFragment(String),

    #[error("invalid timeout {0:?}, expected milliseconds")]
    InvalidTimeout(String),

    #[error("failed to build http transport: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Transport-level failures, raised before any status-code branching.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Failure reported by a custom `Transport`.
    #[error("{0}")]
    Other(String),
}

/// The server rejected the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseError {
    pub status_code: u16,
    pub message: String,
    /// Server-defined error code.
    pub code: i64,
}

/// The server rejected the submitted resource; `failed_fields` lists the
/// offending fields in the order the server reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidResource {
    pub response: ResponseError,
    pub failed_fields: Vec<String>,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode={}, Message={}", self.status_code, self.message)
    }
}

impl std::error::Error for ResponseError {}

impl fmt::Display for InvalidResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatusCode={}, Message={}, FailedFields=[{}]",
            self.response.status_code,
            self.response.message,
            self.failed_fields.join(" ")
        )
    }
}

impl std::error::Error for InvalidResource {}

/// JSON error body returned by the remote service.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    extras: Option<HashMap<String, Vec<String>>>,
}

const FAILED_FIELDS: &str = "failed_fields";

fn decode_envelope(response: &HttpResponse) -> Option<Envelope> {
    match serde_json::from_str(&response.body) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            debug!(
                "undecodable error body for status {}: {}",
                response.status, e
            );
            None
        }
    }
}

impl ResponseError {
    /// Classify any failed response as a generic rejection.
    pub fn from_response(response: &HttpResponse) -> Self {
        let envelope = decode_envelope(response).unwrap_or_default();
        Self {
            status_code: response.status,
            message: envelope.message,
            code: envelope.code,
        }
    }
}

impl InvalidResource {
    /// Classify a 400 response as a field-validation failure.
    pub fn from_bad_request(response: &HttpResponse) -> Self {
        let envelope = decode_envelope(response).unwrap_or_default();
        let failed_fields = envelope
            .extras
            .and_then(|mut extras| extras.remove(FAILED_FIELDS))
            .unwrap_or_default();
        Self {
            response: ResponseError {
                status_code: response.status,
                message: envelope.message,
                code: envelope.code,
            },
            failed_fields,
        }
    }
}

impl From<ResponseError> for Error {
    fn from(err: ResponseError) -> Self {
        Error::Response(err)
    }
}

impl From<InvalidResource> for Error {
    fn from(err: InvalidResource) -> Self {
        Error::InvalidResource(err)
    }
}

impl From<Cancelled> for Error {
    fn from(cause: Cancelled) -> Self {
        Error::Network(NetworkError::Cancelled(cause))
    }
}

impl Error {
    /// Status code of a server rejection, if this is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Response(e) => Some(e.status_code),
            Error::InvalidResource(e) => Some(e.response.status_code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }

    /// True when the request was abandoned because its context ended.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Network(NetworkError::Cancelled(_)))
    }

    pub fn failed_fields(&self) -> Option<&[String]> {
        match self {
            Error::InvalidResource(e) => Some(&e.failed_fields),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn bad_request_keeps_failed_field_order() {
        let resp = response(
            400,
            r#"{"message":"invalid deployment","code":1001,"extras":{"failed_fields":["id","replicas","image","ports"]}}"#,
        );
        let err = InvalidResource::from_bad_request(&resp);
        assert_eq!(err.response.status_code, 400);
        assert_eq!(err.response.message, "invalid deployment");
        assert_eq!(err.response.code, 1001);
        assert_eq!(err.failed_fields, vec!["id", "replicas", "image", "ports"]);
    }

    #[test]
    fn bad_request_without_extras_has_no_fields() {
        let resp = response(400, r#"{"message":"malformed body","code":1000}"#);
        let err = InvalidResource::from_bad_request(&resp);
        assert!(err.failed_fields.is_empty());
        assert_eq!(err.response.message, "malformed body");
    }

    #[test]
    fn bad_request_ignores_unrelated_extras() {
        let resp = response(400, r#"{"message":"x","code":1,"extras":{"hints":["a"]}}"#);
        let err = InvalidResource::from_bad_request(&resp);
        assert!(err.failed_fields.is_empty());
    }

    #[test]
    fn undecodable_body_yields_zero_valued_error_with_status() {
        let err = ResponseError::from_response(&response(502, "<html>bad gateway</html>"));
        assert_eq!(
            err,
            ResponseError {
                status_code: 502,
                message: String::new(),
                code: 0,
            }
        );

        let err = InvalidResource::from_bad_request(&response(400, ""));
        assert_eq!(err.response.status_code, 400);
        assert!(err.failed_fields.is_empty());
    }

    #[test]
    fn generic_rejection_drops_field_detail() {
        let resp = response(
            409,
            r#"{"message":"already exists","code":1002,"extras":{"failed_fields":["id"]}}"#,
        );
        let err = ResponseError::from_response(&resp);
        assert_eq!(err.status_code, 409);
        assert_eq!(err.message, "already exists");
        assert_eq!(err.code, 1002);
    }

    #[test]
    fn display_formats() {
        let err = ResponseError {
            status_code: 404,
            message: "not found".to_string(),
            code: 0,
        };
        assert_eq!(err.to_string(), "StatusCode=404, Message=not found");
        assert_eq!(
            Error::from(err).to_string(),
            "StatusCode=404, Message=not found"
        );

        let err = InvalidResource {
            response: ResponseError {
                status_code: 400,
                message: "invalid".to_string(),
                code: 1,
            },
            failed_fields: vec!["image".to_string(), "ports".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "StatusCode=400, Message=invalid, FailedFields=[image ports]"
        );
    }

    #[test]
    fn accessors() {
        let not_found = Error::from(ResponseError {
            status_code: 404,
            ..Default::default()
        });
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());
        assert!(not_found.failed_fields().is_none());

        let invalid = Error::from(InvalidResource {
            response: ResponseError {
                status_code: 400,
                ..Default::default()
            },
            failed_fields: vec!["replicas".to_string()],
        });
        assert_eq!(invalid.status_code(), Some(400));
        assert_eq!(invalid.failed_fields(), Some(&["replicas".to_string()][..]));

        let cancelled = Error::from(Cancelled::DeadlineExceeded);
        assert!(cancelled.is_cancelled());
        assert!(cancelled.status_code().is_none());
        assert_eq!(
            cancelled.to_string(),
            "network error: context deadline exceeded"
        );
    }
}
