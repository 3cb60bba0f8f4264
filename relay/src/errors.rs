use crate::config::ValidationError;
use crate::handler::HandlerBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Errors that can occur while serving relay requests
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Invalid JSON payload")]
    InvalidJson,

    #[error("Missing 'message' field")]
    MissingMessage,

    #[error("{0}")]
    InvalidPayload(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Forbidden")]
    Unauthenticated,

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Response serialization error: {0}")]
    ResponseSerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidJson
            | RelayError::MissingMessage
            | RelayError::InvalidPayload(_)
            | RelayError::RequestBodyError(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Unauthenticated => StatusCode::FORBIDDEN,
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::ResponseSerializationError(_)
            | RelayError::InternalError(_)
            | RelayError::Io(_)
            | RelayError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used to tag rejected-request metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RelayError::InvalidJson
            | RelayError::MissingMessage
            | RelayError::InvalidPayload(_)
            | RelayError::RequestBodyError(_) => "malformed",
            RelayError::PayloadTooLarge(_) => "too_large",
            RelayError::Unauthenticated => "unauthenticated",
            RelayError::NotFound | RelayError::MethodNotAllowed => "no_route",
            _ => "internal",
        }
    }

    /// Renders the error as `{"error": "<message>"}` with the matching status.
    pub fn into_response(self) -> Response<HandlerBody> {
        let body = serde_json::to_vec(&ErrorBody {
            error: self.to_string(),
        })
        .unwrap_or_else(|_| br#"{"error": "internal error"}"#.to_vec());

        let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
