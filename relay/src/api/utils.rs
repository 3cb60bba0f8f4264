use crate::errors::RelayError;
use crate::handler::HandlerBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Serializes a value to a JSON body.
pub fn serialize_to_body<T: Serialize>(value: &T) -> Result<HandlerBody, RelayError> {
    let bytes = serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| RelayError::ResponseSerializationError(e.to_string()))?;
    Ok(Full::new(bytes).boxed())
}

/// Builds a JSON response with the given status.
pub fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<HandlerBody>, RelayError> {
    let mut response = Response::new(serialize_to_body(value)?);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
