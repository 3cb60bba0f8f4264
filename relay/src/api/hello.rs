use crate::api::utils::json_response;
use crate::auth::Caller;
use crate::errors::RelayError;
use crate::handler::{Handler, HandlerBody};
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

/// Liveness check for clients; gated like the other API routes. The text is
/// the same whatever base path the API is mounted under.
pub struct HelloHandler;

const GREETING: &str = "Hello, world! This is the '/jupyterlab-notifications-extension/hello' \
                        endpoint. Try visiting me in your browser!";

#[derive(Serialize)]
struct HelloResponse {
    data: String,
}

#[async_trait]
impl Handler for HelloHandler {
    fn name(&self) -> &'static str {
        "hello"
    }

    async fn handle(
        &self,
        _request: Request<Bytes>,
        _caller: &Caller,
    ) -> Result<Response<HandlerBody>, RelayError> {
        json_response(
            StatusCode::OK,
            &HelloResponse {
                data: GREETING.to_string(),
            },
        )
    }
}
