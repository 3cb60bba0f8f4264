use crate::auth::Caller;
use crate::errors::RelayError;
use async_trait::async_trait;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Request, Response};
use std::convert::Infallible;

pub type HandlerBody = BoxBody<Bytes, Infallible>;

/// Endpoint logic behind one route.
///
/// Requests reach a handler only after routing and access gating succeeded,
/// with the body already collected.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        request: Request<Bytes>,
        caller: &Caller,
    ) -> Result<Response<HandlerBody>, RelayError>;
}
