use crate::auth::Gate;
use crate::config::Config;
use crate::errors::RelayError;
use crate::handler::{Handler, HandlerBody};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_REJECTED};
use crate::router::Router;
use crate::store::NotificationStore;
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::{counter, histogram};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

struct RelayState {
    router: Router,
    gate: Gate,
    max_body_bytes: usize,
}

/// The relay API. One instance per connection, carrying the peer address.
#[derive(Clone)]
pub struct RelayService {
    state: Arc<RelayState>,
    peer: Option<SocketAddr>,
}

impl RelayService {
    pub fn new(config: &Config, store: NotificationStore) -> Self {
        RelayService {
            state: Arc::new(RelayState {
                router: Router::new(&config.base_path, store),
                gate: Gate::new(&config.auth),
                max_body_bytes: config.max_body_bytes,
            }),
            peer: None,
        }
    }

    /// A copy of this service bound to the connection from `peer`.
    pub fn for_peer(&self, peer: SocketAddr) -> Self {
        RelayService {
            state: self.state.clone(),
            peer: Some(peer),
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.state.router.paths()
    }

    /// Routes, authenticates and dispatches one request. Errors are rendered
    /// as JSON responses, so this never fails.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<HandlerBody>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (endpoint, result) = match self.state.router.find(&method, &path) {
            Ok(handler) => (handler.name(), self.dispatch(request, handler).await),
            Err(e) => ("unknown", Err(e)),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::error!(method = %method, path = %path, error = %e, "request failed");
                } else {
                    tracing::warn!(method = %method, path = %path, error = %e, "request rejected");
                }
                counter!(REQUESTS_REJECTED, "reason" => e.reason()).increment(1);
                e.into_response()
            }
        };

        tracing::debug!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            "handled request"
        );
        histogram!(
            REQUEST_DURATION,
            "endpoint" => endpoint,
            "status" => response.status().as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(
        &self,
        request: Request<B>,
        handler: Arc<dyn Handler>,
    ) -> Result<Response<HandlerBody>, RelayError>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let peer = self
            .peer
            .ok_or_else(|| RelayError::InternalError("connection peer address unknown".into()))?;
        let caller = self
            .state
            .gate
            .authenticate(request.uri(), request.headers(), peer)?;
        tracing::debug!(
            endpoint = handler.name(),
            caller = %caller.user,
            loopback = caller.loopback,
            "request authenticated"
        );

        let (parts, body) = request.into_parts();
        let bytes = collect_body(body, self.state.max_body_bytes).await?;

        handler
            .handle(Request::from_parts(parts, bytes), &caller)
            .await
    }
}

async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, RelayError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => {
            Err(RelayError::PayloadTooLarge(limit))
        }
        Err(e) => Err(RelayError::RequestBodyError(e.to_string())),
    }
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<HandlerBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
