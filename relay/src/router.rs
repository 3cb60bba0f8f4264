use crate::api::fetch::FetchHandler;
use crate::api::hello::HelloHandler;
use crate::api::ingest::IngestHandler;
use crate::errors::RelayError;
use crate::handler::Handler;
use crate::store::NotificationStore;
use hyper::Method;
use std::sync::Arc;

/// Path segment every API route is mounted under, below the configured base path.
pub const API_NAMESPACE: &str = "jupyterlab-notifications-extension";

struct Route {
    method: Method,
    path: String,
    handler: Arc<dyn Handler>,
}

/// Router that matches incoming requests against the API routes
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
}

impl Router {
    /// Creates the relay routes below `base_path`, all backed by `store`
    pub fn new(base_path: &str, store: NotificationStore) -> Self {
        let routes = vec![
            Route {
                method: Method::GET,
                path: api_path(base_path, "hello"),
                handler: Arc::new(HelloHandler),
            },
            Route {
                method: Method::POST,
                path: api_path(base_path, "ingest"),
                handler: Arc::new(IngestHandler::new(store.clone())),
            },
            Route {
                method: Method::GET,
                path: api_path(base_path, "notifications"),
                handler: Arc::new(FetchHandler::new(store)),
            },
        ];

        Self {
            routes: Arc::new(routes),
        }
    }

    /// Finds the handler for a request.
    ///
    /// A known path requested with the wrong method is reported separately
    /// from an unknown path.
    pub fn find(&self, method: &Method, path: &str) -> Result<Arc<dyn Handler>, RelayError> {
        let path = normalize(path);
        let mut path_matched = false;

        for route in self.routes.iter().filter(|route| route.path == path) {
            path_matched = true;
            if route.method == method {
                return Ok(route.handler.clone());
            }
        }

        match path_matched {
            true => Err(RelayError::MethodNotAllowed),
            false => Err(RelayError::NotFound),
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.path.as_str())
    }
}

/// Joins the base path, the API namespace and an endpoint name.
pub fn api_path(base_path: &str, endpoint: &str) -> String {
    format!(
        "{}/{API_NAMESPACE}/{endpoint}",
        base_path.trim_end_matches('/')
    )
}

// Trailing slashes are tolerated.
fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
