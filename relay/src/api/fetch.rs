use crate::api::utils::json_response;
use crate::auth::Caller;
use crate::errors::RelayError;
use crate::handler::{Handler, HandlerBody};
use crate::model::FetchResponse;
use crate::store::NotificationStore;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};

/// `GET …/notifications`: hands the caller everything pending for them.
/// The read is destructive; a second call returns only what arrived since.
pub struct FetchHandler {
    store: NotificationStore,
}

impl FetchHandler {
    pub fn new(store: NotificationStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for FetchHandler {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn handle(
        &self,
        _request: Request<Bytes>,
        caller: &Caller,
    ) -> Result<Response<HandlerBody>, RelayError> {
        let notifications = self.store.fetch(&caller.user);
        if !notifications.is_empty() {
            tracing::debug!(
                caller = %caller.user,
                count = notifications.len(),
                "delivering notifications"
            );
        }

        json_response(StatusCode::OK, &FetchResponse { notifications })
    }
}
