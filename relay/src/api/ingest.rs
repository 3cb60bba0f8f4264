//! `POST …/ingest`: validates a notification payload and stores it.

use crate::api::utils::json_response;
use crate::auth::Caller;
use crate::errors::RelayError;
use crate::handler::{Handler, HandlerBody};
use crate::model::IngestRequest;
use crate::store::NotificationStore;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;

pub struct IngestHandler {
    store: NotificationStore,
}

impl IngestHandler {
    pub fn new(store: NotificationStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for IngestHandler {
    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn handle(
        &self,
        request: Request<Bytes>,
        caller: &Caller,
    ) -> Result<Response<HandlerBody>, RelayError> {
        let payload = parse_ingest_request(request.body())?;
        let receipt = self.store.ingest(payload)?;

        tracing::info!(
            notification_id = %receipt.notification_id,
            target = ?receipt.target_users,
            caller = %caller.user,
            "notification ingested"
        );

        json_response(StatusCode::OK, &receipt)
    }
}

/// Parses an ingest body.
///
/// Bodies that are not JSON and bodies without a `message` member get their own
/// errors; anything else that does not fit [`IngestRequest`] is reported with
/// the deserializer's message.
pub fn parse_ingest_request(body: &[u8]) -> Result<IngestRequest, RelayError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| RelayError::InvalidJson)?;

    match value.get("message") {
        None => return Err(RelayError::MissingMessage),
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(RelayError::InvalidPayload(
                "'message' must be a string".to_string(),
            ));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| RelayError::InvalidPayload(format!("Invalid notification payload: {e}")))
}
