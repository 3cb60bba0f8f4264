//! In-memory notification relay.
//!
//! External processes `POST` notifications to the ingest endpoint; a browser
//! client polls the fetch endpoint, which hands out and forgets everything
//! pending for the caller.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod model;
pub mod router;
pub mod service;
pub mod store;

pub use errors::RelayError;
pub use service::RelayService;
pub use store::NotificationStore;

use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

/// Runs the relay with a fresh buffer until a listener fails.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    let store = NotificationStore::new(config.buffer.clone());
    run_with_store(config, store).await
}

/// Runs the relay on top of an existing buffer, e.g. one that is also fed
/// in-process.
pub async fn run_with_store(
    config: config::Config,
    store: NotificationStore,
) -> Result<(), RelayError> {
    config.validate()?;

    let ready = Arc::new(AtomicBool::new(false));
    let listener =
        TcpListener::bind(format!("{}:{}", config.listener.host, config.listener.port)).await?;
    let service = RelayService::new(&config, store.clone());

    tracing::info!(
        addr = %listener.local_addr()?,
        mode = ?store.mode(),
        max_pending = config.buffer.max_pending,
        "relay listening"
    );
    for path in service.paths() {
        tracing::info!(path, "serving route");
    }
    ready.store(true, Ordering::Relaxed);

    let relay_task = serve(listener, service);

    match config.admin_listener {
        Some(admin) => {
            let admin_task = async move {
                run_http_service(&admin.host, admin.port, move |_peer| {
                    let ready = ready.clone();
                    AdminService::new(move || ready.load(Ordering::Relaxed))
                })
                .await?;
                Ok::<_, RelayError>(())
            };
            tokio::try_join!(relay_task, admin_task)?;
        }
        None => relay_task.await?,
    }

    Ok(())
}

/// Serves the relay API on an already bound listener.
pub async fn serve(listener: TcpListener, service: RelayService) -> Result<(), RelayError> {
    shared::http::serve(listener, move |peer| service.for_peer(peer)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BufferMode, Config};
    use crate::model::{AutoClose, FetchResponse, IngestReceipt, NotificationType};
    use serde_json::json;
    use std::net::SocketAddr;

    async fn start_relay(config: Config) -> (SocketAddr, NotificationStore) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().unwrap();

        let store = NotificationStore::new(config.buffer.clone());
        let service = RelayService::new(&config, store.clone());
        tokio::spawn(serve(listener, service));

        (addr, store)
    }

    #[tokio::test]
    async fn test_relay_over_http() {
        let (addr, _store) = start_relay(Config::default()).await;
        let base = format!("http://{addr}/jupyterlab-notifications-extension");
        let client = reqwest::Client::new();

        let receipt: IngestReceipt = client
            .post(format!("{base}/ingest"))
            .json(&json!({
                "message": "Fetch test notification",
                "type": "success",
                "autoClose": 3000,
                "actions": [
                    {"label": "First", "caption": "one", "displayType": "accent"},
                    {"label": "Second", "caption": "two", "displayType": "link"},
                ],
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(receipt.success);

        let fetched: FetchResponse = client
            .get(format!("{base}/notifications"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched.notifications.len(), 1);
        let record = &fetched.notifications[0];
        assert_eq!(record.id, receipt.notification_id);
        assert_eq!(record.kind, NotificationType::Success);
        assert_eq!(record.auto_close, AutoClose::After(3000));
        let labels: Vec<_> = record.actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["First", "Second"]);

        let fetched: FetchResponse = client
            .get(format!("{base}/notifications"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(fetched.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_relay_malformed_json_over_http() {
        let mut config = Config::default();
        config.buffer.mode = BufferMode::Shared;
        let (addr, store) = start_relay(config).await;

        let response = reqwest::Client::new()
            .post(format!(
                "http://{addr}/jupyterlab-notifications-extension/ingest"
            ))
            .body("definitely not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "Invalid JSON payload"}));
        assert_eq!(store.pending(), 0);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let mut config = Config::default();
        config.buffer.max_pending = 0;
        assert!(matches!(
            run(config).await,
            Err(RelayError::InvalidConfig(_))
        ));
    }
}
