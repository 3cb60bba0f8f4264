use relay::RelayError;
use relay::config::AuthConfig;
use relay::model::{FetchResponse, IngestReceipt, IngestRequest, NotificationRecord};
use relay::router::api_path;
use relay::store::NotificationStore;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid relay URL: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("relay error: {0}")]
    RelayError(#[from] RelayError),
}

impl ClientError {
    /// The relay could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, ClientError::ReqwestError(e) if e.is_connect())
    }
}

/// A notification sender that either appends straight into an in-process
/// buffer or talks to a relay over HTTP.
#[derive(Clone)]
pub struct Notifier(NotifierInner);

impl Notifier {
    /// Reads and writes `store` directly, fetching as the loopback user.
    pub fn in_process(store: NotificationStore) -> Self {
        Notifier(NotifierInner::InProcess {
            store,
            reader: AuthConfig::default().loopback_user,
        })
    }

    /// Talks to the relay mounted below `base_url`. `token`, when set, is
    /// sent both as a query parameter and an `Authorization` header.
    pub fn url(base_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        Ok(Notifier(NotifierInner::Url(HttpClient::new(base_url, token)?)))
    }

    pub async fn send(&self, request: &IngestRequest) -> Result<IngestReceipt, ClientError> {
        match &self.0 {
            NotifierInner::InProcess { store, .. } => Ok(store.ingest(request.clone())?),
            NotifierInner::Url(client) => client.send(request).await,
        }
    }

    /// Drains everything pending for the caller.
    pub async fn fetch(&self) -> Result<Vec<NotificationRecord>, ClientError> {
        match &self.0 {
            NotifierInner::InProcess { store, reader } => Ok(store.fetch(reader)),
            NotifierInner::Url(client) => client.fetch().await,
        }
    }
}

#[derive(Clone)]
enum NotifierInner {
    InProcess {
        store: NotificationStore,
        reader: String,
    },
    Url(HttpClient),
}

#[derive(Clone)]
struct HttpClient {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpClient {
    fn new(base_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        Ok(HttpClient {
            client: reqwest::Client::new(),
            base: Url::parse(base_url)?,
            token,
        })
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(&api_path(self.base.path(), name));
        url.set_query(None);
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("token {token}")),
            None => builder,
        }
    }

    async fn send(&self, request: &IngestRequest) -> Result<IngestReceipt, ClientError> {
        let endpoint = self.endpoint("ingest");
        tracing::debug!(
            path = endpoint.path(),
            authenticated = self.token.is_some(),
            "sending notification"
        );

        let response = self
            .authorize(self.client.post(endpoint))
            .json(request)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn fetch(&self) -> Result<Vec<NotificationRecord>, ClientError> {
        let response = self
            .authorize(self.client.get(self.endpoint("notifications")))
            .send()
            .await?;
        Ok(parse_response::<FetchResponse>(response).await?.notifications)
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status { status, body });
    }
    Ok(response.json().await?)
}
