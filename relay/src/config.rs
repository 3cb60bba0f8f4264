use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("base_path must start with '/': {0}")]
    InvalidBasePath(String),

    #[error("buffer.max_pending must be greater than 0")]
    EmptyBuffer,

    #[error("max_body_bytes must be greater than 0")]
    EmptyBodyLimit,

    #[error("Empty user name")]
    EmptyUserName,

    #[error("Empty token for user: {0}")]
    EmptyToken(String),

    #[error("Duplicate user name: {0}")]
    DuplicateUser(String),

    #[error("Token for user {0} is already assigned to another user")]
    DuplicateToken(String),

    #[error("auth.loopback_user cannot be empty")]
    EmptyLoopbackUser,
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the ingest/fetch API
    #[serde(default)]
    pub listener: Listener,
    /// Optional listener for the health and readiness checks
    #[serde(default)]
    pub admin_listener: Option<Listener>,
    /// Prefix under which the API routes are mounted, e.g. `/user/alice/`
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Largest request body accepted by the ingest endpoint
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            admin_listener: None,
            base_path: default_base_path(),
            max_body_bytes: default_max_body_bytes(),
            buffer: BufferConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Validates the relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin) = &self.admin_listener {
            admin.validate()?;
        }

        if !self.base_path.starts_with('/') {
            return Err(ValidationError::InvalidBasePath(self.base_path.clone()));
        }

        if self.max_body_bytes == 0 {
            return Err(ValidationError::EmptyBodyLimit);
        }

        if self.buffer.max_pending == 0 {
            return Err(ValidationError::EmptyBuffer);
        }

        self.auth.validate()
    }
}

fn default_base_path() -> String {
    "/".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8888,
        }
    }
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// How pending notifications are partitioned between readers.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    /// One queue for everybody, drained completely by whoever fetches first.
    Shared,
    /// Every user reads the log through their own cursor.
    #[default]
    PerUser,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BufferConfig {
    #[serde(default)]
    pub mode: BufferMode,
    /// Upper bound on retained notifications; the oldest are evicted first.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Notifications older than this are dropped even if never fetched.
    /// `null` keeps them until they are read or evicted.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: Option<u64>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            mode: BufferMode::default(),
            max_pending: default_max_pending(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl BufferConfig {
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }
}

fn default_max_pending() -> usize {
    1000
}

fn default_retention_secs() -> Option<u64> {
    Some(3600)
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Requests from loopback peers skip token checks.
    #[serde(default = "default_true")]
    pub allow_loopback: bool,
    /// Identity assigned to loopback requests that carry no valid token.
    #[serde(default = "default_loopback_user")]
    pub loopback_user: String,
    #[serde(default)]
    pub users: Vec<UserToken>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            allow_loopback: true,
            loopback_user: default_loopback_user(),
            users: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.loopback_user.is_empty() {
            return Err(ValidationError::EmptyLoopbackUser);
        }

        let mut names = HashSet::new();
        let mut tokens = HashSet::new();
        for user in &self.users {
            if user.name.is_empty() {
                return Err(ValidationError::EmptyUserName);
            }
            if user.token.is_empty() {
                return Err(ValidationError::EmptyToken(user.name.clone()));
            }
            if !names.insert(&user.name) {
                return Err(ValidationError::DuplicateUser(user.name.clone()));
            }
            if !tokens.insert(&user.token) {
                return Err(ValidationError::DuplicateToken(user.name.clone()));
            }
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_loopback_user() -> String {
    "localhost".to_string()
}

#[derive(Clone, Deserialize, PartialEq)]
pub struct UserToken {
    pub name: String,
    pub token: String,
}

impl std::fmt::Debug for UserToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserToken")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish()
    }
}
