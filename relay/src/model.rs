//! Notification wire types shared by the relay, the client library and the CLI.
//!
//! Field names follow the JSON consumed by the browser poller (`autoClose`,
//! `createdAt`, `displayType`, `commandId`), except for `target_users` which
//! only exists on the ingest side.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const NOTIFICATION_ID_PREFIX: &str = "notif_";
pub const DEFAULT_AUTO_CLOSE_MS: u64 = 5000;

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    Default,
    #[default]
    Info,
    Success,
    Warning,
    Error,
    InProgress,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::Default,
        NotificationType::Info,
        NotificationType::Success,
        NotificationType::Warning,
        NotificationType::Error,
        NotificationType::InProgress,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Default => "default",
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
            NotificationType::InProgress => "in-progress",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error(
    "unknown notification type '{0}' \
     (expected one of default, info, success, warning, error, in-progress)"
)]
pub struct UnknownNotificationType(String);

impl FromStr for NotificationType {
    type Err = UnknownNotificationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownNotificationType(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    #[default]
    Default,
    Accent,
    Warn,
    Link,
}

/// How long the client keeps a notification on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoClose {
    After(u64),
    /// Serialized as `false`: the notification stays until dismissed.
    Never,
}

impl Default for AutoClose {
    fn default() -> Self {
        AutoClose::After(DEFAULT_AUTO_CLOSE_MS)
    }
}

impl Serialize for AutoClose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AutoClose::After(ms) => serializer.serialize_u64(*ms),
            AutoClose::Never => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for AutoClose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AutoCloseVisitor;

        impl Visitor<'_> for AutoCloseVisitor {
            type Value = AutoClose;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative number of milliseconds or false")
            }

            fn visit_u64<E: de::Error>(self, ms: u64) -> Result<AutoClose, E> {
                Ok(AutoClose::After(ms))
            }

            fn visit_i64<E: de::Error>(self, ms: i64) -> Result<AutoClose, E> {
                u64::try_from(ms)
                    .map(AutoClose::After)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(ms), &self))
            }

            fn visit_bool<E: de::Error>(self, flag: bool) -> Result<AutoClose, E> {
                match flag {
                    false => Ok(AutoClose::Never),
                    true => Err(E::invalid_value(de::Unexpected::Bool(true), &self)),
                }
            }
        }

        deserializer.deserialize_any(AutoCloseVisitor)
    }
}

/// A button rendered with the notification.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    pub label: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub display_type: DisplayType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl ActionSpec {
    /// A plain button that only closes the notification.
    pub fn dismiss(label: impl Into<String>) -> Self {
        ActionSpec {
            label: label.into(),
            caption: "Close this notification".to_string(),
            display_type: DisplayType::Default,
            command_id: None,
            args: None,
        }
    }

    /// A button that runs a frontend command when clicked.
    pub fn command(
        label: impl Into<String>,
        command_id: impl Into<String>,
        args: Option<Value>,
    ) -> Self {
        let command_id = command_id.into();
        ActionSpec {
            label: label.into(),
            caption: format!("Run {command_id}"),
            display_type: DisplayType::Accent,
            command_id: Some(command_id),
            args,
        }
    }
}

/// A stored notification, as returned by the fetch endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub auto_close: AutoClose,
    pub created_at: u64,
    pub actions: Vec<ActionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Body of an ingest request. Everything but `message` is optional.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub message: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close: Option<AutoClose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, rename = "target_users", skip_serializing_if = "Option::is_none")]
    pub target_users: Option<Vec<String>>,
}

impl IngestRequest {
    pub fn new(message: impl Into<String>) -> Self {
        IngestRequest {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Who a notification is delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    All,
    Users(BTreeSet<String>),
}

impl Target {
    pub fn includes(&self, user: &str) -> bool {
        match self {
            Target::All => true,
            Target::Users(users) => users.contains(user),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Target::All => serializer.serialize_str("all"),
            Target::Users(users) => serializer.collect_seq(users),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Keyword(String),
            Users(BTreeSet<String>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Keyword(keyword) if keyword == "all" => Ok(Target::All),
            Repr::Keyword(other) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&other),
                &"\"all\" or a list of user names",
            )),
            Repr::Users(users) => Ok(Target::Users(users)),
        }
    }
}

/// Response body of a successful ingest.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IngestReceipt {
    pub success: bool,
    pub notification_id: String,
    pub target_users: Target,
}

/// Response body of the fetch endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FetchResponse {
    pub notifications: Vec<NotificationRecord>,
}
