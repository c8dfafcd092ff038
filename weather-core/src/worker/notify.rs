//! One-way notification signals and the window clients a click can reach.
//!
//! Nothing here waits for an acknowledgement: a notification is shown (or
//! not) and the caller moves on.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PUSH_TITLE: &str = "Weather Update";
pub const DEFAULT_PUSH_BODY: &str = "Check today's weather!";
pub const DEFAULT_ICON: &str = "/logo.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: DEFAULT_ICON.to_string(),
            badge: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

/// The platform notification surface.
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    fn permission(&self) -> Permission;

    async fn request_permission(&self) -> Permission;

    async fn show(&self, notification: Notification);

    async fn close(&self, notification: &Notification);
}

/// Push message body. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

impl PushPayload {
    /// Absent or unparsable data is an empty payload.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data else {
            return Self::default();
        };
        serde_json::from_slice(data).unwrap_or_else(|err| {
            debug!(error = %err, "Unparsable push payload; using defaults");
            Self::default()
        })
    }

    /// Empty strings count as absent.
    pub fn into_notification(self) -> Notification {
        Notification {
            title: or_default(self.title, DEFAULT_PUSH_TITLE),
            body: or_default(self.body, DEFAULT_PUSH_BODY),
            icon: or_default(self.icon, DEFAULT_ICON),
            badge: Some(or_default(self.badge, DEFAULT_ICON)),
        }
    }
}

fn or_default(field: Option<String>, default: &str) -> String {
    field
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// An open app window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: Option<String>,
    pub focusable: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("client operation failed: {0}")]
pub struct ClientError(pub String);

#[async_trait]
pub trait Clients: Send + Sync + Debug {
    async fn windows(&self) -> Vec<WindowClient>;

    async fn focus(&self, id: &str) -> Result<(), ClientError>;

    async fn open_window(&self, url: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    Opened(String),
}
