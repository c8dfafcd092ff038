use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, header::CONTENT_TYPE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

/// How the page issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level page load; eligible for the offline fallback.
    Navigate,
    Subresource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub mode: RequestMode,
}

impl Request {
    pub fn navigate(url: impl Into<String>) -> Self {
        Self { url: url.into(), mode: RequestMode::Navigate }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), mode: RequestMode::Subresource }
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(serialize_with = "body_to_base64", deserialize_with = "body_from_base64")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(url: impl Into<String>, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A fetch that never produced a response. HTTP error statuses are
/// responses, not `FetchError`s.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network is offline")]
    Offline,

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

#[async_trait]
pub trait Network: Send + Sync + Debug {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Real network access over reqwest.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    http: Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build().map_err(|err| {
            FetchError::Transport {
                url: String::new(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let transport = |err: reqwest::Error| FetchError::Transport {
            url: request.url.clone(),
            reason: err.to_string(),
        };

        let res = self.http.get(&request.url).send().await.map_err(transport)?;
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = res.bytes().await.map_err(transport)?.to_vec();
        debug!(url = %request.url, status, bytes = body.len(), "Network fetch");

        Ok(Response {
            url: request.url.clone(),
            status,
            content_type,
            body,
        })
    }
}

/// A network that is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNetwork;

#[async_trait]
impl Network for OfflineNetwork {
    async fn fetch(&self, _request: &Request) -> Result<Response, FetchError> {
        Err(FetchError::Offline)
    }
}

fn body_to_base64<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(body))
}

fn body_from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}
