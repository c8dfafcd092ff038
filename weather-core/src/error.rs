//! Error kinds shared across the core crate.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single weather query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No location matching '{query}'")]
    NotFound { query: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Weather API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode weather API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl QueryError {
    /// User-friendly message for the transient error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { .. } => "City not found. Please try again.".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Api { status: 401 | 403, .. } => {
                "The weather service rejected the API key. Run `weather configure`.".to_string()
            }
            Self::Api { .. } | Self::Decode(_) => {
                "The weather service returned an unexpected response.".to_string()
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Failure writing to (or removing from) persistent storage.
///
/// Unparsable data on read is never reported through this type.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Offline queue owner has shut down")]
    Closed,
}
