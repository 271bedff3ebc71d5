//! Error taxonomy for the client core: configuration, transport, decode and command failures.
//!
//! Every variant is locally recoverable. Callers report them through `tracing` or the
//! view's status line and keep running.

use std::{io, path::PathBuf};

use shared::error::{ApiError, ValidationError};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base url must use http or https, got {scheme:?}")]
    UnsupportedScheme { scheme: String },
    #[error("base url {url:?} has no host")]
    MissingHost { url: String },
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Terminal failure of a push channel. The subscription ends after yielding one of these.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect websocket {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("websocket receive failed on {url}: {source}")]
    Receive {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
}

/// A pushed message that is not valid JSON or does not match the collection's entity shape.
#[derive(Debug, Error)]
#[error("failed to decode {collection} message: {source}")]
pub struct DecodeError {
    pub collection: &'static str,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid draft: {0}")]
    Validation(#[from] ValidationError),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("invalid response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CommandError {
    pub(crate) fn status(url: &str, status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiError>(body)
            .map(|api| api.error)
            .unwrap_or_else(|_| body.trim().to_string());
        Self::Status {
            url: url.to_string(),
            status,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}
