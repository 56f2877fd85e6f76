use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureKind {
    /// Connection refused, DNS failure, dropped body and similar.
    Transport,
    /// The server answered with a non-2xx status.
    Status,
    /// The body was not a `{"results": [...]}` option list.
    Decode,
}

/// The only runtime failure of a cascade: an option list could not be
/// fetched. It is always handled locally by resetting the dependent field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("fetch {url} failed ({kind:?}): {message}")]
pub struct FetchError {
    pub kind: FetchFailureKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchFailureKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Transport, url, message)
    }

    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::new(
            FetchFailureKind::Status,
            url,
            format!("server returned status {status}"),
        )
    }

    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchFailureKind::Decode, url, message)
    }
}
