use std::{fmt, time::Duration};

use reqwest::{Method, StatusCode};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("invalid url")]
    InvalidUrl(#[from] url::ParseError),
    #[error("cannot derive a websocket endpoint from scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("http request failed")]
    Http(#[from] reqwest::Error),
    #[error("websocket operation failed")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("keyring operation failed")]
    Keyring(#[from] keyring::Error),
    #[error("json serialization failed")]
    Serialization(#[from] serde_json::Error),
    #[error("{method} {path} returned {status}: {body}")]
    UnexpectedStatus {
        method: Method,
        path: String,
        status: StatusCode,
        body: String,
    },
    #[error("{method} {path} was rejected as unauthorized")]
    Unauthorized { method: Method, path: String },
    #[error("token refresh failed: {reason}")]
    RefreshFailed { reason: String },
    #[error("token refresh did not settle within {0:?}")]
    RefreshTimedOut(Duration),
    #[error("{0}")]
    Message(String),
}

impl ApiError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn display_chain_walks_sources() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").expect_err("bad json");
        let err = ApiError::from(parse_err);

        let rendered = err.display_chain().to_string();
        assert!(rendered.starts_with("json serialization failed -> "));
        assert!(rendered.contains("EOF"));
    }
}
