use std::time::Duration;

use boothwatch_core::DEFAULT_SERIES_CAPACITY;
use url::Url;

use crate::{ApiError, ApiResult};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ApiError::InvalidConfig("BOOTHWATCH_API_URL must be set"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ApiError::InvalidConfig("user_agent must be set"));
        }
        if self.refresh_timeout.is_zero() {
            return Err(ApiError::InvalidConfig("refresh_timeout must be non-zero"));
        }
        Ok(())
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base
    /// already carries (`https://host/api` + `/auth/refresh`).
    pub fn endpoint_url(&self, path: &str) -> ApiResult<Url> {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    pub fn websocket_url(&self, path: &str) -> ApiResult<Url> {
        let mut url = self.endpoint_url(path)?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(ApiError::UnsupportedScheme(other.to_owned())),
        };
        url.set_scheme(scheme)
            .map_err(|()| ApiError::UnsupportedScheme(url.scheme().to_owned()))?;
        Ok(url)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingConfig {
    pub snapshot_path: String,
    pub feed_path: String,
    pub ping_interval: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub series_capacity: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "/booths/ranking".to_owned(),
            feed_path: "/ws/booth-ranking".to_owned(),
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 5,
            series_capacity: DEFAULT_SERIES_CAPACITY,
        }
    }
}
