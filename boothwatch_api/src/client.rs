use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use boothwatch_core::RankingEntry;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::watch, time::timeout};

use crate::{
    ApiError, ApiResult,
    auth::{AuthService, RefreshTurn},
    config::{ApiConfig, DEFAULT_REFRESH_TIMEOUT},
    ranking::RankingSnapshotSource,
    session::{SessionStatus, SessionVault},
    token_store::TokenStore,
    transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport},
};

/// HTTP client that attaches the session's bearer token and recovers from
/// an expired access token by refreshing it once for all concurrent callers.
///
/// Refreshes are coordinated through the [`SessionVault`], so any number of
/// clients built on the same vault still share a single refresh.
pub struct AuthenticatedHttpClient<C, S>
where
    C: HttpTransport,
    S: TokenStore,
{
    transport: Arc<C>,
    auth: AuthService<C, S>,
    refresh_timeout: Duration,
}

impl<S> AuthenticatedHttpClient<ReqwestTransport, S>
where
    S: TokenStore,
{
    pub fn from_config(config: &ApiConfig, vault: Arc<SessionVault<S>>) -> ApiResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::new(transport, vault).with_refresh_timeout(config.refresh_timeout))
    }
}

impl<C, S> AuthenticatedHttpClient<C, S>
where
    C: HttpTransport,
    S: TokenStore,
{
    pub fn new(transport: Arc<C>, vault: Arc<SessionVault<S>>) -> Self {
        Self {
            auth: AuthService::new(Arc::clone(&transport), vault),
            transport,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    pub fn auth(&self) -> &AuthService<C, S> {
        &self.auth
    }

    pub fn session_status(&self) -> SessionStatus {
        self.auth.vault().status()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionStatus> {
        self.auth.vault().subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.auth.vault().refresh_gate().is_refreshing()
    }

    pub fn queued_for_refresh(&self) -> usize {
        self.auth.vault().refresh_gate().waiting()
    }

    /// Sends `request` with the current access token, if any.
    ///
    /// A 401 triggers token recovery and exactly one retry with the new
    /// token. A retry that is rejected again fails with
    /// [`ApiError::Unauthorized`]. Other statuses are returned as-is.
    pub async fn request(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let access_token = self.auth.vault().access_token();
        let response = self
            .transport
            .send(request, access_token.as_deref())
            .await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        log::debug!(
            "{} {} rejected as unauthorized; recovering access token",
            request.method,
            request.path
        );
        let fresh_token = self.recover_access_token(request).await?;

        let retried = self.transport.send(request, Some(&fresh_token)).await?;
        if retried.is_unauthorized() {
            log::debug!(
                "{} {} rejected again after refresh; not retrying",
                request.method,
                request.path
            );
            return Err(unauthorized(request));
        }
        Ok(retried)
    }

    pub async fn get_json<T>(&self, path: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::post(path, body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::put(path, body)?).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        let request = ApiRequest::delete(path);
        self.request(&request).await?.error_for_status(&request)?;
        Ok(())
    }

    async fn send_json<T>(&self, request: &ApiRequest) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        self.request(request)
            .await?
            .error_for_status(request)?
            .json()
    }

    async fn recover_access_token(&self, request: &ApiRequest) -> ApiResult<String> {
        let lease = match self.auth.vault().refresh_gate().enter() {
            RefreshTurn::Follower(waiter) => return waiter.wait().await,
            RefreshTurn::Leader(lease) => lease,
        };

        let Some(refresh_token) = self.auth.vault().refresh_token() else {
            lease.fail("no refresh token available");
            self.expire_session("no refresh token available");
            return Err(unauthorized(request));
        };

        let refreshed = timeout(self.refresh_timeout, self.auth.refresh(&refresh_token))
            .await
            .unwrap_or_else(|_| Err(ApiError::RefreshTimedOut(self.refresh_timeout)));

        match refreshed {
            Ok(tokens) => {
                lease.succeed(&tokens.access_token);
                Ok(tokens.access_token)
            }
            Err(err) => {
                let reason = err.display_chain().to_string();
                lease.fail(&reason);
                self.expire_session(&reason);
                Err(ApiError::RefreshFailed { reason })
            }
        }
    }

    fn expire_session(&self, reason: &str) {
        if let Err(err) = self.auth.expire_session(reason) {
            log::error!(
                "failed to clear stored session: {:?}",
                err.display_chain()
            );
        }
    }
}

#[async_trait]
impl<C, S> RankingSnapshotSource for AuthenticatedHttpClient<C, S>
where
    C: HttpTransport,
    S: TokenStore + Send + Sync,
{
    async fn fetch_ranking(&self, path: &str) -> ApiResult<Vec<RankingEntry>> {
        self.get_json(path).await
    }
}

fn unauthorized(request: &ApiRequest) -> ApiError {
    ApiError::Unauthorized {
        method: request.method.clone(),
        path: request.path.clone(),
    }
}
