use std::sync::Arc;

use super::types::{LoginCredentials, RefreshRequest, TokenResponse};
use crate::{
    ApiResult,
    session::SessionVault,
    token_store::{TokenPair, TokenStore},
    transport::{ApiRequest, HttpTransport},
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// The only writer of the session vault: login, refresh and logout.
pub struct AuthService<C, S>
where
    C: HttpTransport,
    S: TokenStore,
{
    transport: Arc<C>,
    vault: Arc<SessionVault<S>>,
}

impl<C, S> AuthService<C, S>
where
    C: HttpTransport,
    S: TokenStore,
{
    pub fn new(transport: Arc<C>, vault: Arc<SessionVault<S>>) -> Self {
        Self { transport, vault }
    }

    pub fn vault(&self) -> &Arc<SessionVault<S>> {
        &self.vault
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<TokenPair> {
        let request = ApiRequest::post(LOGIN_PATH, credentials)?;
        let tokens = self.exchange(&request).await?;
        log::info!("logged in as {}", credentials.login_id);
        Ok(tokens)
    }

    /// Exchanges `refresh_token` for a new pair and stores it. Sent without
    /// an `Authorization` header.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let request = ApiRequest::post(REFRESH_PATH, &RefreshRequest { refresh_token })?;
        let tokens = self.exchange(&request).await?;
        log::debug!("access token refreshed");
        Ok(tokens)
    }

    pub fn logout(&self) -> ApiResult<()> {
        log::info!("logging out");
        self.vault.clear("logged out")
    }

    pub(crate) fn expire_session(&self, reason: &str) -> ApiResult<()> {
        log::warn!("session expired, login required: {reason}");
        self.vault.clear(reason)
    }

    async fn exchange(&self, request: &ApiRequest) -> ApiResult<TokenPair> {
        let response = self
            .transport
            .send(request, None)
            .await?
            .error_for_status(request)?;
        let tokens = TokenPair::from(response.json::<TokenResponse>()?);
        self.vault.replace_tokens(tokens.clone())?;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    use super::{AuthService, LOGIN_PATH, REFRESH_PATH};
    use crate::{
        ApiError, ApiResult,
        auth::LoginCredentials,
        session::{SessionStatus, SessionVault},
        token_store::{MemoryTokenStore, TokenPair, TokenStore},
        transport::{ApiRequest, ApiResponse, HttpTransport},
    };

    #[derive(Default)]
    struct RecordingTransport {
        responses: Mutex<VecDeque<ApiResult<ApiResponse>>>,
        seen: Mutex<Vec<(ApiRequest, Option<String>)>>,
    }

    impl RecordingTransport {
        fn replying(responses: Vec<ApiResult<ApiResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from(responses)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn send(
            &self,
            request: &ApiRequest,
            bearer_token: Option<&str>,
        ) -> ApiResult<ApiResponse> {
            self.seen
                .lock()
                .expect("seen lock")
                .push((request.clone(), bearer_token.map(ToOwned::to_owned)));
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::message("no response configured")))
        }
    }

    fn ok_json(body: serde_json::Value) -> ApiResult<ApiResponse> {
        Ok(ApiResponse::new(StatusCode::OK, body.to_string()))
    }

    fn service(
        transport: &Arc<RecordingTransport>,
        store: MemoryTokenStore,
    ) -> AuthService<RecordingTransport, MemoryTokenStore> {
        let vault = Arc::new(SessionVault::open(store).expect("open vault"));
        AuthService::new(Arc::clone(transport), vault)
    }

    #[tokio::test]
    async fn login_stores_pair_and_activates_session() {
        let transport = RecordingTransport::replying(vec![ok_json(
            json!({"accessToken": "a1", "refreshToken": "r1"}),
        )]);
        let auth = service(&transport, MemoryTokenStore::default());

        let tokens = auth
            .login(&LoginCredentials::new("admin", "hunter2"))
            .await
            .expect("login should succeed");

        assert_eq!(tokens, TokenPair::new("a1", "r1"));
        assert!(auth.vault().status().is_active());
        assert_eq!(
            auth.vault().store().load_tokens().expect("load"),
            Some(TokenPair::new("a1", "r1"))
        );

        let seen = transport.seen.lock().expect("seen lock");
        assert_eq!(seen[0].0.method, Method::POST);
        assert_eq!(seen[0].0.path, LOGIN_PATH);
        assert_eq!(
            seen[0].0.body,
            Some(json!({"loginId": "admin", "password": "hunter2"}))
        );
        assert_eq!(seen[0].1, None);
    }

    #[tokio::test]
    async fn rejected_login_leaves_session_untouched() {
        let transport = RecordingTransport::replying(vec![Ok(ApiResponse::new(
            StatusCode::BAD_REQUEST,
            "bad credentials",
        ))]);
        let auth = service(&transport, MemoryTokenStore::default());

        let err = auth
            .login(&LoginCredentials::new("admin", "wrong"))
            .await
            .expect_err("login should fail");

        assert!(matches!(
            err,
            ApiError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_REQUEST
        ));
        assert!(auth.vault().tokens().is_none());
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_without_bearer() {
        let transport = RecordingTransport::replying(vec![ok_json(
            json!({"accessToken": "a2", "refreshToken": "r2"}),
        )]);
        let auth = service(
            &transport,
            MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")),
        );

        let tokens = auth.refresh("r1").await.expect("refresh should succeed");

        assert_eq!(tokens, TokenPair::new("a2", "r2"));
        assert_eq!(auth.vault().access_token().as_deref(), Some("a2"));
        let seen = transport.seen.lock().expect("seen lock");
        assert_eq!(seen[0].0.path, REFRESH_PATH);
        assert_eq!(seen[0].0.body, Some(json!({"refreshToken": "r1"})));
        assert_eq!(seen[0].1, None);
    }

    #[tokio::test]
    async fn refresh_rejects_legacy_token_field() {
        let transport = RecordingTransport::replying(vec![ok_json(
            json!({"token": "a2", "refreshToken": "r2"}),
        )]);
        let auth = service(
            &transport,
            MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")),
        );

        let err = auth.refresh("r1").await.expect_err("legacy shape rejected");

        assert!(matches!(err, ApiError::Serialization(_)));
        assert_eq!(auth.vault().access_token().as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn logout_clears_store_and_requires_login() {
        let transport = RecordingTransport::replying(Vec::new());
        let auth = service(
            &transport,
            MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")),
        );

        auth.logout().expect("logout");

        assert!(auth.vault().tokens().is_none());
        assert_eq!(auth.vault().store().load_tokens().expect("load"), None);
        assert_eq!(
            auth.vault().status(),
            SessionStatus::LoginRequired {
                reason: "logged out".to_owned()
            }
        );
        assert!(transport.seen.lock().expect("seen lock").is_empty());
    }
}
