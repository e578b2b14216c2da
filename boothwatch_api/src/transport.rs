use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::{ApiError, ApiResult, config::ApiConfig};

#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B>(path: impl Into<String>, body: &B) -> ApiResult<Self>
    where
        B: Serialize + ?Sized,
    {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn put<B>(path: impl Into<String>, body: &B) -> ApiResult<Self>
    where
        B: Serialize + ?Sized,
    {
        Self::new(Method::PUT, path).with_json(body)
    }

    pub fn with_json<B>(mut self, body: &B) -> ApiResult<Self>
    where
        B: Serialize + ?Sized,
    {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T>(&self) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn error_for_status(self, request: &ApiRequest) -> ApiResult<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        Err(ApiError::UnexpectedStatus {
            method: request.method.clone(),
            path: request.path.clone(),
            status: self.status,
            body: self.text(),
        })
    }
}

/// Sends one request and hands back whatever the server answered.
///
/// Implementations never interpret status codes; a 401 is an `Ok` response
/// so the caller can run token recovery.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer_token: Option<&str>,
    ) -> ApiResult<ApiResponse>;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        config.validate()?;
        config.endpoint_url("/")?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer_token: Option<&str>,
    ) -> ApiResult<ApiResponse> {
        let url = self.config.endpoint_url(&request.path)?;
        log::trace!(
            "{} {} ({})",
            request.method,
            url,
            if bearer_token.is_some() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        log::trace!("{} {} -> {status}", request.method, request.path);

        Ok(ApiResponse { status, body })
    }
}
