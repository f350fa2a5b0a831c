//! Request authorization pipeline.
//!
//! ARCHITECTURE
//! ============
//! Every REST call in the app goes through [`ApiClient::execute`], which runs
//! [`ApiClient::authorize`] right before dispatch. `authorize` reads the access
//! token straight from [`TokenStorage`], never from the session store, so it
//! works during startup rehydration and needs no invalidation step: a token
//! written or erased by the store is seen by the very next request.
//!
//! ERROR HANDLING
//! ==============
//! The filter never rejects a request itself. A missing token dispatches the
//! request unchanged; a storage read failure fails the request through the
//! ordinary `ApiError` channel.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::SessionConfig;
use crate::storage::{StorageError, TokenStorage};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("token storage read failed: {0}")]
    Storage(#[from] StorageError),
    #[error("access token is not a valid header value")]
    InvalidHeader,
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },
    #[error("API response parse failed: {0}")]
    Decode(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// True when the server rejected the credential (HTTP 401).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// Format the `Authorization` header value for a bearer token.
pub(crate) fn bearer_header(token: &str) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ApiError::InvalidHeader)?;
    value.set_sensitive(true);
    Ok(value)
}

/// HTTP client bound to the API base URL and the token storage.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    storage: Arc<dyn TokenStorage>,
}

impl ApiClient {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &SessionConfig, storage: Arc<dyn TokenStorage>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self::with_http(http, &config.api_url, storage))
    }

    /// Wrap an existing `reqwest::Client`.
    #[must_use]
    pub fn with_http(http: reqwest::Client, base_url: &str, storage: Arc<dyn TokenStorage>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), storage }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/profiles/me/`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Start a request against `path`. Nothing is attached until dispatch.
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Attach `Authorization: Bearer <token>` when an access token is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or the token cannot be
    /// carried in a header.
    pub fn authorize(&self, request: &mut Request) -> Result<(), ApiError> {
        if let Some(token) = self.storage.access_token()? {
            request.headers_mut().insert(AUTHORIZATION, bearer_header(&token)?);
        }
        Ok(())
    }

    /// Authorize and dispatch a built request.
    ///
    /// # Errors
    ///
    /// Returns an error on storage, header, or transport failure. Non-2xx
    /// responses are returned as `Ok`.
    pub async fn execute(&self, mut request: Request) -> Result<Response, ApiError> {
        self.authorize(&mut request)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "api request");
        Ok(self.http.execute(request).await?)
    }

    /// Build, authorize, and dispatch a request builder.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::execute`], plus request build failures.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        self.execute(builder.build()?).await
    }

    /// `GET path` and decode a JSON body, failing on non-2xx.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a body that
    /// does not decode as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode_json(response).await
    }

    /// `POST path` with a JSON body and decode a JSON response, failing on non-2xx.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a body that
    /// does not decode as `T`.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        decode_json(response).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status: status.as_u16(), body });
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
