//! Auth and profile endpoints.
//!
//! `SessionApi` is the seam the session store validates through. The real
//! implementation is [`ApiClient`], so the validation fetch carries whatever
//! token the authorization pipeline finds in storage at that moment.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use super::api::{ApiClient, ApiError};
use super::types::{CredentialPair, LoginPayload, ProfileResponse, RefreshRequest, RefreshedToken, RegisterPayload, RegisteredUser};

pub const PROFILE_ME_PATH: &str = "/profiles/me/";
pub const TOKEN_PATH: &str = "/token/";
pub const REGISTER_PATH: &str = "/register/";

/// Server calls the session store depends on.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /profiles/me/` with the currently stored access token.
    async fn fetch_my_profile(&self) -> Result<ProfileResponse, ApiError>;

    /// Exchange a refresh token for a new access token.
    async fn redeem_refresh(&self, refresh: &str) -> Result<RefreshedToken, ApiError>;
}

/// [`ApiClient`] plus the configured refresh-redemption path.
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
    refresh_path: String,
}

impl AuthApi {
    #[must_use]
    pub fn new(client: ApiClient, refresh_path: &str) -> Self {
        Self { client, refresh_path: refresh_path.to_owned() }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Trade username/email and password for a token pair via `POST /token/`.
    ///
    /// The pair is returned, not stored; hand it to `SessionStore::login`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the credentials are rejected.
    pub async fn obtain_token(&self, payload: &LoginPayload) -> Result<CredentialPair, ApiError> {
        self.client.post_json(TOKEN_PATH, payload).await
    }

    /// Create an account via `POST /register/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the payload.
    pub async fn register(&self, payload: &RegisterPayload) -> Result<RegisteredUser, ApiError> {
        self.client.post_json(REGISTER_PATH, payload).await
    }
}

#[async_trait::async_trait]
impl SessionApi for AuthApi {
    async fn fetch_my_profile(&self) -> Result<ProfileResponse, ApiError> {
        self.client.get_json(PROFILE_ME_PATH).await
    }

    async fn redeem_refresh(&self, refresh: &str) -> Result<RefreshedToken, ApiError> {
        self.client
            .post_json(&self.refresh_path, &RefreshRequest { refresh })
            .await
    }
}

/// Human-readable message for a failed auth call, preferring the server's
/// `detail` field when the body carries one.
#[must_use]
pub fn failure_message(err: &ApiError) -> String {
    if let ApiError::Status { status, body } = err {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(detail) = value.get("detail").and_then(serde_json::Value::as_str) {
                return detail.to_owned();
            }
            if let Some(first) = value.as_object().and_then(|fields| fields.values().next()) {
                let text = match first {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_owned),
                    _ => None,
                };
                if let Some(text) = text {
                    return text;
                }
            }
        }
        return format!("request failed: {status}");
    }
    err.to_string()
}
