//! Wire DTOs for the auth and profile endpoints, plus the derived identity.
//!
//! DESIGN
//! ======
//! `User` is never persisted. It is always rebuilt from a `/profiles/me/`
//! response, which is why the profile payload and the identity are separate
//! types with an explicit `From` between them.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issued access/refresh token pair. Both values are opaque bearer strings.
///
/// `Debug` redacts both tokens so the pair can travel through `tracing`
/// fields without leaking credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer token attached to API requests.
    pub access: String,
    /// Longer-lived token; persisted alongside `access`.
    pub refresh: String,
}

impl CredentialPair {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self { access: access.into(), refresh: refresh.into() }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Identity of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub username: String,
    /// Avatar image URL, if the profile has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Subset of the `GET /profiles/me/` payload the session cares about.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProfileResponse {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<ProfileResponse> for User {
    fn from(profile: ProfileResponse) -> Self {
        Self { email: profile.email, username: profile.username, avatar: profile.image }
    }
}

/// Body of `POST /token/`.
#[derive(Clone, Serialize)]
pub struct LoginPayload {
    pub username_or_email: String,
    pub password: String,
}

impl fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("username_or_email", &self.username_or_email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /register/`.
#[derive(Clone, Serialize)]
pub struct RegisterPayload {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl fmt::Debug for RegisterPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterPayload")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// Response of `POST /register/`. `token` is present when the server signs the
/// new account in immediately.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub token: Option<CredentialPair>,
}

/// Body of the refresh-redemption request.
#[derive(Clone, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response of the refresh-redemption request. Servers that rotate refresh
/// tokens also return a new `refresh`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
