//! Session configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_REFRESH_PATH: &str = "/token/refresh/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_FILE_NAME: &str = "tokens.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// What the store does when a validation fetch comes back 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Treat it like any other failure: forced logout.
    #[default]
    Disabled,
    /// Redeem the stored refresh token once, then retry the profile fetch once.
    Redeem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// API base URL without a trailing slash, e.g. `http://host/api`.
    pub api_url: String,
    pub token_file: PathBuf,
    pub timeouts: HttpTimeouts,
    pub refresh_policy: RefreshPolicy,
    pub refresh_path: String,
}

impl SessionConfig {
    /// Config pointing at `api_url` with every other field at its default.
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: normalize_api_url(api_url),
            token_file: default_token_file(std::env::var("HOME").ok()),
            timeouts: HttpTimeouts::default(),
            refresh_policy: RefreshPolicy::Disabled,
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
        }
    }

    /// Build typed session config from environment variables.
    ///
    /// Optional:
    /// - `SNAPGRAM_API_URL`: default `http://127.0.0.1:8000/api`
    /// - `SNAPGRAM_TOKEN_FILE`: default `$HOME/.snapgram/tokens.json`
    /// - `SNAPGRAM_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SNAPGRAM_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SNAPGRAM_REFRESH_ON_EXPIRY`: `true`/`false`, default false
    /// - `SNAPGRAM_REFRESH_PATH`: default `/token/refresh/`
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is not an absolute http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] but reading from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is not an absolute http(s) URL.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("SNAPGRAM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let api_url = parse_api_url(&api_url)?;

        let token_file = lookup("SNAPGRAM_TOKEN_FILE")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| default_token_file(lookup("HOME")), PathBuf::from);

        let timeouts = HttpTimeouts {
            request_secs: parse_or(lookup("SNAPGRAM_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(lookup("SNAPGRAM_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        let refresh_policy = match lookup("SNAPGRAM_REFRESH_ON_EXPIRY").as_deref().and_then(parse_bool) {
            Some(true) => RefreshPolicy::Redeem,
            _ => RefreshPolicy::Disabled,
        };
        let refresh_path = lookup("SNAPGRAM_REFRESH_PATH").unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_owned());

        Ok(Self { api_url, token_file, timeouts, refresh_policy, refresh_path })
    }
}

/// Validate an API base URL and strip trailing slashes.
///
/// # Errors
///
/// Returns an error if `raw` is not an absolute http(s) URL.
pub fn parse_api_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { var: "SNAPGRAM_API_URL", reason };
    let url = reqwest::Url::parse(raw.trim()).map_err(|e| invalid(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(normalize_api_url(raw))
}

fn normalize_api_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn default_token_file(home: Option<String>) -> PathBuf {
    match home.filter(|h| !h.is_empty()) {
        Some(home) => PathBuf::from(home).join(".snapgram").join(DEFAULT_TOKEN_FILE_NAME),
        None => PathBuf::from(".snapgram").join(DEFAULT_TOKEN_FILE_NAME),
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
