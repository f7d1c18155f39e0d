//! Client configuration: API key and base URL resolution.

use crate::error::ApiError;

/// Environment variable consulted when no API key is passed explicitly.
pub const API_KEY_ENV: &str = "LUNCH_MONEY_API_KEY";

/// Host used when no custom endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://dev.lunchmoney.app";

/// API version path segment used when none is configured.
pub const DEFAULT_VERSION: &str = "v1";

/// Settings for constructing a `LunchMoney` client.
///
/// Every field is optional in spirit: an absent key falls back to
/// `LUNCH_MONEY_API_KEY`, an absent endpoint to the live Lunch Money host.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Resolve the key from the explicit setting or the process environment.
    pub fn resolve_api_key(&self) -> Result<String, ApiError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as `resolve_api_key`, reading variables through `lookup`.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String, ApiError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => lookup(API_KEY_ENV)
                .filter(|key| !key.is_empty())
                .ok_or(ApiError::MissingApiKey),
        }
    }

    /// Base URL every request path is appended to. Always ends with `/`.
    pub fn base_url(&self) -> String {
        let version = self.version.trim_matches('/');
        let endpoint = self
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        if version.is_empty() {
            format!("{endpoint}/")
        } else {
            format!("{endpoint}/{version}/")
        }
    }
}
