//! Request dispatch for the Lunch Money API.
//!
//! # Design
//! `LunchMoney` holds the resolved API key, the base URL and a transport,
//! and carries no mutable state between calls. Every call goes through the
//! same three steps: `build_request` produces an `HttpRequest`, the
//! transport executes it, and `parse_response` turns the `HttpResponse`
//! into a `serde_json::Value`. The per-endpoint methods in `endpoints.rs`
//! are thin wrappers over `query`.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};

/// Synchronous client for the Lunch Money API.
#[derive(Clone)]
pub struct LunchMoney<T = UreqTransport> {
    api_key: String,
    base_url: String,
    transport: T,
}

// Hand-written so the key never shows up in debug output.
impl<T> std::fmt::Debug for LunchMoney<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LunchMoney")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LunchMoney<UreqTransport> {
    /// Create a client for the live API.
    ///
    /// With `None` (or an empty key) the key is read from
    /// `LUNCH_MONEY_API_KEY`; if that is unset too, `ApiError::MissingApiKey`.
    pub fn new(api_key: Option<&str>) -> Result<Self, ApiError> {
        let mut config = ClientConfig::new();
        config.api_key = api_key.map(str::to_string);
        Self::from_config(config)
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> LunchMoney<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        let api_key = config.resolve_api_key()?;
        Ok(Self {
            api_key,
            base_url: config.base_url(),
            transport,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send an arbitrary request and return the decoded JSON response.
    ///
    /// `path` is relative to the base URL. `params` must be a JSON object
    /// (or absent) and is sent as the query string; `body` is sent as the
    /// JSON payload. Errors from the transport, a non-2xx status, a body
    /// that is not JSON, or an `error` field in the payload are returned
    /// as-is; nothing is retried.
    pub fn query(
        &self,
        method: HttpMethod,
        path: &str,
        params: Option<&Value>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(method, path, params, body)?;
        debug!(
            method = %request.method,
            url = %request.url,
            query_pairs = request.query.len(),
            "sending request"
        );
        let response = self.transport.execute(&request)?;
        debug!(
            status = response.status,
            body_len = response.body.len(),
            "received response"
        );
        parse_response(response)
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: Option<&Value>,
        body: Option<&Value>,
    ) -> Result<HttpRequest, ApiError> {
        let query = match params {
            Some(params) => query_pairs(params)?,
            None => Vec::new(),
        };
        let body = body
            .map(|body| {
                serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))
            })
            .transpose()?;

        Ok(HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path.trim_start_matches('/')),
            query,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), format!("Bearer {}", self.api_key)),
            ],
            body,
        })
    }
}

/// Map a response to decoded JSON, or to the matching `ApiError`.
pub fn parse_response(response: HttpResponse) -> Result<Value, ApiError> {
    if response.status == 404 {
        return Err(ApiError::NotFound { body: response.body });
    }
    if !response.is_success() {
        return Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        });
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
    if let Some(error) = value.get("error").filter(|e| truthy(e)) {
        return Err(ApiError::Remote(error_message(error)));
    }
    Ok(value)
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Array(messages) => messages
            .iter()
            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// JSON truthiness: null, false, zero and empty values are false.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Flatten a JSON object into query-string pairs.
///
/// Strings pass through verbatim, numbers and booleans use their JSON text,
/// nulls are dropped, nested arrays and objects are JSON-encoded.
pub fn query_pairs(params: &Value) -> Result<Vec<(String, String)>, ApiError> {
    let map = match params {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ApiError::InvalidParams(format!(
                "expected a JSON object, got {other}"
            )))
        }
    };
    Ok(map
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), value))
        })
        .collect())
}

/// Serialize caller-supplied parameters into a `Value`.
pub(crate) fn to_value(params: impl Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(params).map_err(|e| ApiError::SerializationError(e.to_string()))
}

/// Overlay the entries of `extra` (an object, or null) onto `base`.
pub(crate) fn merge(base: Value, extra: impl Serialize) -> Result<Value, ApiError> {
    let mut base = match base {
        Value::Object(map) => map,
        other => {
            return Err(ApiError::InvalidParams(format!(
                "expected a JSON object, got {other}"
            )))
        }
    };
    match to_value(extra)? {
        Value::Null => {}
        Value::Object(extra) => base.extend(extra),
        other => {
            return Err(ApiError::InvalidParams(format!(
                "expected a JSON object, got {other}"
            )))
        }
    }
    Ok(Value::Object(base))
}
