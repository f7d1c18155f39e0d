//! Error types for the Lunch Money client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." All other non-2xx responses land in `HttpError` with the raw
//! status code and body. The API also reports some failures with a 2xx
//! status and an `error` field in the JSON body; those become `Remote`.

use thiserror::Error;

/// Errors returned by `LunchMoney` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No API key was passed and the environment variable is unset or empty.
    #[error("an API key is required: pass one explicitly or set the LUNCH_MONEY_API_KEY environment variable")]
    MissingApiKey,

    /// The request never produced a response (DNS, connect, TLS, I/O).
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The server returned 404.
    #[error("resource not found: {body}")]
    NotFound { body: String },

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The server answered successfully but the payload carried an `error`.
    #[error("Lunch Money error: {0}")]
    Remote(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The response body is not valid JSON.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// Query parameters were not a JSON object.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The response decoded but lacks the field an endpoint promises.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
