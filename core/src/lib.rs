//! Synchronous client for the Lunch Money personal finance API.
//!
//! # Overview
//! `LunchMoney` maps each API endpoint to a method. Every call is a single
//! blocking round trip: the request carries `Authorization: Bearer <key>`,
//! parameters go out as a query string or a JSON body, and the decoded JSON
//! comes back as a `serde_json::Value`.
//!
//! # Design
//! - The client holds only the API key, the base URL and a transport.
//! - All endpoint methods funnel into `LunchMoney::query`, which also serves
//!   as an escape hatch for routes without a dedicated method.
//! - The network sits behind the `Transport` trait. `UreqTransport` is the
//!   default; tests swap in a recorder to inspect outgoing requests.
//! - Entities are left as untyped JSON; the server owns their schema.
//!
//! ```no_run
//! use lunchmoney_core::LunchMoney;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), lunchmoney_core::ApiError> {
//! let client = LunchMoney::new(None)?; // reads LUNCH_MONEY_API_KEY
//! let january = client.transactions(json!({"start_date": "2020-01-01", "end_date": "2020-01-31"}))?;
//! println!("{january}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;

pub use client::LunchMoney;
pub use config::{ClientConfig, API_KEY_ENV};
pub use error::ApiError;
pub use http::{
    HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport, DEFAULT_BODY_LIMIT,
};
