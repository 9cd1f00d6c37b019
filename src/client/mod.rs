//! HTTP API client and authentication.
//!
//! [`ApiClient`] wraps a reqwest client with a base URL, default auth headers
//! and a fixed-delay retry loop. Source extractors talk to HTTP systems through it.

mod api;
mod auth;

pub use api::{ApiClient, ClientOptions};
pub use auth::Auth;
