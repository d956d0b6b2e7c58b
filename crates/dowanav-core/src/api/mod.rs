//! Authenticated REST client for the navigation backend.
//!
//! `ApiClient` attaches the bearer token held by the `SessionManager` to
//! every request under `/api/navigation`. A 401 triggers one token refresh
//! and one retry; if the refresh fails the session is cleared and the
//! owner's `LoginRequired` handler is invoked.

pub mod client;
pub mod error;

pub use client::{build_http_client, ApiClient, LoginRequired, RequestOptions};
pub use error::ApiError;
