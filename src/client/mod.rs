//! HTTP API client and authentication.
//!
//! This module provides the [`ApiClient`] for JSON APIs, along with
//! authentication types ([`Auth`], [`ClientCredentials`]).

mod api;
mod auth;

pub use api::ApiClient;
pub use auth::{Auth, BUSINESS_CENTRAL_SCOPE, ClientCredentials};
