//! JSON API client
//!
//! Provides `ApiClient` for making authenticated JSON requests relative to a
//! base URL.

use super::Auth;
use eyre::{Context, Result, eyre};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Client for a JSON API below a base URL.
///
/// Paths are appended to the base URL verbatim, so a base URL with a path
/// prefix (`https://host/tenant`) keeps its prefix.
///
/// # Example
/// ```no_run
/// use etlit::client::{ApiClient, Auth};
///
/// # async fn example() -> eyre::Result<()> {
/// let client = ApiClient::try_new(
///     "https://bo.example.com",
///     Auth::Bearer("api-key".to_string()),
///     None,
/// )?;
/// let models = client
///     .send_json(reqwest::Method::GET, "/businessobjects/core/models/customModels", None)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client with default Authorization and Accept headers
    ///
    /// # Errors
    /// Returns an error if the base URL is not a valid absolute URL or the
    /// HTTP client cannot be built
    pub fn try_new(base_url: &str, auth: Auth, timeout: Option<Duration>) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid base URL: '{}'", base_url))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(value) = auth.header_value() {
            let mut value =
                HeaderValue::from_str(&value).context("Invalid Authorization header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path below the base URL
    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a request, with an optional JSON body
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url_for(path);
        log::trace!("{} {}", method, url);

        let request = self.client.request(method, &url);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| eyre!("Failed to send request to {}: {}", path, e))
    }

    /// Send a request and decode the JSON response
    ///
    /// 200 and 201 return the decoded body (`Null` when empty), 204 returns
    /// `Null`. Any other status is an error carrying the response text.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let response = self.request(method.clone(), path, body).await?;
        let status = response.status();

        match status.as_u16() {
            204 => Ok(Value::Null),
            200 | 201 => {
                let text = response.text().await?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse response from {}", path))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                eyre::bail!(
                    "Request {} {} failed ({}): {}",
                    method,
                    path,
                    status,
                    body
                )
            }
        }
    }
}

impl std::fmt::Display for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
