//! Generic JSON API client
//!
//! Every request goes through [`ApiClient::request`], which retries network
//! errors and non-success statuses a fixed number of times before giving up
//! with [`WarehouseError::Api`].

use super::Auth;
use crate::error::WarehouseError;
use eyre::Result;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Retry and timeout settings
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_count: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// HTTP client bound to a base URL
///
/// # Example
/// ```no_run
/// use data_warehouse::client::{ApiClient, Auth, ClientOptions};
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let url = Url::parse("https://api.example.com/v1/")?;
/// let client = ApiClient::try_new(url, Auth::Bearer("token".into()), ClientOptions::default())?;
/// let customers = client.get_json("customers", &[]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    url: Url,
    auth: String,
    options: ClientOptions,
}

impl ApiClient {
    pub fn try_new(url: Url, auth: Auth, options: ClientOptions) -> Result<Self> {
        let mut headers = auth.headers()?;
        headers.insert(reqwest::header::ACCEPT, "application/json".parse()?);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            url: with_trailing_slash(url),
            auth: auth.to_string(),
            options,
        })
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Resolve an endpoint path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let path = path.strip_prefix('/').unwrap_or(path);
        Ok(self.url.join(path)?)
    }

    /// GET a JSON document
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    /// POST a JSON body and parse the JSON response
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    /// Send a request with retries
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.endpoint(path)?;
        let attempts = self.options.retry_count.max(1);
        let mut last_status = 0u16;
        let mut last_message = String::new();

        for attempt in 1..=attempts {
            log::debug!("Making {} request to {}", method, url);
            let mut request = self.client.request(method.clone(), url.clone()).query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text).map_err(|e| {
                        WarehouseError::Api {
                            status: 200,
                            message: format!("invalid JSON from {}: {}", url, e),
                        }
                        .into()
                    });
                }
                Ok(response) => {
                    last_status = response.status().as_u16();
                    last_message = response.text().await.unwrap_or_default();
                }
                Err(e) => {
                    last_status = e.status().map(|s| s.as_u16()).unwrap_or(0);
                    last_message = e.to_string();
                }
            }

            log::warn!(
                "Request failed (attempt {}/{}): {} {}",
                attempt,
                attempts,
                last_status,
                last_message
            );
            if attempt < attempts {
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }

        log::error!("Request to {} failed after {} attempts", url, attempts);
        Err(WarehouseError::Api {
            status: last_status,
            message: format!(
                "request to {} failed after {} attempts: {}",
                url, attempts, last_message
            ),
        }
        .into())
    }
}

impl std::fmt::Display for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (auth: {})", self.url, self.auth)
    }
}

// Url::join drops the last path segment unless the base ends with '/'
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
