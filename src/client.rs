//! HTTP client for the queue server's request/response endpoints
//!
//! Every endpoint answers with the protocol envelope, whatever the HTTP
//! status, so bodies are always parsed and failures raised from the
//! envelope rather than from the status code.

use reqwest::{header, Client, Method};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::auth::Credentials;
use crate::config::Config;
use crate::error::{QueueError, Result};
use crate::protocol::{self, Envelope, QueueItem};

/// Queue details returned by the info endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub name: String,
}

/// Shared HTTP plumbing: base URL, auth header and connection pool.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(credentials) = Credentials::from_config(config)? {
            let value = header::HeaderValue::from_str(&credentials.header_value())
                .map_err(|e| QueueError::Config(format!("Invalid credentials: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }

        Ok(Self {
            base_url: config.url.clone(),
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and parse the reply envelope.
    ///
    /// Parameters go in a form body, except for GET which sends none.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Envelope> {
        let url = url_join(&self.base_url, path);
        debug!(method = %method, url = %url, "Queue request");

        let mut request = self.client.request(method.clone(), &url);
        if method != Method::GET {
            request = request.form(params);
        }

        let body = request.send().await?.text().await?;
        protocol::parse(&body)
    }
}

/// Client for a single queue.
#[derive(Clone)]
pub struct QueueClient {
    http: HttpClient,
    queue_id: String,
}

impl QueueClient {
    pub fn new(http: HttpClient, queue_id: impl Into<String>) -> Self {
        Self {
            http,
            queue_id: queue_id.into(),
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Put a value in the queue, optionally under `key`.
    pub async fn put(&self, key: Option<&str>, value: &str) -> Result<()> {
        self.call(Method::POST, "/put", key, &[("value", value)])
            .await?
            .into_result()?;
        Ok(())
    }

    /// Take the next item, removing it from the queue.
    pub async fn take(&self, key: Option<&str>) -> Result<QueueItem> {
        self.call(Method::POST, "/take", key, &[])
            .await?
            .payload_as()
    }

    /// Look at the next item without removing it.
    pub async fn peek(&self, key: Option<&str>) -> Result<QueueItem> {
        self.call(Method::POST, "/peek", key, &[])
            .await?
            .payload_as()
    }

    /// Delete the queue.
    pub async fn delete(&self) -> Result<()> {
        self.call(Method::DELETE, "/queue", None, &[])
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn info(&self) -> Result<QueueInfo> {
        self.call(Method::POST, "/queue", None, &[])
            .await?
            .payload_as()
    }

    /// Check the queue exists.
    pub async fn verify(&self) -> Result<()> {
        self.info().await.map(|_| ())
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        key: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<Envelope> {
        let mut params: Vec<(&str, &str)> = Vec::with_capacity(extra.len() + 2);
        if let Some(key) = key {
            params.push(("key", key));
        }
        params.extend_from_slice(extra);
        params.push(("name", self.queue_id.as_str()));

        self.http.request(method, path, &params).await
    }
}

/// Create a queue and return its name.
///
/// The server generates the name unless one is given; a given name must be
/// a UUID string.
pub async fn queue_create(http: &HttpClient, name: Option<&str>) -> Result<String> {
    let params: Vec<(&str, &str)> = name.map(|n| ("name", n)).into_iter().collect();
    http.request(Method::POST, "/queues", &params)
        .await?
        .payload_as()
}

/// Names of every queue on the server.
pub async fn queue_list(http: &HttpClient) -> Result<Vec<String>> {
    http.request(Method::GET, "/queues", &[])
        .await?
        .payload_as()
}

/// Join base URL and path with exactly one `/` between them.
pub fn url_join(url: &str, path: &str) -> String {
    if url.is_empty() || path.is_empty() {
        return format!("{}{}", url, path);
    }
    match (url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", url, &path[1..]),
        (false, false) => format!("{}/{}", url, path),
        _ => format!("{}{}", url, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        assert_eq!(url_join("http://h:1", "/put"), "http://h:1/put");
        assert_eq!(url_join("http://h:1/", "/put"), "http://h:1/put");
        assert_eq!(url_join("http://h:1", "put"), "http://h:1/put");
        assert_eq!(url_join("http://h:1/", "put"), "http://h:1/put");
        assert_eq!(url_join("http://h:1/api", "/queues"), "http://h:1/api/queues");
        assert_eq!(url_join("http://h:1", ""), "http://h:1");
        assert_eq!(url_join("", "/put"), "/put");
    }

    #[test]
    fn test_http_client_rejects_half_credentials() {
        let config = Config {
            username: Some("ops".into()),
            ..Default::default()
        };
        assert!(HttpClient::new(&config).is_err());
    }

    #[test]
    fn test_queue_client_keeps_name() {
        let http = HttpClient::new(&Config::default()).unwrap();
        let client = QueueClient::new(http, "jobs");
        assert_eq!(client.queue_id(), "jobs");
    }
}
