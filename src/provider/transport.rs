//! HTTP transport used by the provider adapter.
//!
//! The adapter never talks to `reqwest` directly; it hands a fully built
//! [`HttpRequest`] to a [`Transport`]. Tests substitute a stub transport to
//! count calls or script responses without opening sockets.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// A JSON POST request, fully prepared by a provider backend.
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Look up a header value by (case-insensitive) name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values carry credentials, so only names are printed.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| *n).collect();
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &names)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Raw status and body returned by the server.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced a response (connect failure, timeout, reset).
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct TransportError {
    pub reason: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            timed_out: false,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            reason: format!("request timed out after {}s", after.as_secs()),
            timed_out: true,
        }
    }
}

/// Sends prepared requests to a provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("POST {} (timeout {}s)", request.url, request.timeout.as_secs());

        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| from_reqwest(e, request.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest(e, request.timeout))?;

        Ok(HttpResponse { status, body })
    }
}

fn from_reqwest(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(timeout)
    } else {
        TransportError::new(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_hides_header_values() {
        let request = HttpRequest::post("http://x/v1", json!({}), Duration::from_secs(5))
            .header("authorization", "Bearer sk-secret");
        let printed = format!("{:?}", request);
        assert!(printed.contains("authorization"));
        assert!(!printed.contains("sk-secret"));
    }

    #[test]
    fn test_header_value_is_case_insensitive() {
        let request = HttpRequest::post("http://x", json!({}), Duration::from_secs(1))
            .header("x-api-key", "k");
        assert_eq!(request.header_value("X-API-KEY"), Some("k"));
        assert_eq!(request.header_value("authorization"), None);
    }

    #[test]
    fn test_timeout_error_is_flagged() {
        let err = TransportError::timeout(Duration::from_secs(30));
        assert!(err.timed_out);
        assert!(err.to_string().contains("30s"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let transport = HttpTransport::new();
        let request = HttpRequest::post("http://127.0.0.1:9/api", json!({}), Duration::from_secs(2));
        let result = transport.send(request).await;
        assert!(result.is_err());
    }
}
