//! HTTP plumbing for the blob client
//!
//! Requests and responses are plain values so the signer can be tested
//! without a network. `HttpTransport` sends them; `Connector` builds a
//! transport from a configuration, which is how the service rebuilds its
//! connection when the configuration is replaced.

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use std::sync::Arc;

use crate::config::BlobConfig;
use crate::error::{Result, StorageError};

/// An outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL, already percent-encoded
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// Percent-encoded path component of the URL, starting with `/`
    pub fn absolute_path(&self) -> &str {
        let without_query = self.url.split('?').next().unwrap_or_default();
        let after_scheme = match without_query.find("://") {
            Some(index) => &without_query[index + 3..],
            None => without_query,
        };
        match after_scheme.find('/') {
            Some(index) => &after_scheme[index..],
            None => "/",
        }
    }

    /// Raw query string without the leading `?`
    pub fn query(&self) -> &str {
        match self.url.split_once('?') {
            Some((_, query)) => query,
            None => "",
        }
    }
}

/// A received response, body fully buffered
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, reason: &str) -> Self {
        Self {
            status,
            reason: reason.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns true if the response indicates success (2xx status code)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8 (lossy), tolerating a leading byte-order mark
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body)
            .trim_start_matches('\u{feff}')
            .to_string()
    }
}

/// Sends one request and buffers the response
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Builds the transport for a configuration
pub trait Connector: Send + Sync {
    fn connect(&self, config: &BlobConfig) -> Result<Arc<dyn HttpTransport>>;
}

/// Default connector producing a reqwest client per configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestConnector;

impl Connector for ReqwestConnector {
    fn connect(&self, config: &BlobConfig) -> Result<Arc<dyn HttpTransport>> {
        let client = reqwest::Client::builder()
            .https_only(config.use_https)
            .build()
            .map_err(|e| StorageError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Arc::new(ReqwestTransport { client }))
    }
}

/// Transport backed by a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| StorageError::backend(format!("Invalid HTTP method: {}", e)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() || request.method == Method::PUT {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StorageError::backend(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| StorageError::backend(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
