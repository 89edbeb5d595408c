//! HTTPS transport boundary
//!
//! A transport performs exactly one authenticated request and reports either
//! the status code and body text, or a classified [`TransportError`]. Retry
//! decisions upstream depend only on that classification.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default connect timeout applied when a request does not set one
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default response timeout applied when a request does not set one
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(8000);

/// HTTP verbs used against the device cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single authenticated request
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: String,
    pub body: Option<String>,
    pub content_type: Option<&'static str>,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, bearer_token: impl Into<String>) -> Self {
        Self {
            method,
            url,
            bearer_token: bearer_token.into(),
            body: None,
            content_type: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Attach a URL-encoded form body
    pub fn with_form_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.content_type = Some("application/x-www-form-urlencoded");
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, response: Duration) -> Self {
        self.connect_timeout = connect;
        self.response_timeout = response;
        self
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("bearer_token", &"<redacted>")
            .field("body", &self.body)
            .field("content_type", &self.content_type)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

/// Status and body of a completed round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The device cloud signals success with exactly 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Classified transport failures
///
/// Only [`TransportError::ReadTimeout`] is considered transient: the request
/// reached the cloud but the answer did not arrive in time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect timed out")]
    ConnectTimeout,

    #[error("timed out waiting for response")]
    ReadTimeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::ReadTimeout)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectTimeout | TransportError::ReadTimeout
        )
    }
}

/// Performs HTTPS round trips
///
/// Each call is independent: implementations may open a fresh connection per
/// request and must release it before returning.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://api.particle.io/v1/devices/abc/ping").unwrap()
    }

    #[test]
    fn test_only_read_timeout_is_retryable() {
        assert!(TransportError::ReadTimeout.is_retryable());
        assert!(!TransportError::ConnectTimeout.is_retryable());
        assert!(!TransportError::Connect("refused".into()).is_retryable());
        assert!(!TransportError::Request("bad".into()).is_retryable());
        assert!(!TransportError::Body("eof".into()).is_retryable());
    }

    #[test]
    fn test_timeout_classification() {
        assert!(TransportError::ConnectTimeout.is_timeout());
        assert!(TransportError::ReadTimeout.is_timeout());
        assert!(!TransportError::Connect("refused".into()).is_timeout());
    }

    #[test]
    fn test_form_body_sets_content_type() {
        let request = HttpRequest::new(Method::Post, url(), "token").with_form_body("arg=on");
        assert_eq!(request.body.as_deref(), Some("arg=on"));
        assert_eq!(
            request.content_type,
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let request = HttpRequest::new(Method::Get, url(), "super-secret-token");
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_default_timeouts() {
        let request = HttpRequest::new(Method::Get, url(), "t");
        assert_eq!(request.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(request.response_timeout, DEFAULT_RESPONSE_TIMEOUT);
    }

    #[test]
    fn test_response_ok_is_exactly_200() {
        assert!(HttpResponse::new(200, "{}").is_ok());
        assert!(!HttpResponse::new(201, "{}").is_ok());
        assert!(!HttpResponse::new(404, "").is_ok());
    }
}
