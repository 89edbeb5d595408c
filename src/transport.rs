//! HTTPS transport backed by reqwest
//!
//! Every request gets its own client, so no connection outlives the attempt
//! that opened it.

use async_trait::async_trait;
use cirrus_core_interface::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

/// Production [`Transport`]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    accept_invalid_certs: bool,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip certificate verification (self-signed test clouds)
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    fn client(&self, request: &HttpRequest) -> Result<reqwest::Client, TransportError> {
        reqwest::Client::builder()
            .connect_timeout(request.connect_timeout)
            .timeout(request.response_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
    }
}

/// Map a reqwest failure onto the transport taxonomy
fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() && err.is_connect() {
        TransportError::ConnectTimeout
    } else if err.is_timeout() {
        TransportError::ReadTimeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client(&request)?;
        debug!("{} {}", request.method, request.url);

        let mut builder = client
            .request(to_reqwest_method(request.method), request.url.clone())
            .bearer_auth(&request.bearer_token);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(&e))?;
        trace!("HTTP {} ({} bytes)", status, body.len());

        Ok(HttpResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(Method::Post), reqwest::Method::POST);
        assert_eq!(to_reqwest_method(Method::Put), reqwest::Method::PUT);
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_retryable() {
        // port 1 on loopback is closed on any sane test host
        let url = "http://127.0.0.1:1/v1/devices/x/ping".parse().unwrap();
        let request = HttpRequest::new(Method::Put, url, "token").with_timeouts(
            std::time::Duration::from_millis(500),
            std::time::Duration::from_millis(500),
        );

        let err = ReqwestTransport::new().send(request).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
