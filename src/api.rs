//! Request builders for the device cloud REST surface
//!
//! | operation | request                                   |
//! |-----------|-------------------------------------------|
//! | ping      | `PUT  /v1/devices/{device}/ping`          |
//! | function  | `POST /v1/devices/{device}/{name}` `arg=` |
//! | variable  | `GET  /v1/devices/{device}/{name}`        |

use cirrus_core_interface::{HttpRequest, Method};
use std::time::Duration;
use url::{form_urlencoded, Url};

use crate::config::CloudConfig;
use crate::credentials::Credentials;
use crate::error::{CloudError, Result};

/// Builds authenticated requests against one API base URL
#[derive(Debug, Clone)]
pub struct DeviceApi {
    base: Url,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl DeviceApi {
    pub fn new(base: Url, connect_timeout: Duration, response_timeout: Duration) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(CloudError::Config(format!(
                "API URL cannot be a base: {}",
                base
            )));
        }
        Ok(Self {
            base,
            connect_timeout,
            response_timeout,
        })
    }

    pub fn from_config(config: &CloudConfig) -> Result<Self> {
        let base = Url::parse(&config.api_base_url)?;
        Self::new(base, config.connect_timeout(), config.http_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn device_url(&self, device_id: &str, leaf: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::Config(format!("API URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(["v1", "devices", device_id, leaf]);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, credentials: &Credentials) -> HttpRequest {
        HttpRequest::new(method, url, credentials.api_key())
            .with_timeouts(self.connect_timeout, self.response_timeout)
    }

    /// Device ping used to validate a credential pair
    pub fn ping(&self, credentials: &Credentials) -> Result<HttpRequest> {
        let url = self.device_url(credentials.device_id(), "ping")?;
        Ok(self.request(Method::Put, url, credentials))
    }

    /// Function call with the argument form-encoded as `arg`
    pub fn call_function(
        &self,
        credentials: &Credentials,
        name: &str,
        argument: &str,
    ) -> Result<HttpRequest> {
        let url = self.device_url(credentials.device_id(), name)?;
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("arg", argument)
            .finish();
        Ok(self.request(Method::Post, url, credentials).with_form_body(body))
    }

    pub fn get_variable(&self, credentials: &Credentials, name: &str) -> Result<HttpRequest> {
        let url = self.device_url(credentials.device_id(), name)?;
        Ok(self.request(Method::Get, url, credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef01234567";
    const DEVICE: &str = "e00fce68a1b2c3d4e5f60718";

    fn api(base: &str) -> DeviceApi {
        DeviceApi::new(
            Url::parse(base).unwrap(),
            Duration::from_secs(3),
            Duration::from_secs(8),
        )
        .unwrap()
    }

    fn creds() -> Credentials {
        Credentials::new(KEY, DEVICE).unwrap()
    }

    #[test]
    fn test_ping_request() {
        let request = api("https://api.particle.io").ping(&creds()).unwrap();
        assert_eq!(request.method, Method::Put);
        assert_eq!(
            request.url.as_str(),
            format!("https://api.particle.io/v1/devices/{}/ping", DEVICE)
        );
        assert_eq!(request.bearer_token, KEY);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_function_request_encodes_argument() {
        let request = api("https://api.particle.io")
            .call_function(&creds(), "led", "on & off=1")
            .unwrap();
        assert_eq!(request.method, Method::Post);
        assert!(request.url.path().ends_with("/led"));
        assert_eq!(request.body.as_deref(), Some("arg=on+%26+off%3D1"));
        assert_eq!(request.connect_timeout, Duration::from_secs(3));
        assert_eq!(request.response_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_variable_request() {
        let request = api("https://api.particle.io")
            .get_variable(&creds(), "temp")
            .unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.url.path(),
            format!("/v1/devices/{}/temp", DEVICE)
        );
    }

    #[test]
    fn test_base_with_path_prefix() {
        let request = api("http://localhost:8080/cloud/").ping(&creds()).unwrap();
        assert_eq!(
            request.url.path(),
            format!("/cloud/v1/devices/{}/ping", DEVICE)
        );
    }

    #[test]
    fn test_name_is_path_escaped() {
        let request = api("https://api.particle.io")
            .get_variable(&creds(), "a/b")
            .unwrap();
        assert!(request.url.path().ends_with("/a%2Fb"));
    }

    #[test]
    fn test_rejects_non_base_url() {
        let err = DeviceApi::new(
            Url::parse("mailto:ops@example.com").unwrap(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, CloudError::Config(_)));
    }
}
