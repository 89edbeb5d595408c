//! Interactive credential setup
//!
//! ```text
//! PromptApiKey ──► PromptDeviceId ──► Validate ──► Committed
//!      ▲                                  │
//!      └──────────── rejected ◄───────────┘
//! ```
//!
//! The flow owns the operator console while it runs. A second flow started
//! while one is active is refused with [`CloudError::ConfiguratorBusy`].

use cirrus_core_interface::{Connectivity, Console, Transport};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::DeviceApi;
use crate::credentials::{CredentialStore, Credentials, API_KEY_LEN, DEVICE_ID_LEN};
use crate::error::{CloudError, Result};
use crate::response::{parse_online_status, DeviceStatus};
use crate::terminal::with_console;

/// Upper bound on a credential prompt line
///
/// Larger than any valid field, so over-long input is rejected rather than
/// truncated into something that looks valid.
pub const PROMPT_MAX_LEN: usize = 128;

/// Blocking prompt-validate-commit loop for the cloud credentials
pub struct InteractiveConfigurator {
    credentials: Arc<CredentialStore>,
    console: Arc<dyn Console>,
    connectivity: Arc<dyn Connectivity>,
    transport: Arc<dyn Transport>,
    api: DeviceApi,
    active: Mutex<()>,
}

impl std::fmt::Debug for InteractiveConfigurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveConfigurator")
            .field("api", &self.api.base_url().as_str())
            .field("active", &self.is_active())
            .finish()
    }
}

impl InteractiveConfigurator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        console: Arc<dyn Console>,
        connectivity: Arc<dyn Connectivity>,
        transport: Arc<dyn Transport>,
        api: DeviceApi,
    ) -> Self {
        Self {
            credentials,
            console,
            connectivity,
            transport,
            api,
            active: Mutex::new(()),
        }
    }

    /// Whether a configuration flow currently owns the console
    pub fn is_active(&self) -> bool {
        self.active.try_lock().is_err()
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    /// Prompt until a credential pair validates, then commit it
    ///
    /// Returns once credentials are accepted. Fails without reading input
    /// when the network is down, and aborts if connectivity drops between
    /// attempts or the console reaches end of input.
    pub async fn run(&self) -> Result<Credentials> {
        let _active = self
            .active
            .try_lock()
            .map_err(|_| CloudError::ConfiguratorBusy)?;

        if !self.connectivity.is_connected() {
            error!("Cannot configure credentials: network not connected");
            return Err(CloudError::NotConnected);
        }

        self.console.println("");
        self.console.println("=== Particle Cloud Configuration ===");

        loop {
            let api_key = self
                .prompt_fixed("API key", API_KEY_LEN, true)
                .await?;
            let device_id = self
                .prompt_fixed("Device ID", DEVICE_ID_LEN, false)
                .await?;
            let candidate = Credentials::new(api_key, device_id)?;

            if !self.connectivity.is_connected() {
                error!("Network lost during configuration");
                return Err(CloudError::NotConnected);
            }

            self.console.println("Validating credentials...");
            match self.validate(&candidate).await {
                Ok(status) => {
                    info!(
                        "Credentials validated for device {} (device {})",
                        candidate.device_id(),
                        status
                    );
                    self.console
                        .println(&format!("Credentials valid. Device is {}.", status));
                    if let Err(e) = self.credentials.save(candidate.clone()) {
                        error!("Failed to persist credentials, keeping them in memory: {}", e);
                    }
                    return Ok(candidate);
                }
                Err(e) => {
                    warn!("Credential validation failed: {}", e);
                    self.console
                        .println("Validation failed. Check API key and device ID.");
                }
            }
        }
    }

    /// Ping the device with `candidate`
    ///
    /// Any 200 answer accepts the pair; the reported device state is
    /// informational.
    pub async fn validate(&self, candidate: &Credentials) -> Result<DeviceStatus> {
        if !self.connectivity.is_connected() {
            return Err(CloudError::NotConnected);
        }

        let request = self.api.ping(candidate)?;
        let response = self.transport.send(request).await?;
        if !response.is_ok() {
            return Err(CloudError::HttpStatus(response.status));
        }
        Ok(parse_online_status(&response.body))
    }

    async fn prompt_fixed(&self, label: &'static str, expected: usize, secret: bool) -> Result<String> {
        loop {
            let prompt = format!("{} ({} characters)", label, expected);
            let line = with_console(&self.console, move |console| {
                if secret {
                    console.read_secret(&prompt, PROMPT_MAX_LEN)
                } else {
                    console.read_line(&prompt, PROMPT_MAX_LEN)
                }
            })
            .await?;

            let value = line.trim();
            if value.len() == expected {
                return Ok(value.to_string());
            }
            if value.is_empty() {
                continue;
            }
            self.console.println(&format!(
                "{} must be exactly {} characters (got {}).",
                label,
                expected,
                value.len()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, ScriptedConsole};
    use crate::store::MemoryStore;
    use cirrus_core_interface::TransportError;
    use std::time::Duration;
    use url::Url;

    const KEY: &str = "0123456789abcdef0123456789abcdef01234567";
    const OTHER_KEY: &str = "fedcba9876543210fedcba9876543210fedcba98";
    const DEVICE: &str = "e00fce68a1b2c3d4e5f60718";

    struct Fixture {
        configurator: InteractiveConfigurator,
        transport: MockTransport,
        console: ScriptedConsole,
        backend: MemoryStore,
        credentials: Arc<CredentialStore>,
    }

    fn fixture(connected: bool) -> Fixture {
        let transport = MockTransport::new();
        let console = ScriptedConsole::new();
        let backend = MemoryStore::new();
        let credentials = Arc::new(CredentialStore::open(Arc::new(backend.clone())));
        let api = DeviceApi::new(
            Url::parse("https://api.particle.io").unwrap(),
            Duration::from_secs(3),
            Duration::from_secs(8),
        )
        .unwrap();
        let configurator = InteractiveConfigurator::new(
            Arc::clone(&credentials),
            Arc::new(console.clone()),
            Arc::new(move || connected),
            Arc::new(transport.clone()),
            api,
        );
        Fixture {
            configurator,
            transport,
            console,
            backend,
            credentials,
        }
    }

    #[tokio::test]
    async fn test_accepts_offline_device() {
        let f = fixture(true);
        f.console.push_lines([KEY, DEVICE]);
        f.transport.push_response(200, r#"{"id":"e00f","online":false,"ok":true}"#);

        let creds = f.configurator.run().await.unwrap();
        assert_eq!(creds.device_id(), DEVICE);
        assert!(f.credentials.is_configured());
        assert_eq!(f.backend.commit_count(), 1);
        assert!(f.console.output().iter().any(|l| l.contains("offline")));
    }

    #[tokio::test]
    async fn test_rejected_pair_reprompts_without_persisting() {
        let f = fixture(true);
        f.console.push_lines([KEY, DEVICE, OTHER_KEY, DEVICE]);
        f.transport.push_response(401, r#"{"error":"invalid_token"}"#);
        f.transport.push_response(200, r#"{"online":true}"#);

        let creds = f.configurator.run().await.unwrap();
        assert_eq!(creds.api_key(), OTHER_KEY);
        assert_eq!(f.transport.call_count(), 2);
        assert_eq!(f.backend.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_reprompts() {
        let f = fixture(true);
        f.console.push_lines([KEY, DEVICE, KEY, DEVICE]);
        f.transport.push_error(TransportError::ReadTimeout);
        f.transport.push_response(200, "{}");

        assert!(f.configurator.run().await.is_ok());
        assert_eq!(f.transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_wrong_length_input_reprompts() {
        let f = fixture(true);
        let too_long = format!("{}0", KEY);
        f.console
            .push_lines(["short", too_long.as_str(), KEY, "abc", DEVICE]);
        f.transport.push_response(200, r#"{"online":true}"#);

        let creds = f.configurator.run().await.unwrap();
        assert_eq!(creds.api_key(), KEY);
        assert_eq!(f.console.prompts().len(), 5);
        assert_eq!(f.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_reprompts_silently() {
        let f = fixture(true);
        f.console.push_lines(["", KEY, "   ", DEVICE]);
        f.transport.push_response(200, r#"{"online":true}"#);

        f.configurator.run().await.unwrap();
        assert_eq!(f.console.prompts().len(), 4);
        assert!(!f
            .console
            .output()
            .iter()
            .any(|l| l.contains("must be exactly")));
    }

    #[tokio::test]
    async fn test_offline_fails_without_reading_input() {
        let f = fixture(false);
        f.console.push_lines([KEY, DEVICE]);

        assert!(matches!(
            f.configurator.run().await,
            Err(CloudError::NotConnected)
        ));
        assert!(f.console.prompts().is_empty());
        assert_eq!(f.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_end_of_input_aborts() {
        let f = fixture(true);
        f.console.push_lines([KEY]);

        assert!(matches!(f.configurator.run().await, Err(CloudError::Io(_))));
        assert!(!f.credentials.is_configured());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_credentials() {
        let f = fixture(true);
        f.backend.fail_commits(true);
        f.console.push_lines([KEY, DEVICE]);
        f.transport.push_response(200, "{}");

        assert!(f.configurator.run().await.is_ok());
        assert!(f.credentials.is_configured());
    }

    #[tokio::test]
    async fn test_reentry_is_refused() {
        let f = fixture(true);
        f.console.push_lines([KEY, DEVICE]);
        f.transport.push_response(200, "{}");
        f.transport.set_delay(Duration::from_millis(300));

        let first = f.configurator.run();
        let second = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            f.configurator.run().await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(CloudError::ConfiguratorBusy)));
        assert!(!f.configurator.is_active());
    }
}
