//! Network-ready hook
//!
//! The host calls [`ConnectionHook::on_network_ready`] each time its link
//! comes up. Only the first connection of the process does anything: setup
//! runs if no credentials are stored, otherwise the current configuration is
//! reported.

use cirrus_core_resilience::clock::{Clock, DefaultClock};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::commands::show_config;
use crate::error::Result;
use crate::invoker::CloudClient;
use crate::network::NetworkStatus;

/// What the hook did for one connection event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Not the first connection; nothing done
    Ignored { connection: u64 },

    /// Credentials were already present
    Reported { device_id: String },

    /// Interactive setup ran and produced credentials
    Configured { device_id: String },
}

/// Binds a client to the host's connection events
#[derive(Debug)]
pub struct ConnectionHook<C: Clock = DefaultClock> {
    client: Arc<CloudClient<C>>,
}

impl<C> ConnectionHook<C>
where
    C: Clock + Send + Sync,
{
    pub fn new(client: Arc<CloudClient<C>>) -> Self {
        Self { client }
    }

    /// Handle link-up number `connection` (1-based)
    pub async fn on_network_ready(&self, connection: u64) -> Result<HookAction> {
        if connection != 1 {
            debug!("Reconnection #{}, configuration unchanged", connection);
            return Ok(HookAction::Ignored { connection });
        }

        let credentials = self.client.credentials().snapshot();
        if credentials.is_configured() {
            info!("Cloud configured for device {}", credentials.device_id());
            show_config(&self.client);
            return Ok(HookAction::Reported {
                device_id: credentials.device_id().to_string(),
            });
        }

        info!("Network ready and no cloud credentials stored; starting setup");
        match self.client.configurator().run().await {
            Ok(credentials) => Ok(HookAction::Configured {
                device_id: credentials.device_id().to_string(),
            }),
            Err(e) => {
                error!("Cloud setup failed: {}", e);
                Err(e)
            }
        }
    }

    /// Record a link-up on `network` and handle it
    pub async fn connected(&self, network: &NetworkStatus) -> Result<HookAction> {
        let connection = network.mark_connected();
        self.on_network_ready(connection).await
    }
}
