//! Operator commands
//!
//! Single-key commands an operator can issue against a running client:
//!
//! | key | command                  |
//! |-----|--------------------------|
//! | `I` | reconfigure credentials  |
//! | `G` | show configuration       |
//! | `N` | clear configuration      |

pub mod init;

use cirrus_core_resilience::clock::Clock;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{CloudError, Result};
use crate::invoker::CloudClient;
use crate::terminal::{heading, with_console};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Reconfigure,
    ShowConfig,
    ClearConfig,
}

impl OperatorCommand {
    pub const ALL: [OperatorCommand; 3] = [
        OperatorCommand::Reconfigure,
        OperatorCommand::ShowConfig,
        OperatorCommand::ClearConfig,
    ];

    pub fn key(&self) -> char {
        match self {
            OperatorCommand::Reconfigure => 'I',
            OperatorCommand::ShowConfig => 'G',
            OperatorCommand::ClearConfig => 'N',
        }
    }

    /// Case-insensitive key lookup
    pub fn from_key(key: char) -> Option<Self> {
        let key = key.to_ascii_uppercase();
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn description(&self) -> &'static str {
        match self {
            OperatorCommand::Reconfigure => "Reconfigure cloud credentials",
            OperatorCommand::ShowConfig => "Show current cloud configuration",
            OperatorCommand::ClearConfig => "Clear cloud configuration",
        }
    }

    /// One help line per command
    pub fn help() -> Vec<String> {
        Self::ALL
            .iter()
            .map(|c| format!("  {} - {}", c.key(), c.description()))
            .collect()
    }

    pub async fn execute<C>(&self, client: &CloudClient<C>) -> Result<()>
    where
        C: Clock + Send + Sync,
    {
        match self {
            OperatorCommand::Reconfigure => reconfigure(client).await,
            OperatorCommand::ShowConfig => {
                show_config(client);
                Ok(())
            }
            OperatorCommand::ClearConfig => clear_config(client).await,
        }
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key(), self.description())
    }
}

impl FromStr for OperatorCommand {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        let command = match (chars.next(), chars.next()) {
            (Some(key), None) => Self::from_key(key),
            _ => None,
        };
        command.ok_or_else(|| CloudError::Config(format!("unknown command '{}'", s.trim())))
    }
}

async fn reconfigure<C>(client: &CloudClient<C>) -> Result<()>
where
    C: Clock + Send + Sync,
{
    let console = client.console();
    if !client.is_connected() {
        console.println("Network not connected. Connect first, then reconfigure.");
        return Err(CloudError::NotConnected);
    }

    client.credentials().clear()?;
    let credentials = client.configurator().run().await?;
    info!("Reconfigured for device {}", credentials.device_id());
    Ok(())
}

/// Print the current configuration with the token masked
pub(crate) fn show_config<C>(client: &CloudClient<C>)
where
    C: Clock + Send + Sync,
{
    let console = client.console();
    let credentials = client.credentials().snapshot();

    console.println(&heading("=== Particle Cloud Configuration ==="));
    if credentials.is_configured() {
        console.println(&format!("API key:   {}", credentials.masked_api_key()));
        console.println(&format!("Device ID: {}", credentials.device_id()));
    } else {
        console.println("Not configured");
    }
    let storage = if client.credentials().is_persistent() {
        "persistent"
    } else {
        "memory only"
    };
    console.println(&format!("Storage:   {}", storage));
}

async fn clear_config<C>(client: &CloudClient<C>) -> Result<()>
where
    C: Clock + Send + Sync,
{
    let console = client.console();
    let credentials = client.credentials().snapshot();
    if !credentials.is_configured() {
        console.println("No cloud configuration stored.");
        return Ok(());
    }

    console.println("The following configuration will be removed:");
    console.println(&format!("  Device ID: {}", credentials.device_id()));
    console.println(&format!("  API key:   {}", credentials.masked_api_key()));

    let confirmed = with_console(console, |c| c.confirm("Confirm deletion")).await?;
    if confirmed {
        client.credentials().clear()?;
        console.println("Configuration cleared.");
    } else {
        warn!("Configuration clear cancelled");
        console.println("Deletion cancelled.");
    }
    Ok(())
}
