/*!
 * Cirrus - asynchronous device cloud client
 *
 * Calls functions on, and reads variables from, devices registered with a
 * Particle-style cloud API without blocking the caller:
 * - One tokio task per call, with exactly one completion per call
 * - Per-endpoint throttling with a fixed-size, fail-open table
 * - Bounded retry of function calls whose response timed out
 * - Credential persistence with atomic commit
 * - Interactive credential setup validated against the cloud
 *
 * # Example
 *
 * ```rust,no_run
 * use cirrus::{CloudClient, CloudConfig};
 *
 * # async fn example() -> cirrus::Result<()> {
 * let client = CloudClient::builder(CloudConfig::default()).build()?;
 * client
 *     .call_function("led", "on", |outcome| {
 *         println!("led returned {} (success: {})", outcome.return_value, outcome.success);
 *     })
 *     .await;
 * # Ok(())
 * # }
 * ```
 */

pub mod api;
pub mod commands;
pub mod config;
pub mod configurator;
pub mod credentials;
pub mod error;
pub mod hook;
pub mod invoker;
pub mod logging;
pub mod mock;
pub mod network;
pub mod response;
pub mod store;
pub mod terminal;
pub mod transport;

// Re-export commonly used types
pub use commands::OperatorCommand;
pub use config::{CloudConfig, LogLevel};
pub use configurator::InteractiveConfigurator;
pub use credentials::{CredentialStore, Credentials};
pub use error::{CloudError, ErrorCategory, Result};
pub use hook::{ConnectionHook, HookAction};
pub use invoker::{CloudClient, CloudClientBuilder, FunctionOutcome, VariableOutcome};
pub use network::NetworkStatus;
pub use response::DeviceStatus;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
