//! Asynchronous function calls and variable reads
//!
//! Each call is checked on the caller's flow (input limits, credentials,
//! throttle) and then handed to its own tokio task, which owns a snapshot of
//! everything it needs. The caller's continuation runs exactly once: either
//! right away when the call is rejected, or from the task when it finishes.
//!
//! ```text
//! call_function ─► limits ─► credentials ─► throttle ─► spawn ─┐
//!       │            │            │             │              ▼
//!       │            └────────────┴─────────────┴─► continuation(failure)
//!       ▼                                                      │
//!   returns                              POST, retry on read timeout
//!                                                              ▼
//!                                                continuation(outcome)
//! ```

use cirrus_core_interface::{Connectivity, Console, HttpRequest, KeyValueStore, Transport};
use cirrus_core_resilience::clock::{Clock, DefaultClock};
use cirrus_core_resilience::{RetryPolicy, ThrottleGate};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::api::DeviceApi;
use crate::config::CloudConfig;
use crate::configurator::InteractiveConfigurator;
use crate::credentials::{CredentialStore, Credentials, NAMESPACE};
use crate::error::{CloudError, Result};
use crate::response::{parse_return_value, parse_variable_result};
use crate::store::FileStore;
use crate::terminal::TerminalConsole;
use crate::transport::ReqwestTransport;

/// Longest function or variable name the cloud accepts
pub const MAX_NAME_LEN: usize = 64;

/// Longest function argument the cloud accepts
pub const MAX_ARGUMENT_LEN: usize = 1024;

/// Return value reported for any failed function call
pub const FAILED_RETURN_VALUE: i32 = -1;

/// Final result of a function call
#[derive(Debug)]
pub struct FunctionOutcome {
    pub return_value: i32,
    pub success: bool,
    /// Why the call failed, when it did
    pub error: Option<CloudError>,
}

impl FunctionOutcome {
    pub fn succeeded(return_value: i32) -> Self {
        Self {
            return_value,
            success: true,
            error: None,
        }
    }

    pub fn failed(error: CloudError) -> Self {
        Self {
            return_value: FAILED_RETURN_VALUE,
            success: false,
            error: Some(error),
        }
    }
}

/// Final result of a variable read
#[derive(Debug)]
pub struct VariableOutcome {
    pub result: String,
    pub success: bool,
    pub error: Option<CloudError>,
}

impl VariableOutcome {
    pub fn succeeded(result: String) -> Self {
        Self {
            result,
            success: true,
            error: None,
        }
    }

    pub fn failed(error: CloudError) -> Self {
        Self {
            result: String::new(),
            success: false,
            error: Some(error),
        }
    }
}

/// Outcomes that can stand in for a call that never finished
trait Outcome: Send + 'static {
    fn failure(error: CloudError) -> Self;
}

impl Outcome for FunctionOutcome {
    fn failure(error: CloudError) -> Self {
        FunctionOutcome::failed(error)
    }
}

impl Outcome for VariableOutcome {
    fn failure(error: CloudError) -> Self {
        VariableOutcome::failed(error)
    }
}

/// Owns a continuation until it has been run
///
/// Dropping an unfinished completion (a panicking or cancelled task) still
/// delivers a failure, so the continuation cannot be lost.
struct Completion<T: Outcome> {
    continuation: Option<Box<dyn FnOnce(T) + Send>>,
}

impl<T: Outcome> Completion<T> {
    fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            continuation: Some(Box::new(continuation)),
        }
    }

    fn complete(mut self, outcome: T) {
        if let Some(continuation) = self.continuation.take() {
            continuation(outcome);
        }
    }
}

impl<T: Outcome> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(continuation) = self.continuation.take() {
            warn!("Invocation dropped before completing");
            continuation(T::failure(CloudError::Abandoned));
        }
    }
}

fn check_len(field: &'static str, value: &str, limit: usize) -> Result<()> {
    if value.len() > limit {
        return Err(CloudError::InputTooLong {
            field,
            limit,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Device cloud client
///
/// Shared by reference (usually behind an `Arc`) between the host's control
/// flow, the connection hook and the operator commands.
pub struct CloudClient<C: Clock = DefaultClock> {
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    api: DeviceApi,
    retry: RetryPolicy,
    throttle: Mutex<ThrottleGate<C>>,
    configurator: InteractiveConfigurator,
}

impl<C: Clock> fmt::Debug for CloudClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClient")
            .field("api", &self.api.base_url().as_str())
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .finish()
    }
}

impl CloudClient<DefaultClock> {
    pub fn builder(config: CloudConfig) -> CloudClientBuilder<DefaultClock> {
        CloudClientBuilder::new(config)
    }
}

impl<C> CloudClient<C>
where
    C: Clock + Send + Sync,
{
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn configurator(&self) -> &InteractiveConfigurator {
        &self.configurator
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        self.configurator.console()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Endpoint keys currently tracked by the throttle, first seen first
    pub fn throttled_endpoints(&self) -> Vec<String> {
        self.throttle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .endpoints()
            .map(str::to_string)
            .collect()
    }

    /// Current credentials, running interactive setup first if there are none
    pub async fn ensure_configured(&self) -> Result<Credentials> {
        if !self.credentials.is_configured() {
            if !self.connectivity.is_connected() {
                warn!("Not configured and network not connected");
                return Err(CloudError::NotConnected);
            }
            info!("Cloud credentials not configured, starting setup");
            self.configurator.run().await?;
        }

        let snapshot = self.credentials.snapshot();
        if snapshot.is_configured() {
            Ok(snapshot)
        } else {
            Err(CloudError::NotConfigured)
        }
    }

    fn admit(&self, kind: &str, name: &str) -> Result<()> {
        let admitted = self
            .throttle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(kind, name);
        if admitted {
            Ok(())
        } else {
            Err(CloudError::Throttled {
                endpoint: cirrus_core_resilience::endpoint_key(kind, name),
            })
        }
    }

    async fn prepare_function(&self, name: &str, argument: &str) -> Result<HttpRequest> {
        check_len("function name", name, MAX_NAME_LEN)?;
        check_len("function argument", argument, MAX_ARGUMENT_LEN)?;
        let credentials = self.ensure_configured().await?;
        self.admit("function", name)?;
        self.api.call_function(&credentials, name, argument)
    }

    async fn prepare_variable(&self, name: &str) -> Result<HttpRequest> {
        check_len("variable name", name, MAX_NAME_LEN)?;
        let credentials = self.ensure_configured().await?;
        self.admit("variable", name)?;
        self.api.get_variable(&credentials, name)
    }

    /// Call device function `name` with `argument`
    ///
    /// Returns once the call is either rejected (the continuation has
    /// already run) or running in the background (the handle resolves after
    /// the continuation has run). A response timeout is retried per the
    /// client's retry policy; nothing else is.
    pub async fn call_function<F>(
        &self,
        name: &str,
        argument: &str,
        continuation: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(FunctionOutcome) + Send + 'static,
    {
        let completion = Completion::new(continuation);

        let request = match self.prepare_function(name, argument).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Function '{}' rejected: {}", name, e);
                completion.complete(FunctionOutcome::failed(e));
                return None;
            }
        };

        let transport = Arc::clone(&self.transport);
        let retry = self.retry;
        let span = info_span!("invocation", kind = "function", name = %name);
        let label = name.to_string();

        let task = async move {
            let result = retry
                .execute(|attempt| {
                    let transport = Arc::clone(&transport);
                    let request = request.clone();
                    async move {
                        debug!(attempt, "POST {}", request.url.path());
                        let response = transport.send(request).await?;
                        if !response.is_ok() {
                            return Err(CloudError::HttpStatus(response.status));
                        }
                        parse_return_value(&response.body)
                    }
                })
                .await;

            match result {
                Ok(value) => {
                    info!("Function '{}' returned {}", label, value);
                    completion.complete(FunctionOutcome::succeeded(value));
                }
                Err(e) => {
                    warn!("Function '{}' failed: {}", label, e);
                    completion.complete(FunctionOutcome::failed(e));
                }
            }
        };

        Some(tokio::spawn(task.instrument(span)))
    }

    /// Read device variable `name`
    ///
    /// Same shape as [`call_function`](Self::call_function) with a single
    /// attempt.
    pub async fn get_variable<F>(&self, name: &str, continuation: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(VariableOutcome) + Send + 'static,
    {
        let completion = Completion::new(continuation);

        let request = match self.prepare_variable(name).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Variable '{}' rejected: {}", name, e);
                completion.complete(VariableOutcome::failed(e));
                return None;
            }
        };

        let transport = Arc::clone(&self.transport);
        let span = info_span!("invocation", kind = "variable", name = %name);
        let label = name.to_string();

        let task = async move {
            debug!("GET {}", request.url.path());
            let result = match transport.send(request).await {
                Ok(response) if response.is_ok() => parse_variable_result(&response.body),
                Ok(response) => Err(CloudError::HttpStatus(response.status)),
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(value) => {
                    info!("Variable '{}' = {}", label, value);
                    completion.complete(VariableOutcome::succeeded(value));
                }
                Err(e) => {
                    warn!("Variable '{}' failed: {}", label, e);
                    completion.complete(VariableOutcome::failed(e));
                }
            }
        };

        Some(tokio::spawn(task.instrument(span)))
    }

    /// [`call_function`](Self::call_function), awaiting the outcome
    pub async fn call_function_outcome(&self, name: &str, argument: &str) -> FunctionOutcome {
        let (tx, rx) = oneshot::channel();
        self.call_function(name, argument, move |outcome| {
            let _ = tx.send(outcome);
        })
        .await;
        rx.await
            .unwrap_or_else(|_| FunctionOutcome::failed(CloudError::Abandoned))
    }

    /// [`get_variable`](Self::get_variable), awaiting the outcome
    pub async fn get_variable_outcome(&self, name: &str) -> VariableOutcome {
        let (tx, rx) = oneshot::channel();
        self.get_variable(name, move |outcome| {
            let _ = tx.send(outcome);
        })
        .await;
        rx.await
            .unwrap_or_else(|_| VariableOutcome::failed(CloudError::Abandoned))
    }
}

/// Assembles a [`CloudClient`] from configuration and optional collaborators
pub struct CloudClientBuilder<C: Clock = DefaultClock> {
    config: CloudConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    console: Option<Arc<dyn Console>>,
    connectivity: Option<Arc<dyn Connectivity>>,
    clock: C,
}

impl CloudClientBuilder<DefaultClock> {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            console: None,
            connectivity: None,
            clock: DefaultClock::default(),
        }
    }
}

impl<C> CloudClientBuilder<C>
where
    C: Clock + Send + Sync,
{
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Credential backend; defaults to a [`FileStore`] under the store dir
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Connectivity predicate; defaults to always connected
    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Time source for the throttle gate
    pub fn clock<C2>(self, clock: C2) -> CloudClientBuilder<C2>
    where
        C2: Clock + Send + Sync,
    {
        CloudClientBuilder {
            config: self.config,
            transport: self.transport,
            store: self.store,
            console: self.console,
            connectivity: self.connectivity,
            clock,
        }
    }

    pub fn build(self) -> Result<CloudClient<C>> {
        let config = self.config;
        let api = DeviceApi::from_config(&config)?;

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(ReqwestTransport::new().accept_invalid_certs(config.accept_invalid_certs))
        });
        let console = self
            .console
            .unwrap_or_else(|| Arc::new(TerminalConsole::new()));
        let connectivity = self
            .connectivity
            .unwrap_or_else(|| Arc::new(|| true));

        let credentials = Arc::new(match self.store {
            Some(store) => CredentialStore::open(store),
            None => open_default_store(&config),
        });

        let configurator = InteractiveConfigurator::new(
            Arc::clone(&credentials),
            console,
            Arc::clone(&connectivity),
            Arc::clone(&transport),
            api.clone(),
        );

        Ok(CloudClient {
            credentials,
            transport,
            connectivity,
            api,
            retry: config.function_retry_policy(),
            throttle: Mutex::new(ThrottleGate::with_clock(config.throttle_config(), self.clock)),
            configurator,
        })
    }
}

/// File-backed credentials, or memory-only ones when the store cannot open
fn open_default_store(config: &CloudConfig) -> CredentialStore {
    let Some(dir) = config.resolved_store_dir() else {
        warn!("No home directory; credentials will not persist");
        return CredentialStore::detached();
    };

    match FileStore::open(&dir, NAMESPACE) {
        Ok(store) => CredentialStore::open(Arc::new(store)),
        Err(e) => {
            warn!("Failed to open credential store: {}", e);
            CredentialStore::detached()
        }
    }
}
