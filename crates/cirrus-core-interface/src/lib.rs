//! Cirrus Core Interface: boundaries between the invocation core and the host
//!
//! The invocation core never talks to the network, the disk or the operator
//! directly. It goes through four narrow seams defined here:
//!
//! 1. **Transport**: one authenticated HTTPS round trip per call
//! 2. **KeyValueStore**: namespaced persistent records with explicit commit
//! 3. **Console**: blocking line-oriented operator input
//! 4. **Connectivity**: "is the network up right now?"
//!
//! # Example
//!
//! ```rust,no_run
//! use cirrus_core_interface::{HttpRequest, Method, Transport};
//! use std::time::Duration;
//!
//! async fn ping<T: Transport>(transport: &T) -> anyhow::Result<u16> {
//!     let url = "https://api.particle.io/v1/devices/0123/ping".parse()?;
//!     let request = HttpRequest::new(Method::Put, url, "token")
//!         .with_timeouts(Duration::from_secs(3), Duration::from_secs(8));
//!     let response = transport.send(request).await?;
//!     Ok(response.status)
//! }
//! ```
//!
//! Implementations must be `Send + Sync` so a single instance can be shared by
//! the control flow and every in-flight invocation task.

pub mod console;
pub mod store;
pub mod transport;

pub use console::{normalize_line, Console};
pub use store::{KeyValueStore, StoreError};
pub use transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

/// Network reachability predicate
///
/// Checked before any operation that needs the remote API. Closures can be
/// used directly:
///
/// ```
/// use cirrus_core_interface::Connectivity;
///
/// let always_up = || true;
/// assert!(always_up.is_connected());
/// ```
pub trait Connectivity: Send + Sync {
    /// Whether the host currently has a usable network link
    fn is_connected(&self) -> bool;
}

impl<F> Connectivity for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_connected(&self) -> bool {
        self()
    }
}
