//! Cirrus Core Resilience: pure-logic admission control
//!
//! # Overview
//!
//! Building blocks that keep a small client polite towards a remote API and
//! tolerant of its hiccups:
//!
//! - **Throttle Gate**: per-endpoint minimum interval, fixed capacity, fail-open
//! - **Retry Policy**: bounded attempts with a fixed delay, driven by the error's
//!   own retry classification
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of HTTP, credentials or
//! storage. Time comes from a [`governor::clock::Clock`] so tests can drive it.
//!
//! ```text
//! caller ──► ThrottleGate::admit ──► (denied: fail fast)
//!                 │
//!                 ▼ admitted
//!          RetryPolicy::execute ──► attempt 1 ──► retryable? ──► delay ──► attempt 2 ...
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use cirrus_core_resilience::{RetryPolicy, Retryable, ThrottleConfig, ThrottleGate};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Timeout;
//!
//! impl Retryable for Timeout {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), Timeout> {
//! let mut gate = ThrottleGate::new(ThrottleConfig::default());
//! if gate.admit("function", "led") {
//!     let policy = RetryPolicy::new(1, Duration::from_millis(750));
//!     let value = policy.execute(|_attempt| async { Ok::<_, Timeout>(1) }).await?;
//!     assert_eq!(value, 1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod retry;
pub mod throttle;

// Re-export main types for convenience
pub use retry::{RetryPolicy, Retryable};
pub use throttle::{endpoint_key, Admission, ThrottleConfig, ThrottleGate};

/// Clock types accepted by [`ThrottleGate`]
pub use governor::clock;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use cirrus_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::retry::{RetryPolicy, Retryable};
    pub use super::throttle::{Admission, ThrottleConfig, ThrottleGate};
}
