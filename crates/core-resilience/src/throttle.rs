//! Per-endpoint throttle gate
//!
//! Protects the device cloud from callers that hammer the same function or
//! variable. Each distinct endpoint gets one slot in a small fixed-capacity
//! table holding the instant of its last admitted call.
//!
//! # Rules
//!
//! - A call to an endpoint seen less than `window` ago is denied, and the
//!   denial does not move the window.
//! - Otherwise the call is admitted and the endpoint's instant is refreshed.
//! - Once the table is full, endpoints not already in it are admitted without
//!   tracking (fail-open). Nothing is ever evicted.
//!
//! # Example
//!
//! ```
//! use cirrus_core_resilience::throttle::{ThrottleConfig, ThrottleGate};
//! use governor::clock::FakeRelativeClock;
//! use std::time::Duration;
//!
//! let clock = FakeRelativeClock::default();
//! let mut gate = ThrottleGate::with_clock(ThrottleConfig::default(), clock.clone());
//!
//! assert!(gate.admit("function", "led"));
//! assert!(!gate.admit("function", "led"));
//!
//! clock.advance(Duration::from_secs(10));
//! assert!(gate.admit("function", "led"));
//! ```

use governor::clock::{Clock, DefaultClock, Reference};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Throttle gate settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// When false every call is admitted and the table is never touched
    pub enabled: bool,

    /// Minimum interval between admitted calls to the same endpoint
    pub window: Duration,

    /// Number of distinct endpoints tracked
    pub capacity: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(10),
            capacity: 10,
        }
    }
}

/// Result of a gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Endpoint is tracked and its window has passed (or it was just added)
    Admitted,

    /// Table is full, endpoint admitted untracked
    Untracked,

    /// Throttling is switched off
    Bypassed,

    /// Endpoint was admitted `elapsed` ago, less than the window
    Denied { elapsed: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Denied { .. })
    }
}

/// Build the table key for an endpoint
pub fn endpoint_key(kind: &str, name: &str) -> String {
    format!("{}:{}", kind, name)
}

#[derive(Debug)]
struct ThrottleEntry<I> {
    endpoint: String,
    last_call: I,
}

/// Fixed-capacity, insertion-ordered throttle table
///
/// Not internally synchronized: callers that check from more than one flow
/// wrap the gate in a mutex so the scan-and-update runs as one step.
pub struct ThrottleGate<C: Clock = DefaultClock> {
    config: ThrottleConfig,
    clock: C,
    entries: Vec<ThrottleEntry<C::Instant>>,
}

impl<C: Clock> fmt::Debug for ThrottleGate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleGate")
            .field("config", &self.config)
            .field("endpoints", &self.endpoints().collect::<Vec<_>>())
            .finish()
    }
}

impl ThrottleGate<DefaultClock> {
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> ThrottleGate<C> {
    /// Create a gate reading time from `clock`
    pub fn with_clock(config: ThrottleConfig, clock: C) -> Self {
        let entries = Vec::with_capacity(config.capacity);
        Self {
            config,
            clock,
            entries,
        }
    }

    /// Admit or deny a call, returning only the decision
    pub fn admit(&mut self, kind: &str, name: &str) -> bool {
        self.check(kind, name).is_admitted()
    }

    /// Admit or deny a call to `kind:name`, recording admitted calls
    pub fn check(&mut self, kind: &str, name: &str) -> Admission {
        if !self.config.enabled {
            return Admission::Bypassed;
        }

        let endpoint = endpoint_key(kind, name);
        let now = self.clock.now();

        if let Some(entry) = self.entries.iter_mut().find(|e| e.endpoint == endpoint) {
            let elapsed = Duration::from(now.duration_since(entry.last_call));
            if elapsed < self.config.window {
                warn!(
                    "API throttle active for {} '{}' (called {:.1} seconds ago, minimum {} seconds)",
                    kind,
                    name,
                    elapsed.as_secs_f64(),
                    self.config.window.as_secs()
                );
                return Admission::Denied { elapsed };
            }
            entry.last_call = now;
            return Admission::Admitted;
        }

        if self.entries.len() < self.config.capacity {
            debug!("Tracking new throttle endpoint {}", endpoint);
            self.entries.push(ThrottleEntry {
                endpoint,
                last_call: now,
            });
            return Admission::Admitted;
        }

        warn!(
            "Throttle cache full ({}/{} endpoints). {} '{}' will NOT be throttled; consider raising throttle_cache_size",
            self.entries.len(),
            self.config.capacity,
            kind,
            name
        );
        Admission::Untracked
    }

    /// Number of tracked endpoints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.config.capacity
    }

    /// Tracked endpoint keys in first-seen order
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.endpoint.as_str())
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn gate(capacity: usize) -> (ThrottleGate<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let config = ThrottleConfig {
            enabled: true,
            window: Duration::from_secs(10),
            capacity,
        };
        (ThrottleGate::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_first_call_admitted() {
        let (mut gate, _clock) = gate(4);
        assert_eq!(gate.check("function", "led"), Admission::Admitted);
        assert_eq!(gate.len(), 1);
    }

    #[test]
    fn test_repeat_within_window_denied() {
        let (mut gate, clock) = gate(4);
        assert!(gate.admit("function", "led"));

        clock.advance(Duration::from_secs(3));
        assert_eq!(
            gate.check("function", "led"),
            Admission::Denied {
                elapsed: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn test_denied_calls_do_not_extend_window() {
        let (mut gate, clock) = gate(4);
        assert!(gate.admit("variable", "temp"));

        for _ in 0..9 {
            clock.advance(Duration::from_secs(1));
            assert!(!gate.admit("variable", "temp"));
        }

        // 10s after the last admitted call, regardless of the denials
        clock.advance(Duration::from_secs(1));
        assert!(gate.admit("variable", "temp"));

        // and the window restarts from this admission
        clock.advance(Duration::from_millis(9_999));
        assert!(!gate.admit("variable", "temp"));
        clock.advance(Duration::from_millis(1));
        assert!(gate.admit("variable", "temp"));
    }

    #[test]
    fn test_kinds_are_separate_endpoints() {
        let (mut gate, _clock) = gate(4);
        assert!(gate.admit("function", "state"));
        assert!(gate.admit("variable", "state"));
        assert!(!gate.admit("function", "state"));
        assert_eq!(gate.len(), 2);
    }

    #[test]
    fn test_full_cache_fails_open() {
        let (mut gate, _clock) = gate(2);
        assert!(gate.admit("function", "a"));
        assert!(gate.admit("function", "b"));
        assert!(gate.is_full());

        // new endpoints are never throttled once the table is full
        for _ in 0..5 {
            assert_eq!(gate.check("function", "c"), Admission::Untracked);
        }
        assert_eq!(gate.len(), 2);

        // existing entries keep being enforced
        assert!(!gate.admit("function", "a"));
        assert!(!gate.admit("function", "b"));
    }

    #[test]
    fn test_full_cache_existing_entries_recover_after_window() {
        let (mut gate, clock) = gate(1);
        assert!(gate.admit("function", "a"));
        assert!(gate.admit("function", "b"));

        clock.advance(Duration::from_secs(10));
        assert_eq!(gate.check("function", "a"), Admission::Admitted);
        assert_eq!(gate.endpoints().collect::<Vec<_>>(), vec!["function:a"]);
    }

    #[test]
    fn test_disabled_gate_never_tracks() {
        let clock = FakeRelativeClock::default();
        let config = ThrottleConfig {
            enabled: false,
            ..Default::default()
        };
        let mut gate = ThrottleGate::with_clock(config, clock);

        for _ in 0..3 {
            assert_eq!(gate.check("function", "led"), Admission::Bypassed);
        }
        assert!(gate.is_empty());
    }

    #[test]
    fn test_endpoints_keep_first_seen_order() {
        let (mut gate, clock) = gate(4);
        gate.admit("variable", "z");
        gate.admit("function", "a");
        clock.advance(Duration::from_secs(20));
        gate.admit("variable", "z");

        let keys: Vec<_> = gate.endpoints().collect();
        assert_eq!(keys, vec!["variable:z", "function:a"]);
    }

    #[test]
    fn test_endpoint_key_format() {
        assert_eq!(endpoint_key("function", "led"), "function:led");
    }

    #[test]
    fn test_default_config() {
        let config = ThrottleConfig::default();
        assert!(config.enabled);
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.capacity, 10);
    }
}
