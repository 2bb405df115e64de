//! Circuit breaker guarding calls to a possibly degraded dependency.
//!
//! The breaker moves through three states:
//!
//! - **Closed**: calls pass; consecutive failures are counted and the circuit
//!   opens once `failure_threshold` is reached.
//! - **Open**: calls are refused until `reset_timeout` has elapsed since the
//!   circuit opened.
//! - **HalfOpen**: exactly one probe call is admitted. A failed probe reopens
//!   the circuit; `success_threshold` successful probes close it.
//!
//! All transitions happen under one mutex, so concurrent `is_allowed` and
//! `record_*` calls from in-flight stages never observe a stale state.
//!
//! ## Example
//!
//! ```
//! use review_gate::circuit::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default().with_failure_threshold(2));
//! breaker.record_failure();
//! breaker.record_failure();
//! assert_eq!(breaker.state(), BreakerState::Open);
//! assert!(!breaker.is_allowed());
//! ```

pub mod registry;

pub use registry::CircuitBreakerRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default number of consecutive failures before the circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default number of successful probes before a half-open circuit closes.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;
/// Default cooldown before an open circuit admits a probe.
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;

/// Availability state of a protected operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        };
        write!(f, "{}", s)
    }
}

/// Thresholds and cooldown for a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_success_threshold() -> u32 {
    DEFAULT_SUCCESS_THRESHOLD
}

fn default_reset_timeout_ms() -> u64 {
    DEFAULT_RESET_TIMEOUT_MS
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Mutable breaker state. Only ever touched under the breaker's lock.
#[derive(Debug, Clone, Default)]
struct CircuitState {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    total_trips: u64,
    last_failure_time: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    opened_instant: Option<Instant>,
    probe_in_flight: bool,
    probe_granted: Option<Instant>,
}

impl CircuitState {
    fn grant_probe(&mut self) {
        self.probe_in_flight = true;
        self.probe_granted = Some(Instant::now());
    }

    fn release_probe(&mut self) {
        self.probe_in_flight = false;
        self.probe_granted = None;
    }

    fn trip(&mut self) {
        self.state = BreakerState::Open;
        self.total_trips += 1;
        self.success_count = 0;
        self.probe_in_flight = false;
        self.probe_granted = None;
        self.opened_at = Some(Utc::now());
        self.opened_instant = Some(Instant::now());
    }
}

/// Point-in-time snapshot of a breaker, suitable for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_trips: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub probe_in_flight: bool,
}

/// Thread-safe circuit breaker for a single protected operation.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::named("default", config)
    }

    /// Create a breaker whose name appears in log output.
    pub fn named(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CircuitState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    // A panic while holding the lock leaves the counters consistent (every
    // transition is a handful of field writes), so recover the guard.
    fn lock(&self) -> MutexGuard<'_, CircuitState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check whether a call may proceed, consuming the probe permit when the
    /// cooldown of an open circuit has elapsed.
    ///
    /// A probe whose outcome is never recorded ages out after `reset_timeout`,
    /// after which the permit is granted again.
    pub fn is_allowed(&self) -> bool {
        let mut st = self.lock();
        match st.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = st
                    .opened_instant
                    .map(|opened| opened.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.reset_timeout() {
                    st.state = BreakerState::HalfOpen;
                    st.success_count = 0;
                    st.grant_probe();
                    tracing::info!(breaker = %self.name, "circuit half-open, admitting probe");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                let stale = st
                    .probe_granted
                    .is_none_or(|granted| granted.elapsed() >= self.config.reset_timeout());
                if st.probe_in_flight && !stale {
                    return false;
                }
                if st.probe_in_flight {
                    tracing::warn!(
                        breaker = %self.name,
                        "probe outcome never recorded, admitting another"
                    );
                }
                st.grant_probe();
                true
            }
        }
    }

    pub fn record_success(&self) {
        let mut st = self.lock();
        match st.state {
            BreakerState::Closed => st.failure_count = 0,
            BreakerState::HalfOpen => {
                st.release_probe();
                st.success_count += 1;
                if st.success_count >= self.config.success_threshold {
                    st.state = BreakerState::Closed;
                    st.failure_count = 0;
                    st.success_count = 0;
                    st.opened_at = None;
                    st.opened_instant = None;
                    tracing::info!(breaker = %self.name, "circuit closed after recovery");
                }
            }
            // Late outcome from a call admitted before the circuit opened.
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut st = self.lock();
        st.last_failure_time = Some(Utc::now());
        match st.state {
            BreakerState::Closed => {
                st.failure_count += 1;
                if st.failure_count >= self.config.failure_threshold {
                    st.trip();
                    tracing::warn!(
                        breaker = %self.name,
                        failures = st.failure_count,
                        trips = st.total_trips,
                        "circuit opened"
                    );
                }
            }
            BreakerState::HalfOpen => {
                st.failure_count += 1;
                st.trip();
                tracing::warn!(
                    breaker = %self.name,
                    trips = st.total_trips,
                    "probe failed, circuit reopened"
                );
            }
            BreakerState::Open => st.failure_count += 1,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn stats(&self) -> CircuitStats {
        let st = self.lock();
        CircuitStats {
            state: st.state,
            failure_count: st.failure_count,
            success_count: st.success_count,
            total_trips: st.total_trips,
            last_failure_time: st.last_failure_time,
            opened_at: st.opened_at,
            probe_in_flight: st.probe_in_flight,
        }
    }

    /// Operator override: close the circuit and clear all counters.
    pub fn reset(&self) {
        let mut st = self.lock();
        *st = CircuitState::default();
        tracing::info!(breaker = %self.name, "circuit manually reset");
    }
}
