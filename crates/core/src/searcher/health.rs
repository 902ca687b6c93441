//! Per-adapter circuit breaker.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

const DEFAULT_THRESHOLD: u32 = 3;
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Point-in-time view of an adapter's health, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct HealthState {
    consecutive_failures: u32,
    last_success: Option<(Instant, DateTime<Utc>)>,
    last_failure: Option<(Instant, DateTime<Utc>)>,
}

/// Failure-counting circuit breaker owned by a single adapter.
///
/// After `threshold` consecutive failures the breaker trips and
/// [`is_healthy`](Self::is_healthy) reports false until `cooldown` has
/// elapsed since the last failure; the next observation after the cooldown
/// resets the counter and lets the adapter be tried again.
#[derive(Debug)]
pub struct HealthRecord {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<HealthState>,
}

impl HealthRecord {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_THRESHOLD, DEFAULT_COOLDOWN)
    }

    pub fn with_limits(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            state: Mutex::new(HealthState::default()),
        }
    }

    /// Record the outcome of one request.
    pub fn record(&self, success: bool) {
        let mut state = self.state.lock().unwrap();
        if success {
            state.consecutive_failures = 0;
            state.last_success = Some((Instant::now(), Utc::now()));
        } else {
            state.consecutive_failures += 1;
            state.last_failure = Some((Instant::now(), Utc::now()));
        }
    }

    /// Whether the adapter may be called.
    ///
    /// When tripped and the cooldown has expired, the counter is reset so
    /// the next request goes through.
    pub fn is_healthy(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.consecutive_failures >= self.threshold {
            let expired = state
                .last_failure
                .map(|(at, _)| at.elapsed() >= self.cooldown)
                .unwrap_or(true);
            if !expired {
                return false;
            }
            state.consecutive_failures = 0;
        }
        true
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let healthy = self.is_healthy();
        let state = self.state.lock().unwrap();
        HealthSnapshot {
            healthy,
            consecutive_failures: state.consecutive_failures,
            last_success: state.last_success.map(|(_, ts)| ts),
            last_failure: state.last_failure.map(|(_, ts)| ts),
        }
    }
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self::new()
    }
}
