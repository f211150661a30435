//! PaySentry Breaker - Per-key circuit breaking
//!
//! Prevents cascading failures by tracking failures per target key and
//! temporarily blocking calls to targets that keep failing. Each key's
//! state machine is independent:
//!
//! - **Closed**: calls flow normally; a success clears the failure count
//! - **Open**: calls are rejected immediately with a breaker-open error
//!   carrying the remaining wait; after the recovery timeout the next call
//!   is admitted as a probe
//! - **Half-open**: a bounded number of probes are in flight; a probe
//!   success closes the breaker, a probe failure re-opens it
//!
//! Transitions happen under one lock, so a burst of failures that
//! collectively cross the threshold trips the breaker exactly once.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use paysentry_types::{PaySentryError, Result};

/// State of one breaker key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected
    Open,
    /// Probing whether the target recovered
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Breaker configuration, shared by every key
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// How long an open breaker rejects before admitting a probe
    pub recovery_timeout_ms: u64,
    /// Maximum in-flight probes while half-open
    pub half_open_max_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            half_open_max_requests: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct KeyState {
    state: BreakerState,
    failure_count: u32,
    first_failure_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    half_open_in_flight: u32,
}

impl Default for KeyState {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            first_failure_at: None,
            opened_at: None,
            half_open_in_flight: 0,
        }
    }
}

/// Read-only view of one key's breaker state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// The key
    pub key: String,
    /// Current state
    pub state: BreakerState,
    /// Consecutive failures recorded
    pub failure_count: u32,
    /// First failure of the current run
    pub first_failure_at: Option<DateTime<Utc>>,
    /// When the breaker opened
    pub opened_at: Option<DateTime<Utc>>,
}

/// The PaySentry circuit breaker
pub struct CircuitBreaker {
    config: BreakerConfig,
    keys: Mutex<HashMap<String, KeyState>>,
}

impl CircuitBreaker {
    /// Create a breaker with default configuration
    pub fn new() -> Self {
        Self::with_config(BreakerConfig::default())
    }

    /// Create a breaker with explicit configuration
    pub fn with_config(config: BreakerConfig) -> Self {
        Self {
            config,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` gated by the breaker for `key`.
    ///
    /// When the key is open, returns the breaker-open error immediately;
    /// `f` is never constructed into a call. Otherwise `f` runs and its
    /// outcome feeds the state machine; the result is passed through
    /// unchanged.
    pub async fn execute<T, F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit(key)?;

        let result = f().await;
        match &result {
            Ok(_) => self.record_success(key),
            Err(_) => self.record_failure(key),
        }
        result
    }

    fn admit(&self, key: &str) -> Result<()> {
        let mut keys = self.keys.lock();
        let entry = keys.entry(key.to_string()).or_default();

        match entry.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let opened_at = entry.opened_at.unwrap_or_else(Utc::now);
                let elapsed_ms = (Utc::now() - opened_at).num_milliseconds();
                let remaining_ms = self.config.recovery_timeout_ms as i64 - elapsed_ms;
                if remaining_ms <= 0 {
                    info!(key, "breaker half-open, admitting probe");
                    entry.state = BreakerState::HalfOpen;
                    entry.half_open_in_flight = 1;
                    Ok(())
                } else {
                    Err(PaySentryError::BreakerOpen {
                        key: key.to_string(),
                        remaining_ms,
                    })
                }
            }
            BreakerState::HalfOpen => {
                if entry.half_open_in_flight < self.config.half_open_max_requests {
                    entry.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(PaySentryError::BreakerOpen {
                        key: key.to_string(),
                        remaining_ms: 0,
                    })
                }
            }
        }
    }

    fn record_success(&self, key: &str) {
        let mut keys = self.keys.lock();
        let Some(entry) = keys.get_mut(key) else {
            return;
        };

        match entry.state {
            BreakerState::Closed => {
                entry.failure_count = 0;
                entry.first_failure_at = None;
            }
            BreakerState::HalfOpen => {
                info!(key, "breaker closed after successful probe");
                *entry = KeyState::default();
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self, key: &str) {
        let mut keys = self.keys.lock();
        let Some(entry) = keys.get_mut(key) else {
            return;
        };

        match entry.state {
            BreakerState::Closed => {
                entry.failure_count += 1;
                if entry.first_failure_at.is_none() {
                    entry.first_failure_at = Some(Utc::now());
                }
                if entry.failure_count >= self.config.failure_threshold {
                    warn!(key, failures = entry.failure_count, "breaker opened");
                    entry.state = BreakerState::Open;
                    entry.opened_at = Some(Utc::now());
                    entry.half_open_in_flight = 0;
                }
            }
            BreakerState::HalfOpen => {
                warn!(key, "breaker re-opened after failed probe");
                entry.state = BreakerState::Open;
                entry.opened_at = Some(Utc::now());
                entry.half_open_in_flight = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Current state of a key (unknown keys are closed)
    pub fn get_state(&self, key: &str) -> BreakerState {
        self.keys
            .lock()
            .get(key)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    /// Snapshot of every key the breaker has seen
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        self.keys
            .lock()
            .iter()
            .map(|(key, entry)| BreakerSnapshot {
                key: key.clone(),
                state: entry.state,
                failure_count: entry.failure_count,
                first_failure_at: entry.first_failure_at,
                opened_at: entry.opened_at,
            })
            .collect()
    }

    /// Unconditionally return one key to closed with zero counts
    pub fn reset(&self, key: &str) {
        self.keys.lock().insert(key.to_string(), KeyState::default());
    }

    /// Reset every key
    pub fn reset_all(&self) {
        self.keys.lock().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, Duration};

    fn config(threshold: u32, recovery_ms: u64) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_ms: recovery_ms,
            half_open_max_requests: 1,
        }
    }

    async fn fail(breaker: &CircuitBreaker, key: &str) -> Result<()> {
        breaker
            .execute(key, || async {
                Err(PaySentryError::facilitator("backend down"))
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, key: &str) -> Result<u32> {
        breaker.execute(key, || async { Ok(42) }).await
    }

    #[tokio::test]
    async fn test_trips_after_threshold_failures() {
        let breaker = CircuitBreaker::with_config(config(2, 5_000));

        // First two failures propagate the underlying error.
        let err = fail(&breaker, "x").await.unwrap_err();
        assert!(!err.is_breaker_open());
        let err = fail(&breaker, "x").await.unwrap_err();
        assert!(!err.is_breaker_open());
        assert_eq!(breaker.get_state("x"), BreakerState::Open);

        // The third call is rejected without invoking the function.
        let err = succeed(&breaker, "x").await.unwrap_err();
        assert!(err.is_breaker_open());
        if let PaySentryError::BreakerOpen { remaining_ms, .. } = err {
            assert!(remaining_ms > 0 && remaining_ms <= 5_000);
        }
    }

    #[tokio::test]
    async fn test_success_clears_failure_count() {
        let breaker = CircuitBreaker::with_config(config(2, 5_000));

        fail(&breaker, "x").await.unwrap_err();
        succeed(&breaker, "x").await.unwrap();
        fail(&breaker, "x").await.unwrap_err();

        // The earlier failure was cleared; one more is still below threshold.
        assert_eq!(breaker.get_state("x"), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_recovery_probe_closes_breaker() {
        let breaker = CircuitBreaker::with_config(config(1, 20));

        fail(&breaker, "x").await.unwrap_err();
        assert_eq!(breaker.get_state("x"), BreakerState::Open);

        sleep(Duration::from_millis(30)).await;
        // The next call is admitted as a probe; success closes the breaker.
        assert_eq!(succeed(&breaker, "x").await.unwrap(), 42);
        assert_eq!(breaker.get_state("x"), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let breaker = CircuitBreaker::with_config(config(1, 20));

        fail(&breaker, "x").await.unwrap_err();
        sleep(Duration::from_millis(30)).await;

        let err = fail(&breaker, "x").await.unwrap_err();
        assert!(!err.is_breaker_open()); // the probe itself ran
        assert_eq!(breaker.get_state("x"), BreakerState::Open);

        // And the re-opened breaker rejects again.
        let err = succeed(&breaker, "x").await.unwrap_err();
        assert!(err.is_breaker_open());
    }

    #[tokio::test]
    async fn test_half_open_caps_in_flight_probes() {
        let breaker = Arc::new(CircuitBreaker::with_config(config(1, 20)));

        fail(&breaker, "x").await.unwrap_err();
        sleep(Duration::from_millis(30)).await;

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let probe_breaker = breaker.clone();
        let probe = tokio::spawn(async move {
            probe_breaker
                .execute("x", || async move {
                    gate.await.ok();
                    Ok(1u32)
                })
                .await
        });

        // Give the probe a moment to be admitted.
        sleep(Duration::from_millis(10)).await;
        assert_eq!(breaker.get_state("x"), BreakerState::HalfOpen);

        // A second call while the probe is in flight is rejected.
        let err = succeed(&breaker, "x").await.unwrap_err();
        assert!(err.is_breaker_open());

        release.send(()).unwrap();
        assert_eq!(probe.await.unwrap().unwrap(), 1);
        assert_eq!(breaker.get_state("x"), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let breaker = CircuitBreaker::with_config(config(1, 5_000));

        fail(&breaker, "a").await.unwrap_err();
        assert_eq!(breaker.get_state("a"), BreakerState::Open);
        assert_eq!(breaker.get_state("b"), BreakerState::Closed);
        assert_eq!(succeed(&breaker, "b").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_reset() {
        let breaker = CircuitBreaker::with_config(config(1, 60_000));

        fail(&breaker, "x").await.unwrap_err();
        assert_eq!(breaker.get_state("x"), BreakerState::Open);

        breaker.reset("x");
        assert_eq!(breaker.get_state("x"), BreakerState::Closed);
        assert_eq!(succeed(&breaker, "x").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let breaker = CircuitBreaker::with_config(config(2, 5_000));

        fail(&breaker, "a").await.unwrap_err();
        succeed(&breaker, "b").await.unwrap();

        let mut snapshots = breaker.snapshot();
        snapshots.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].failure_count, 1);
        assert!(snapshots[0].first_failure_at.is_some());
        assert_eq!(snapshots[1].failure_count, 0);
    }
}
