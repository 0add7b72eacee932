// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retries every outward-facing operation with circuit-breaker protection and exponential
//! backoff, feeding outcomes into the shared [`Metrics`] store.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{Admission, BreakerState, CircuitBreaker};
pub use retry::RetryPolicy;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::metrics::Metrics;

/// Number of circuit breakers retained when [`ErrorHandler::maybe_reclaim`] decides to shed
/// memory. Standing in for the source's GC hint, which has no equivalent in a non-GC'd runtime.
const RECLAIM_KEEP_COUNT: usize = 10;

/// Fraction of `limit_bytes` above which [`ErrorHandler::maybe_reclaim`] sheds breaker state.
const RECLAIM_THRESHOLD: f64 = 0.80;

struct BreakerEntry {
    breaker: CircuitBreaker,
    last_touched: Instant,
}

/// Process-wide error recovery coordinator: owns one [`CircuitBreaker`] per operation name and
/// wraps fallible async operations with retry, backoff, and breaker admission control.
pub struct ErrorHandler {
    metrics: Metrics,
    breakers: Mutex<HashMap<String, BreakerEntry>>,
    retry_policies: Mutex<HashMap<String, RetryPolicy>>,
    default_policy: RetryPolicy,
}

impl ErrorHandler {
    /// Construct an error handler reporting into `metrics`.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            breakers: Mutex::new(HashMap::new()),
            retry_policies: Mutex::new(HashMap::new()),
            default_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for operation `name`.
    pub fn set_retry_policy(&self, name: &str, max_retries: u32, base_delay_ms: u64) {
        self.retry_policies.lock().expect("error handler mutex poisoned").insert(
            name.to_string(),
            RetryPolicy {
                max_retries,
                base_delay_ms,
            },
        );
    }

    fn retry_policy_for(&self, name: &str) -> RetryPolicy {
        self.retry_policies
            .lock()
            .expect("error handler mutex poisoned")
            .get(name)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Run `op`, retrying on retryable [`CoreError`]s per `name`'s retry policy, subject to that
    /// operation's circuit breaker.
    ///
    /// # Errors
    /// Returns the last error encountered once retries are exhausted, or `CoreError::BreakerOpen`
    /// if the breaker for `name` is open. `CoreError::InvalidConfig` and `CoreError::PoolTimeout`
    /// are never retried and are returned from the first (only) attempt.
    pub async fn wrap_operation<F, Fut, T>(&self, op: F, name: &str) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let policy = self.retry_policy_for(name);
        let mut attempt = 1u32;
        let start = Instant::now();

        loop {
            match self.admit(name) {
                Admission::Allow => {}
                Admission::Reject { retry_after } => {
                    return Err(CoreError::BreakerOpen {
                        operation: name.to_string(),
                        retry_after,
                    });
                }
            }

            let result = op().await;
            match result {
                Ok(value) => {
                    self.record_success(name);
                    self.metrics.record_latency(name, start.elapsed());
                    return Ok(value);
                }
                Err(CoreError::InvalidConfig { reasons }) => {
                    let err = CoreError::InvalidConfig { reasons };
                    self.metrics
                        .record_error(err.category(), name, &err.to_string());
                    self.metrics.record_latency(name, start.elapsed());
                    return Err(err);
                }
                Err(err @ (CoreError::PoolTimeout(_) | CoreError::BreakerOpen { .. })) => {
                    return Err(err);
                }
                Err(err) if err.is_retryable() => {
                    self.metrics
                        .record_error(err.category(), name, &err.to_string());
                    self.record_failure(name);

                    if attempt >= policy.max_retries {
                        self.metrics.record_latency(name, start.elapsed());
                        return Err(err);
                    }

                    let delay = policy.backoff_for_attempt(attempt);
                    log::debug!(
                        "operation {name} failed on attempt {attempt}/{}: {err}; retrying in {delay:?}",
                        policy.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    // Not retryable and not one of the special-cased variants above.
                    self.metrics
                        .record_error(err.category(), name, &err.to_string());
                    self.metrics.record_latency(name, start.elapsed());
                    return Err(err);
                }
            }
        }
    }

    fn admit(&self, name: &str) -> Admission {
        let mut breakers = self.breakers.lock().expect("error handler mutex poisoned");
        let entry = breakers.entry(name.to_string()).or_insert_with(|| BreakerEntry {
            breaker: CircuitBreaker::new(),
            last_touched: Instant::now(),
        });
        entry.last_touched = Instant::now();
        entry.breaker.before_call()
    }

    fn record_success(&self, name: &str) {
        let mut breakers = self.breakers.lock().expect("error handler mutex poisoned");
        if let Some(entry) = breakers.get_mut(name) {
            entry.breaker.on_success();
            entry.last_touched = Instant::now();
        }
    }

    fn record_failure(&self, name: &str) {
        let mut breakers = self.breakers.lock().expect("error handler mutex poisoned");
        if let Some(entry) = breakers.get_mut(name) {
            if entry.breaker.on_failure() {
                self.metrics.record_breaker_trip(name);
            }
            entry.last_touched = Instant::now();
        }
    }

    /// Current state of every operation's circuit breaker, keyed by operation name. Merged into
    /// [`ErrorHandler::snapshot`]; exposed separately for callers that only want breaker state.
    #[must_use]
    pub fn breaker_states(&self) -> HashMap<String, BreakerState> {
        self.breakers
            .lock()
            .expect("error handler mutex poisoned")
            .iter()
            .map(|(name, entry)| (name.clone(), entry.breaker.state()))
            .collect()
    }

    /// Take a [`MetricsSnapshot`] of the underlying [`Metrics`] store, overlaid with the current
    /// state of every tracked circuit breaker.
    #[must_use]
    pub fn snapshot(&self) -> crate::metrics::MetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.breaker_states = self.breaker_states();
        snapshot
    }

    /// When `process_memory_bytes` exceeds `RECLAIM_THRESHOLD` of `limit_bytes`, truncate the
    /// circuit-breaker map to its most-recently-touched [`RECLAIM_KEEP_COUNT`] entries. A no-op
    /// if either bound is unknown.
    pub fn maybe_reclaim(&self, process_memory_bytes: Option<u64>, limit_bytes: Option<u64>) {
        let (Some(used), Some(limit)) = (process_memory_bytes, limit_bytes) else {
            return;
        };
        if limit == 0 || (used as f64 / limit as f64) < RECLAIM_THRESHOLD {
            return;
        }

        let mut breakers = self.breakers.lock().expect("error handler mutex poisoned");
        if breakers.len() <= RECLAIM_KEEP_COUNT {
            return;
        }
        // Rank active breakers (tripped at least once, or mid-failure-count) ahead of untouched
        // ones, with recency as the tie-break within each group, so reclaim sheds quiet operations
        // before it sheds ones still being watched for recovery.
        let mut ranked: Vec<(String, bool, Instant)> = breakers
            .iter()
            .map(|(name, entry)| (name.clone(), entry.breaker.is_active(), entry.last_touched))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.cmp(&a.2)));
        let keep: std::collections::HashSet<String> = ranked
            .into_iter()
            .take(RECLAIM_KEEP_COUNT)
            .map(|(name, _, _)| name)
            .collect();
        let dropped = breakers.len() - keep.len();
        breakers.retain(|name, _| keep.contains(name));
        log::debug!(
            "memory pressure reclaim: dropped {dropped} idle circuit breaker(s), kept {}",
            keep.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_op_succeeds() {
        let handler = ErrorHandler::new(Metrics::new());
        let calls = AtomicU32::new(0);
        let result = handler
            .wrap_operation(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, CoreError>(42) }
                },
                "mqtt.publish",
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_config_is_never_retried() {
        let handler = ErrorHandler::new(Metrics::new());
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = handler
            .wrap_operation(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(CoreError::invalid_config("bad host")) }
                },
                "mqtt.publish",
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_exhaust_then_return_last_error() {
        let handler = ErrorHandler::new(Metrics::new());
        handler.set_retry_policy("mqtt.publish", 3, 1);
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = handler
            .wrap_operation(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(CoreError::ConnectionFailure(
                            crate::error::ConnectionErrorKind::Closed,
                        ))
                    }
                },
                "mqtt.publish",
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn breaker_opens_after_five_failures_and_rejects_without_calling_op() {
        let handler = ErrorHandler::new(Metrics::new());
        handler.set_retry_policy("mqtt.publish", 1, 1);
        for _ in 0..5 {
            let _: Result<(), CoreError> = handler
                .wrap_operation(
                    || async {
                        Err(CoreError::ConnectionFailure(
                            crate::error::ConnectionErrorKind::Closed,
                        ))
                    },
                    "mqtt.publish",
                )
                .await;
        }
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = handler
            .wrap_operation(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
                "mqtt.publish",
            )
            .await;
        assert!(matches!(result, Err(CoreError::BreakerOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn maybe_reclaim_is_noop_below_threshold() {
        let handler = ErrorHandler::new(Metrics::new());
        for i in 0..20 {
            handler.admit(&format!("op-{i}"));
        }
        handler.maybe_reclaim(Some(10), Some(1000));
        assert_eq!(
            handler.breakers.lock().unwrap().len(),
            20,
            "below-threshold usage must not trigger reclaim"
        );
    }

    #[tokio::test]
    async fn breaker_trip_is_recorded_in_snapshot() {
        let handler = ErrorHandler::new(Metrics::new());
        handler.set_retry_policy("mqtt.publish", 1, 1);
        for _ in 0..5 {
            let _: Result<(), CoreError> = handler
                .wrap_operation(
                    || async {
                        Err(CoreError::ConnectionFailure(
                            crate::error::ConnectionErrorKind::Closed,
                        ))
                    },
                    "mqtt.publish",
                )
                .await;
        }
        let snapshot = handler.snapshot();
        assert_eq!(snapshot.breaker_trips.get("mqtt.publish"), Some(&1));
        assert_eq!(
            snapshot.breaker_states.get("mqtt.publish"),
            Some(&BreakerState::Open)
        );
    }

    #[test]
    fn maybe_reclaim_truncates_above_threshold() {
        let handler = ErrorHandler::new(Metrics::new());
        for i in 0..20 {
            handler.admit(&format!("op-{i}"));
        }
        handler.maybe_reclaim(Some(900), Some(1000));
        assert_eq!(handler.breakers.lock().unwrap().len(), RECLAIM_KEEP_COUNT);
    }
}
