// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide operational metrics: error classification, validation outcomes, and latency.
//!
//! [`Metrics`] is cheap to clone (an `Arc` around its inner stores) and is shared by reference
//! across the error handler, validator, and pool. It does not export to any particular backend;
//! it complements `log`-based diagnostics, queryable through [`Metrics::snapshot`] for tests and
//! operational dashboards to read.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ErrorCategory;
use crate::error_handler::BreakerState;

/// Number of most-recent latency samples retained per operation for percentile computation.
const LATENCY_SAMPLE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct ErrorRecord {
    count: u64,
    last_error: String,
    last_timestamp: Instant,
    operations: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
struct PerformanceRecord {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
    samples: Vec<Duration>,
}

impl PerformanceRecord {
    fn observe(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
        if self.samples.len() == LATENCY_SAMPLE_CAPACITY {
            self.samples.remove(0);
        }
        self.samples.push(elapsed);
    }

    fn percentile(&self, p: f64) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }
}

impl Default for PerformanceRecord {
    fn default() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            samples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ValidationRecord {
    success: u64,
    failure: u64,
    last_message: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    errors: HashMap<ErrorCategory, ErrorRecord>,
    performance: HashMap<String, PerformanceRecord>,
    validation: HashMap<String, ValidationRecord>,
    breaker_trips: HashMap<String, u64>,
}

/// A point-in-time, owned snapshot of everything recorded in a [`Metrics`] store. Taken under
/// lock, then read without holding it, so callers (tests, dashboards) never block writers.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Total errors observed, per [`ErrorCategory`], broken down by the operation that raised
    /// them.
    pub error_counts: HashMap<ErrorCategory, ErrorCategorySummary>,
    /// Per-operation latency summaries: `(count, total, min, max, p50, p95, p99)`.
    pub performance: HashMap<String, PerformanceSummary>,
    /// Per-validation-kind success/failure counts.
    pub validation: HashMap<String, (u64, u64)>,
    /// Current circuit breaker state per operation name. Empty unless populated by
    /// [`crate::error_handler::ErrorHandler::snapshot`], which is the only place that knows about
    /// live breakers; [`Metrics::snapshot`] alone always reports this empty.
    pub breaker_states: HashMap<String, BreakerState>,
    /// Number of times an operation's circuit breaker has tripped into `Open`.
    pub breaker_trips: HashMap<String, u64>,
}

/// Per-[`ErrorCategory`] error count, broken down by the operation name that raised each error.
#[derive(Debug, Clone, Default)]
pub struct ErrorCategorySummary {
    /// Total errors observed in this category, across all operations.
    pub total: u64,
    /// Errors observed in this category, keyed by operation name.
    pub by_operation: HashMap<String, u64>,
}

/// Latency summary for one operation name, as read out of a [`Metrics`] store.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceSummary {
    /// Number of observations recorded.
    pub count: u64,
    /// Sum of all observed durations.
    pub total: Duration,
    /// Shortest observed duration.
    pub min: Duration,
    /// Longest observed duration.
    pub max: Duration,
    /// 50th percentile of the retained sample window.
    pub p50: Duration,
    /// 95th percentile of the retained sample window.
    pub p95: Duration,
    /// 99th percentile of the retained sample window.
    pub p99: Duration,
}

/// Thread-safe, process-wide metrics store. Clone is cheap (shares the same inner state).
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Construct an empty metrics store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Record an error in `category`, attributed to `operation`.
    pub fn record_error(&self, category: ErrorCategory, operation: &str, message: &str) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        let record = inner.errors.entry(category).or_insert_with(|| ErrorRecord {
            count: 0,
            last_error: String::new(),
            last_timestamp: Instant::now(),
            operations: HashMap::new(),
        });
        record.count += 1;
        record.last_error = message.to_string();
        record.last_timestamp = Instant::now();
        *record.operations.entry(operation.to_string()).or_insert(0) += 1;
    }

    /// Record one latency observation for `operation`.
    pub fn record_latency(&self, operation: &str, elapsed: Duration) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        inner
            .performance
            .entry(operation.to_string())
            .or_default()
            .observe(elapsed);
    }

    /// Record a successful validation of `kind` (e.g. `"client_config"`, `"topic_config"`).
    pub fn record_validation_success(&self, kind: &str) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        inner.validation.entry(kind.to_string()).or_default().success += 1;
    }

    /// Record a failed validation of `kind`, retaining `message` as the last failure reason.
    pub fn record_validation_failure(&self, kind: &str, message: &str) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        let record = inner.validation.entry(kind.to_string()).or_default();
        record.failure += 1;
        record.last_message = Some(message.to_string());
    }

    /// Record that an operation's circuit breaker tripped into `Open`.
    pub fn record_breaker_trip(&self, operation: &str) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        *inner.breaker_trips.entry(operation.to_string()).or_insert(0) += 1;
    }

    /// Take a consistent, owned snapshot of the store's current state. `breaker_states` is always
    /// empty here; [`crate::error_handler::ErrorHandler::snapshot`] overlays it with live breaker
    /// state, since a bare [`Metrics`] store has no knowledge of breakers.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("metrics mutex poisoned");
        let error_counts = inner
            .errors
            .iter()
            .map(|(category, record)| {
                (
                    *category,
                    ErrorCategorySummary {
                        total: record.count,
                        by_operation: record.operations.clone(),
                    },
                )
            })
            .collect();
        let performance = inner
            .performance
            .iter()
            .map(|(op, record)| {
                (
                    op.clone(),
                    PerformanceSummary {
                        count: record.count,
                        total: record.total,
                        min: if record.count == 0 { Duration::ZERO } else { record.min },
                        max: record.max,
                        p50: record.percentile(0.50),
                        p95: record.percentile(0.95),
                        p99: record.percentile(0.99),
                    },
                )
            })
            .collect();
        let validation = inner
            .validation
            .iter()
            .map(|(kind, record)| (kind.clone(), (record.success, record.failure)))
            .collect();
        let breaker_trips = inner.breaker_trips.clone();
        MetricsSnapshot {
            error_counts,
            performance,
            validation,
            breaker_states: HashMap::new(),
            breaker_trips,
        }
    }
}
