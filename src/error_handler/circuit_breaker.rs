// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-operation circuit breaker: closed/open/half-open state machine guarding
//! [`super::ErrorHandler::wrap_operation`] from hammering a broker that is already failing.

use std::time::{Duration, Instant};

/// Failures in `Closed` state before the breaker trips to `Open`.
const FAILURE_THRESHOLD: u32 = 5;

/// How long an `Open` breaker waits before allowing a single probe attempt.
const COOLDOWN: Duration = Duration::from_secs(60);

/// The breaker's current state, as surfaced to metrics snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls are admitted; failures accumulate toward [`FAILURE_THRESHOLD`].
    Closed,
    /// Calls are rejected without touching the network until the cooldown elapses.
    Open,
    /// The cooldown elapsed; exactly one probe call is admitted to test recovery.
    HalfOpen,
}

/// What [`CircuitBreaker::before_call`] decided for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed.
    Allow,
    /// The call must fail immediately without touching the network.
    Reject {
        /// How much longer the breaker will remain open.
        retry_after: Duration,
    },
}

/// One operation's circuit breaker state. Not thread-safe on its own; owned behind the
/// `ErrorHandler`'s `Mutex<HashMap<String, CircuitBreaker>>`.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    next_attempt: Option<Instant>,
    /// Set while a `HalfOpen` probe is in flight, so concurrent callers racing the transition
    /// from `Open` to `HalfOpen` don't all get let through at once.
    probe_in_flight: bool,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            next_attempt: None,
            probe_in_flight: false,
        }
    }
}

impl CircuitBreaker {
    /// Construct a breaker in the `Closed` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a call is admitted right now, transitioning `Open` → `HalfOpen` if the
    /// cooldown has elapsed.
    pub fn before_call(&mut self) -> Admission {
        match self.state {
            BreakerState::Closed => Admission::Allow,
            BreakerState::HalfOpen => {
                if self.probe_in_flight {
                    Admission::Reject {
                        retry_after: Duration::ZERO,
                    }
                } else {
                    self.probe_in_flight = true;
                    Admission::Allow
                }
            }
            BreakerState::Open => {
                let next_attempt = self.next_attempt.unwrap_or_else(Instant::now);
                let now = Instant::now();
                if now >= next_attempt {
                    self.state = BreakerState::HalfOpen;
                    self.probe_in_flight = true;
                    Admission::Allow
                } else {
                    Admission::Reject {
                        retry_after: next_attempt - now,
                    }
                }
            }
        }
    }

    /// Record a successful call. Closes the breaker unconditionally.
    pub fn on_success(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.next_attempt = None;
        self.probe_in_flight = false;
    }

    /// Record a failed call, tripping the breaker if the threshold is reached (or immediately
    /// re-opening it if the failure occurred during a `HalfOpen` probe). Returns `true` iff this
    /// call caused a fresh transition into `Open` (a `Closed`→`Open` trip or a failed `HalfOpen`
    /// probe), so the caller can record a breaker-open event exactly once per trip rather than on
    /// every failure observed while already open.
    pub fn on_failure(&mut self) -> bool {
        self.probe_in_flight = false;
        match self.state {
            BreakerState::HalfOpen => {
                self.trip();
                true
            }
            BreakerState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= FAILURE_THRESHOLD {
                    self.trip();
                    true
                } else {
                    false
                }
            }
            BreakerState::Open => {
                // A failure observed while already open (e.g. a racing caller) just refreshes
                // the cooldown window; it is not a new trip.
                self.trip();
                false
            }
        }
    }

    fn trip(&mut self) {
        self.state = BreakerState::Open;
        self.next_attempt = Some(Instant::now() + COOLDOWN);
    }

    /// The breaker's current state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// True iff the breaker is not in its default, never-touched `Closed` state. Used by the
    /// error handler's memory-pressure reclaim to rank entries worth keeping above entries that
    /// have never seen a failure.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.state, BreakerState::Closed) || self.failure_count > 0
    }
}
