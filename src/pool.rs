// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded, concurrent connection pool: idle-first acquisition with a wait-timeout, background
//! idle eviction, and a purely observational per-pool connect-frequency tracker.
//!
//! One task family manages connection lifecycle: many interchangeable connections, bounded in
//! number, acquired and released per call — the shape the Facade needs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::connection::{ClientFactory, Connection};
use crate::error::CoreError;

/// How often the background eviction task scans the idle set for expired connections.
const EVICTION_TICK: Duration = Duration::from_secs(10);

/// Number of connect-attempt timestamps a [`FrequencyTracker`] retains before trimming.
const FREQUENCY_SAMPLE_CAP: usize = 1024;

/// Counts connect attempts in a rolling window. Advisory only — per this crate's resolution of
/// the source's ambiguous "frequency tracker" semantics (see `DESIGN.md`), it does not gate
/// `acquire` or `reconnect`; it exists purely for an embedding application to observe.
#[derive(Default)]
struct FrequencyTracker {
    attempts: Mutex<VecDeque<Instant>>,
}

impl FrequencyTracker {
    fn record(&self) {
        let mut attempts = self.attempts.lock().expect("frequency tracker mutex poisoned");
        attempts.push_back(Instant::now());
        while attempts.len() > FREQUENCY_SAMPLE_CAP {
            attempts.pop_front();
        }
    }

    fn count_since(&self, window: Duration) -> usize {
        let attempts = self.attempts.lock().expect("frequency tracker mutex poisoned");
        let cutoff = Instant::now().checked_sub(window).unwrap_or(Instant::now());
        attempts.iter().filter(|t| **t >= cutoff).count()
    }
}

/// A bounded, named pool of [`Connection`]s backed by a single [`ClientFactory`].
pub struct Pool {
    name: String,
    config: PoolConfig,
    factory: Arc<dyn ClientFactory>,
    idle: Mutex<VecDeque<Connection>>,
    semaphore: Arc<Semaphore>,
    notify: Notify,
    frequency: FrequencyTracker,
    draining: AtomicBool,
    eviction_task: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    /// Construct a pool and start its background idle-eviction task.
    #[must_use]
    pub fn new(name: impl Into<String>, config: PoolConfig, factory: Arc<dyn ClientFactory>) -> Arc<Self> {
        let pool = Arc::new(Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(config.max_connections())),
            idle: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            frequency: FrequencyTracker::default(),
            draining: AtomicBool::new(false),
            config,
            factory,
            eviction_task: Mutex::new(None),
        });

        let weak = Arc::downgrade(&pool);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(EVICTION_TICK);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else {
                    break;
                };
                pool.evict_idle();
            }
        });
        *pool.eviction_task.lock().expect("pool mutex poisoned") = Some(task);
        pool
    }

    /// The name this pool is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of connect attempts observed in the trailing `window`. Purely observational.
    #[must_use]
    pub fn connect_frequency(&self, window: Duration) -> usize {
        self.frequency.count_since(window)
    }

    /// Acquire a connection, reusing an idle one if available, otherwise dialing a new one if
    /// under `max_connections`, otherwise waiting up to `wait_timeout`.
    ///
    /// # Errors
    /// Returns [`CoreError::PoolTimeout`] if no connection becomes available in time, or
    /// whatever [`CoreError::ConnectionFailure`] the factory reports when dialing a new one.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, CoreError> {
        let wait_timeout = self.config.wait_timeout();
        match tokio::time::timeout(wait_timeout, self.acquire_inner()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::PoolTimeout(wait_timeout)),
        }
    }

    async fn acquire_inner(self: &Arc<Self>) -> Result<PooledConnection, CoreError> {
        loop {
            if let Some(conn) = self.try_take_idle() {
                return Ok(PooledConnection::new(Arc::clone(self), conn));
            }

            if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
                self.frequency.record();
                let conn = Connection::connect_new(
                    Arc::clone(&self.factory),
                    permit,
                    self.config.max_idle_time(),
                )
                .await?;
                return Ok(PooledConnection::new(Arc::clone(self), conn));
            }

            self.notify.notified().await;
        }
    }

    /// Pop idle connections from the back (most recently released first), discarding any that
    /// fail their health check, until a healthy one is found or the idle set is exhausted.
    fn try_take_idle(&self) -> Option<Connection> {
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        while let Some(mut conn) = idle.pop_back() {
            if conn.check() {
                return Some(conn);
            }
            conn.close();
        }
        None
    }

    /// Return a connection to the idle set, or close it (and free its pool slot) if it failed
    /// its health check or the pool is draining. Called by [`PooledConnection::drop`].
    fn release(&self, mut conn: Connection) {
        if self.draining.load(Ordering::Acquire) || !conn.check() {
            conn.close();
        } else {
            conn.reset_last_use();
            self.idle.lock().expect("pool mutex poisoned").push_back(conn);
        }
        self.notify.notify_one();
    }

    /// Close idle connections whose idle time exceeds `max_idle_time`, stopping once only
    /// `min_connections` remain — regardless of their idle time, those are kept warm.
    fn evict_idle(&self) {
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        let min = self.config.min_connections();
        while idle.len() > min {
            let Some(front) = idle.front() else { break };
            if front.check() {
                break;
            }
            if let Some(mut conn) = idle.pop_front() {
                conn.close();
            }
        }
    }

    /// Close every idle connection, stop accepting new idle entries on release, and cancel the
    /// background eviction task. In-use connections close on their next release rather than
    /// being recycled.
    pub fn shutdown(&self) {
        self.draining.store(true, Ordering::Release);
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        while let Some(mut conn) = idle.pop_front() {
            conn.close();
        }
        drop(idle);
        if let Some(task) = self.eviction_task.lock().expect("pool mutex poisoned").take() {
            task.abort();
        }
        self.notify.notify_waiters();
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Some(task) = self.eviction_task.lock().expect("pool mutex poisoned").take() {
            task.abort();
        }
    }
}

/// RAII guard around one acquired [`Connection`]. Releasing back to the pool (or closing, if it
/// failed its health check) happens unconditionally in `Drop`, which is how this crate
/// guarantees the "every acquire is paired with exactly one release" invariant without relying
/// on callers to remember to release on every exit path (success, error, or early return).
pub struct PooledConnection {
    pool: Arc<Pool>,
    conn: Option<Connection>,
}

impl PooledConnection {
    fn new(pool: Arc<Pool>, conn: Connection) -> Self {
        Self { pool, conn: Some(conn) }
    }

    /// Borrow the active proxy handle, reconnecting first if needed.
    ///
    /// # Errors
    /// Returns [`CoreError::ConnectionFailure`] if a reconnect is required and fails.
    pub async fn get_active_connection(&mut self) -> Result<&crate::client_proxy::ClientProxyHandle, CoreError> {
        self.conn
            .as_mut()
            .expect("connection taken from a live guard")
            .get_active_connection()
            .await
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Maps pool names to their [`Pool`] instances. Replaces the source's process-wide Container
/// service lookup: the embedding application builds one of these explicitly at startup and
/// passes it (behind an `Arc`) to [`crate::facade::Client::new`].
#[derive(Default)]
pub struct PoolRegistry {
    pools: std::collections::HashMap<String, Arc<Pool>>,
}

impl PoolRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the pool known as `name`.
    pub fn register(&mut self, name: impl Into<String>, pool: Arc<Pool>) {
        self.pools.insert(name.into(), pool);
    }

    /// Look up a pool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Pool>> {
        self.pools.get(name).cloned()
    }
}
