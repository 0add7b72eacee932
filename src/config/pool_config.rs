// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use derive_builder::Builder;

/// Bounds and timeouts governing one named connection pool.
#[derive(Debug, Clone, Copy, Builder)]
#[builder(pattern = "owned", setter(into), build_fn(validate = "Self::validate"))]
pub struct PoolConfig {
    /// Connections kept warm in the idle set even when unused (never evicted below this count).
    #[builder(default = "0")]
    pub(crate) min_connections: usize,
    /// Hard cap on total live connections (in-use plus idle), enforced by a semaphore.
    #[builder(default = "10")]
    pub(crate) max_connections: usize,
    /// Timeout for establishing a new underlying connection.
    #[builder(default = "Duration::from_secs(30)")]
    pub(crate) connect_timeout: Duration,
    /// How long `Pool::acquire` waits for a connection before failing with `PoolTimeout`.
    #[builder(default = "Duration::from_millis(500)")]
    pub(crate) wait_timeout: Duration,
    /// Interval between keep-alive PINGREQs sent by idle connections. `None` disables it.
    #[builder(default = "None")]
    pub(crate) heartbeat: Option<Duration>,
    /// Idle connections held longer than this are closed on release or background eviction.
    #[builder(default = "Duration::from_secs(300)")]
    pub(crate) max_idle_time: Duration,
}

impl PoolConfig {
    /// Connections kept warm in the idle set even when unused.
    #[must_use]
    pub fn min_connections(&self) -> usize {
        self.min_connections
    }
    /// Hard cap on total live connections.
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
    /// Timeout for establishing a new underlying connection.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
    /// How long `Pool::acquire` waits before failing with `PoolTimeout`.
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
    /// Interval between keep-alive PINGREQs sent by idle connections, if enabled.
    #[must_use]
    pub fn heartbeat(&self) -> Option<Duration> {
        self.heartbeat
    }
    /// Idle connections held longer than this are closed.
    #[must_use]
    pub fn max_idle_time(&self) -> Duration {
        self.max_idle_time
    }

    /// Convenience entry point matching the other config types' `builder()` spelling.
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

impl PoolConfigBuilder {
    /// # Errors
    /// Returns a message describing the first structural violation found.
    fn validate(&self) -> Result<(), String> {
        let min = self.min_connections.unwrap_or(0);
        let max = self.max_connections.unwrap_or(10);
        if max < min.max(1) {
            return Err(format!(
                "max_connections ({max}) must be >= max(min_connections, 1) ({})",
                min.max(1)
            ));
        }
        Ok(())
    }
}
