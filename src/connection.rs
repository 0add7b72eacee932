// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pool-managed wrapper around one [`crate::client_proxy::ClientProxy`]: health check,
//! reconnect, and idle-time tracking. A [`Connection`] is owned by exactly one
//! [`crate::pool::Pool`] at a time; the pool hands it to callers wrapped in a
//! [`crate::pool::PooledConnection`] guard for the span of one operation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::OwnedSemaphorePermit;

use crate::client_proxy::ClientProxyHandle;
use crate::error::{ConnectionErrorKind, CoreError};

/// Builds a new [`ClientProxyHandle`] on demand. Replaces the source's dynamic `ClientFactory`
/// construction with an explicit trait object the [`crate::pool::Pool`] is given at
/// construction time; [`crate::rumqttc_adapter::RumqttcClientFactory`] is the only
/// implementation this crate ships.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Dial a new connection and spawn its command loop.
    ///
    /// # Errors
    /// Returns [`CoreError::ConnectionFailure`] if the socket or CONNECT handshake fails.
    async fn connect(&self) -> Result<ClientProxyHandle, CoreError>;
}

/// One pool slot: an optional live [`ClientProxyHandle`], the permit that reserves its place
/// against the pool's `max_connections` bound, and the bookkeeping `check()` needs.
///
/// The permit is acquired once, when the connection is first established, and held for the
/// entire lifetime of this object (across any number of `reconnect()` calls) — it represents the
/// pool slot, not the liveness of any one socket. Dropping it (via [`Connection::close`] or the
/// struct's own `Drop`) is what lets the pool hand the slot to a new connection.
pub struct Connection {
    handle: Option<ClientProxyHandle>,
    last_use: Option<Instant>,
    max_idle_time: Duration,
    factory: Arc<dyn ClientFactory>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Connection {
    /// Establish a brand-new connection for a freshly acquired pool permit.
    ///
    /// # Errors
    /// Returns [`CoreError::ConnectionFailure`] if the factory's dial fails; the permit is
    /// dropped (and the pool slot released) on that path.
    pub(crate) async fn connect_new(
        factory: Arc<dyn ClientFactory>,
        permit: OwnedSemaphorePermit,
        max_idle_time: Duration,
    ) -> Result<Self, CoreError> {
        let handle = factory.connect().await?;
        Ok(Self {
            handle: Some(handle),
            last_use: Some(Instant::now()),
            max_idle_time,
            factory,
            permit: Some(permit),
        })
    }

    /// True iff the underlying proxy is still attached to a live command loop and has not sat
    /// idle longer than `max_idle_time`.
    #[must_use]
    pub fn check(&self) -> bool {
        let live = self.handle.as_ref().is_some_and(|h| !h.is_closed());
        let fresh = self.last_use.is_some_and(|t| t.elapsed() <= self.max_idle_time);
        live && fresh
    }

    /// Return the active proxy handle, reconnecting first if [`Connection::check`] fails.
    ///
    /// # Errors
    /// Returns [`CoreError::ConnectionFailure`] if a reconnect is required and fails.
    pub async fn get_active_connection(&mut self) -> Result<&ClientProxyHandle, CoreError> {
        if !self.check() {
            self.reconnect().await?;
        }
        self.handle
            .as_ref()
            .ok_or(CoreError::ConnectionFailure(ConnectionErrorKind::Unavailable))
    }

    /// Dial a fresh [`ClientProxyHandle`] through the factory, replacing any previous (dead) one.
    /// Does not touch the pool permit: the slot this connection occupies is unchanged.
    ///
    /// # Errors
    /// Returns [`CoreError::ConnectionFailure`] if the factory's dial fails.
    pub async fn reconnect(&mut self) -> Result<(), CoreError> {
        let handle = self.factory.connect().await?;
        self.handle = Some(handle);
        self.last_use = Some(Instant::now());
        Ok(())
    }

    /// Tear down the proxy and release this connection's pool permit. Idempotent: calling this
    /// on an already-closed connection is a no-op.
    pub fn close(&mut self) {
        self.handle = None;
        self.last_use = None;
        self.permit = None;
    }

    /// Mark this connection as freshly released, so idle time is measured from now rather than
    /// from whenever its last operation started.
    pub(crate) fn reset_last_use(&mut self) {
        self.last_use = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_mocks::{MockClient, MockEventLoop};
    use crate::{client_proxy, event_bus::EventBus};
    use tokio::sync::Semaphore;

    struct MockFactory;

    #[async_trait]
    impl ClientFactory for MockFactory {
        async fn connect(&self) -> Result<ClientProxyHandle, CoreError> {
            let client = MockClient::new();
            let (event_loop, _injector) = MockEventLoop::new();
            Ok(client_proxy::spawn(
                client,
                event_loop,
                "conn-test".to_string(),
                "pool-test".to_string(),
                Duration::ZERO,
                Arc::new(EventBus::new()),
            ))
        }
    }

    async fn new_connection(max_idle_time: Duration) -> Connection {
        let semaphore = Arc::new(Semaphore::new(1));
        let permit = Arc::clone(&semaphore).try_acquire_owned().unwrap();
        Connection::connect_new(Arc::new(MockFactory), permit, max_idle_time)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_connection_passes_check() {
        let conn = new_connection(Duration::from_secs(60)).await;
        assert!(conn.check());
    }

    #[tokio::test]
    async fn connection_idle_past_max_fails_check() {
        let mut conn = new_connection(Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!conn.check());
        conn.reset_last_use();
        assert!(conn.check());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_check() {
        let mut conn = new_connection(Duration::from_secs(60)).await;
        conn.close();
        assert!(!conn.check());
        conn.close();
        assert!(!conn.check());
    }

    #[tokio::test]
    async fn get_active_connection_reconnects_dead_sockets() {
        let mut conn = new_connection(Duration::from_secs(60)).await;
        conn.handle = None;
        let handle = conn.get_active_connection().await.unwrap();
        assert!(!handle.is_closed());
    }
}
