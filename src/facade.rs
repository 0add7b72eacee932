// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Public API surface: a stateless façade over a [`PoolRegistry`] that resolves a pool by name,
//! acquires a connection, invokes the proxy operation, and releases — all wrapped in
//! [`ErrorHandler::wrap_operation`] for retry/circuit-breaker protection.
//!
//! There is exactly one `Client` here, pooled throughout; an unpooled "direct" client talking to
//! a single connection was considered and deliberately not built, since every caller needing that
//! shape can register a pool with `max_connections(1)`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::client_proxy::{self, SubscribeResult};
use crate::control_packet::{PublishProperties, QoS, SubscribeProperties, UnsubscribeProperties};
use crate::error::CoreError;
use crate::error_handler::ErrorHandler;
use crate::event_bus::EventBus;
use crate::pool::PoolRegistry;
use crate::topic::TopicSubscribeProperties;

/// Public API: `subscribe`/`multi_sub`/`unsubscribe`/`publish` against a named pool, with every
/// operation routed through retry, circuit-breaker, and metrics bookkeeping.
pub struct Client {
    registry: Arc<PoolRegistry>,
    error_handler: Arc<ErrorHandler>,
    bus: Arc<EventBus>,
}

impl Client {
    /// Construct a façade over `registry`, reporting through `error_handler` and dispatching
    /// through `bus`.
    #[must_use]
    pub fn new(registry: Arc<PoolRegistry>, error_handler: Arc<ErrorHandler>, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            error_handler,
            bus,
        }
    }

    fn pool(&self, pool_name: &str) -> Result<Arc<crate::pool::Pool>, CoreError> {
        self.registry
            .get(pool_name)
            .ok_or_else(|| CoreError::invalid_config(format!("unknown pool: {pool_name:?}")))
    }

    /// Subscribe to every topic in `topics` in a single SUBSCRIBE packet.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] if `pool_name` is unregistered (not retried), or
    /// whatever error the underlying operation produced after retries/breaker are exhausted.
    pub async fn subscribe(
        &self,
        pool_name: &str,
        topics: HashMap<String, TopicSubscribeProperties>,
        properties: Option<SubscribeProperties>,
    ) -> SubscribeResult {
        let pool = self.pool(pool_name)?;
        let bus = Arc::clone(&self.bus);
        let pool_name = pool_name.to_string();

        self.error_handler
            .wrap_operation(
                || {
                    let pool = Arc::clone(&pool);
                    let bus = Arc::clone(&bus);
                    let pool_name = pool_name.clone();
                    let topics = topics.clone();
                    let properties = properties.clone();
                    async move {
                        let mut conn = pool.acquire().await?;
                        let handle = conn.get_active_connection().await?.clone();
                        let result = handle.subscribe(topics.clone(), properties).await;
                        client_proxy::emit_subscribe_outcome(
                            &bus,
                            pool_name,
                            handle.client_id().to_string(),
                            topics,
                            &result,
                        )
                        .await;
                        result
                    }
                },
                "mqtt.subscribe",
            )
            .await
    }

    /// Subscribe to the same topic map `n` times, in sequence, on the same connection.
    ///
    /// # Errors
    /// See [`Client::subscribe`].
    pub async fn multi_sub(
        &self,
        pool_name: &str,
        topics: HashMap<String, TopicSubscribeProperties>,
        properties: Option<SubscribeProperties>,
        n: u32,
    ) -> SubscribeResult {
        let pool = self.pool(pool_name)?;
        let bus = Arc::clone(&self.bus);
        let pool_name = pool_name.to_string();

        self.error_handler
            .wrap_operation(
                || {
                    let pool = Arc::clone(&pool);
                    let bus = Arc::clone(&bus);
                    let pool_name = pool_name.clone();
                    let topics = topics.clone();
                    let properties = properties.clone();
                    async move {
                        let mut conn = pool.acquire().await?;
                        let handle = conn.get_active_connection().await?.clone();
                        let result = handle.multi_sub(topics.clone(), properties, n).await;
                        client_proxy::emit_subscribe_outcome(
                            &bus,
                            pool_name,
                            handle.client_id().to_string(),
                            topics,
                            &result,
                        )
                        .await;
                        result
                    }
                },
                "mqtt.multi_sub",
            )
            .await
    }

    /// Unsubscribe from every topic filter in `topics`.
    ///
    /// # Errors
    /// See [`Client::subscribe`].
    pub async fn unsubscribe(
        &self,
        pool_name: &str,
        topics: Vec<String>,
        properties: Option<UnsubscribeProperties>,
    ) -> Result<(), CoreError> {
        let pool = self.pool(pool_name)?;

        self.error_handler
            .wrap_operation(
                || {
                    let pool = Arc::clone(&pool);
                    let topics = topics.clone();
                    let properties = properties.clone();
                    async move {
                        let mut conn = pool.acquire().await?;
                        let handle = conn.get_active_connection().await?;
                        handle.unsubscribe(topics, properties).await
                    }
                },
                "mqtt.unsubscribe",
            )
            .await
    }

    /// Publish one message. For QoS 1/2 this awaits the matching ack before returning.
    ///
    /// # Errors
    /// See [`Client::subscribe`].
    #[allow(clippy::too_many_arguments)]
    pub async fn publish(
        &self,
        pool_name: &str,
        topic: String,
        message: Bytes,
        qos: QoS,
        retain: bool,
        properties: Option<PublishProperties>,
    ) -> Result<(), CoreError> {
        let pool = self.pool(pool_name)?;

        self.error_handler
            .wrap_operation(
                || {
                    let pool = Arc::clone(&pool);
                    let topic = topic.clone();
                    let message = message.clone();
                    let properties = properties.clone();
                    async move {
                        let mut conn = pool.acquire().await?;
                        let handle = conn.get_active_connection().await?;
                        handle.publish(topic, message, qos, retain, properties).await
                    }
                },
                "mqtt.publish",
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::connection::ClientFactory;
    use crate::control_packet::RetainHandling;
    use crate::interface_mocks::{MockClient, MockEventLoop};
    use crate::metrics::Metrics;
    use async_trait::async_trait;

    struct MockFactory {
        client: MockClient,
    }

    #[async_trait]
    impl ClientFactory for MockFactory {
        async fn connect(&self) -> Result<crate::client_proxy::ClientProxyHandle, CoreError> {
            let (event_loop, _injector) = MockEventLoop::new();
            Ok(client_proxy::spawn(
                self.client.clone(),
                event_loop,
                "facade-test".to_string(),
                "pool".to_string(),
                std::time::Duration::ZERO,
                Arc::new(EventBus::new()),
            ))
        }
    }

    fn client_over(mock: MockClient) -> Client {
        let mut registry = PoolRegistry::new();
        let pool_config = PoolConfig::builder().max_connections(2usize).build().unwrap();
        let pool = crate::pool::Pool::new("default", pool_config, Arc::new(MockFactory { client: mock }));
        registry.register("default", pool);
        Client::new(Arc::new(registry), Arc::new(ErrorHandler::new(Metrics::new())), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn publish_against_unknown_pool_is_not_retried() {
        let client = client_over(MockClient::new());
        let result = client
            .publish("missing", "t".to_string(), Bytes::new(), QoS::AtMostOnce, false, None)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn publish_round_trips_through_the_pool() {
        let mock = MockClient::new();
        let client = client_over(mock.clone());
        let result = client
            .publish(
                "default",
                "sensors/a".to_string(),
                Bytes::from_static(b"hi"),
                QoS::AtMostOnce,
                false,
                None,
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(mock.publish_count(), 1);
    }

    #[tokio::test]
    async fn subscribe_emits_on_subscribe_event() {
        let mock = MockClient::new();
        let mut registry = PoolRegistry::new();
        let pool_config = PoolConfig::builder().max_connections(1usize).build().unwrap();
        let pool = crate::pool::Pool::new("default", pool_config, Arc::new(MockFactory { client: mock }));
        registry.register("default", pool);
        let bus = Arc::new(EventBus::new());
        let mut on_subscribe_rx = bus.on_subscribe.register();
        let client = Client::new(Arc::new(registry), Arc::new(ErrorHandler::new(Metrics::new())), Arc::clone(&bus));

        let mut topics = HashMap::new();
        topics.insert(
            "sensors/#".to_string(),
            TopicSubscribeProperties {
                qos: QoS::AtLeastOnce,
                no_local: false,
                retain_as_published: false,
                retain_handling: RetainHandling::SendAtSubscribe,
            },
        );
        let result = client.subscribe("default", topics, None).await;
        assert!(result.is_ok());
        let event = on_subscribe_rx.recv().await.unwrap();
        assert_eq!(event.pool_name, "default");
        assert!(event.result.is_ok());
    }
}
