// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deterministic mock implementations of the [`crate::interface`] traits, used by the pool,
//! client proxy, and error handler's own tests so they don't need a live broker.
#![allow(unused_variables)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{error::SendError, unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::control_packet::{Publish, PublishProperties, QoS, SubscribeProperties, UnsubscribeProperties};
use crate::error::{ConnectionErrorKind, CoreError, ProtocolErrorKind};
use crate::interface::{CompletionToken, Event, MqttAck, MqttDisconnect, MqttEventLoop, MqttPubSub};

/// Always-ready stand-in for the inner future of a [`CompletionToken`].
struct ReadyFuture(Result<(), CoreError>);

impl std::future::Future for ReadyFuture {
    type Output = Result<(), CoreError>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        std::task::Poll::Ready(self.0.clone())
    }
}

/// Mock MQTT client for deterministic tests.
///
/// Succeeds on every call unless [`MockClient::fail_next`] has armed a failure, and records
/// every call it receives (shared across clones, since a real `AsyncClient` handle is also
/// cheaply cloneable) for assertions.
#[derive(Clone)]
pub struct MockClient {
    inner: Arc<MockClientInner>,
}

struct MockClientInner {
    fail_next: AtomicBool,
    publish_count: AtomicUsize,
    subscribe_count: AtomicUsize,
    unsubscribe_count: AtomicUsize,
    ack_count: AtomicUsize,
    disconnect_count: AtomicUsize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// Construct a mock client that succeeds on every call until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockClientInner {
                fail_next: AtomicBool::new(false),
                publish_count: AtomicUsize::new(0),
                subscribe_count: AtomicUsize::new(0),
                unsubscribe_count: AtomicUsize::new(0),
                ack_count: AtomicUsize::new(0),
                disconnect_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Arm a single failure: the next call to any `MqttPubSub`/`MqttAck`/`MqttDisconnect` method
    /// returns an error instead of succeeding, then the armed flag resets.
    pub fn fail_next(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of `publish`/`publish_with_properties` calls observed so far.
    #[must_use]
    pub fn publish_count(&self) -> usize {
        self.inner.publish_count.load(Ordering::SeqCst)
    }

    /// Number of `subscribe`/`subscribe_with_properties` calls observed so far.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of `unsubscribe`/`unsubscribe_with_properties` calls observed so far.
    #[must_use]
    pub fn unsubscribe_count(&self) -> usize {
        self.inner.unsubscribe_count.load(Ordering::SeqCst)
    }

    /// Number of `ack` calls observed so far.
    #[must_use]
    pub fn ack_count(&self) -> usize {
        self.inner.ack_count.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls observed so far.
    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.inner.disconnect_count.load(Ordering::SeqCst)
    }

    fn take_armed_failure(&self) -> Option<CoreError> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            Some(CoreError::ConnectionFailure(ConnectionErrorKind::Closed))
        } else {
            None
        }
    }

    fn completion_token(result: Result<(), CoreError>) -> CompletionToken {
        CompletionToken(Box::new(ReadyFuture(result)))
    }
}

#[async_trait]
impl MqttPubSub for MockClient {
    async fn publish(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Bytes,
    ) -> Result<CompletionToken, CoreError> {
        self.inner.publish_count.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_armed_failure() {
            return Err(e);
        }
        let _ = (topic, qos, retain, payload);
        Ok(Self::completion_token(Ok(())))
    }

    async fn publish_with_properties(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Bytes,
        properties: PublishProperties,
    ) -> Result<CompletionToken, CoreError> {
        let _ = properties;
        self.publish(topic, qos, retain, payload).await
    }

    async fn subscribe(&self, topic: String, qos: QoS) -> Result<CompletionToken, CoreError> {
        self.inner.subscribe_count.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_armed_failure() {
            return Err(e);
        }
        let _ = (topic, qos);
        Ok(Self::completion_token(Ok(())))
    }

    async fn subscribe_with_properties(
        &self,
        topic: String,
        qos: QoS,
        properties: SubscribeProperties,
    ) -> Result<CompletionToken, CoreError> {
        let _ = properties;
        self.subscribe(topic, qos).await
    }

    async fn unsubscribe(&self, topic: String) -> Result<CompletionToken, CoreError> {
        self.inner.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_armed_failure() {
            return Err(e);
        }
        let _ = topic;
        Ok(Self::completion_token(Ok(())))
    }

    async fn unsubscribe_with_properties(
        &self,
        topic: String,
        properties: UnsubscribeProperties,
    ) -> Result<CompletionToken, CoreError> {
        let _ = properties;
        self.unsubscribe(topic).await
    }
}

#[async_trait]
impl MqttAck for MockClient {
    async fn ack(&self, publish: &Publish) -> Result<CompletionToken, CoreError> {
        self.inner.ack_count.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_armed_failure() {
            return Err(e);
        }
        let _ = publish;
        Ok(Self::completion_token(Ok(())))
    }
}

#[async_trait]
impl MqttDisconnect for MockClient {
    async fn disconnect(&self) -> Result<(), CoreError> {
        self.inner.disconnect_count.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_armed_failure() {
            return Err(e);
        }
        Ok(())
    }
}

/// Mock Protocol Codec event loop: yields events injected through its paired [`EventInjector`].
pub struct MockEventLoop {
    rx: UnboundedReceiver<Event>,
}

impl MockEventLoop {
    /// Construct a mock event loop paired with an injector used to feed it events.
    #[must_use]
    pub fn new() -> (Self, EventInjector) {
        let (tx, rx) = unbounded_channel();
        (Self { rx }, EventInjector { tx })
    }
}

#[async_trait]
impl MqttEventLoop for MockEventLoop {
    async fn poll(&mut self) -> Result<Event, CoreError> {
        match self.rx.recv().await {
            Some(event) => Ok(event),
            None => Err(CoreError::Protocol(ProtocolErrorKind::DetachedProxy)),
        }
    }

    fn set_clean_start(&mut self, _clean_start: bool) {}
}

/// Feeds events into a paired [`MockEventLoop`].
#[derive(Clone)]
pub struct EventInjector {
    tx: UnboundedSender<Event>,
}

impl EventInjector {
    /// Inject an event for the paired event loop's next `poll()` to return.
    ///
    /// # Errors
    /// Returns the event back if the event loop has already been dropped.
    pub fn inject(&self, event: Event) -> Result<(), SendError<Event>> {
        self.tx.send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_succeeds_by_default() {
        let client = MockClient::new();
        let token = MqttPubSub::publish(&client, "t".to_string(), QoS::AtMostOnce, false, Bytes::new())
            .await
            .unwrap();
        assert!(token.await.is_ok());
        assert_eq!(client.publish_count(), 1);
    }

    #[tokio::test]
    async fn armed_failure_triggers_once() {
        let client = MockClient::new();
        client.fail_next();
        let first = MqttPubSub::publish(&client, "t".to_string(), QoS::AtMostOnce, false, Bytes::new()).await;
        assert!(first.is_err());
        let second = MqttPubSub::publish(&client, "t".to_string(), QoS::AtMostOnce, false, Bytes::new()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn mock_event_loop_yields_injected_events() {
        let (mut event_loop, injector) = MockEventLoop::new();
        injector
            .inject(Event::Outgoing(rumqttc::Outgoing::PingReq))
            .unwrap();
        let event = event_loop.poll().await.unwrap();
        assert!(matches!(event, Event::Outgoing(rumqttc::Outgoing::PingReq)));
    }
}
