// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Protocol Codec boundary: the traits a concrete MQTT wire implementation must satisfy to back
//! a [`crate::client_proxy::ClientProxy`]. `rumqttc` is the only implementation shipped in this
//! crate (see [`crate::rumqttc_adapter`]), but call sites are generic over these traits so a
//! different codec could be substituted without touching pooling, topic transformation, or
//! error-handling logic.

use async_trait::async_trait;
use bytes::Bytes;

use crate::control_packet::{Publish, PublishProperties, QoS, SubscribeProperties, UnsubscribeProperties};
use crate::error::CoreError;

/// Awaitable token indicating completion of MQTT message delivery (QoS 1/2 acknowledgement).
pub struct CompletionToken(pub Box<dyn std::future::Future<Output = Result<(), CoreError>> + Send>);

impl std::future::Future for CompletionToken {
    type Output = Result<(), CoreError>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        // This struct is the sole owner of the boxed future and is never accessed from more
        // than one place at a time, so polling through the box without moving it is sound.
        let inner = unsafe { self.map_unchecked_mut(|s| &mut *s.0) };
        inner.poll(cx)
    }
}

/// Event yielded by the Protocol Codec's event loop.
pub type Event = rumqttc::v5::Event;
/// Incoming packet variant of an [`Event`].
pub type Incoming = rumqttc::v5::Incoming;
/// Outgoing packet variant of an [`Event`].
pub type Outgoing = rumqttc::Outgoing;

/// MQTT publish, subscribe, and unsubscribe operations against one broker connection.
#[async_trait]
pub trait MqttPubSub {
    /// Publish a message. For QoS 1/2, the returned [`CompletionToken`] resolves once the
    /// matching PUBACK/PUBCOMP arrives.
    async fn publish(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Bytes,
    ) -> Result<CompletionToken, CoreError>;

    /// Publish with MQTT v5 user/publish properties attached.
    async fn publish_with_properties(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Bytes,
        properties: PublishProperties,
    ) -> Result<CompletionToken, CoreError>;

    /// Subscribe to one topic filter.
    async fn subscribe(&self, topic: String, qos: QoS) -> Result<CompletionToken, CoreError>;

    /// Subscribe with MQTT v5 subscribe options/properties attached.
    async fn subscribe_with_properties(
        &self,
        topic: String,
        qos: QoS,
        properties: SubscribeProperties,
    ) -> Result<CompletionToken, CoreError>;

    /// Unsubscribe from one topic filter.
    async fn unsubscribe(&self, topic: String) -> Result<CompletionToken, CoreError>;

    /// Unsubscribe with MQTT v5 properties attached.
    async fn unsubscribe_with_properties(
        &self,
        topic: String,
        properties: UnsubscribeProperties,
    ) -> Result<CompletionToken, CoreError>;
}

/// Acknowledgement of a received QoS 1/2 publish.
#[async_trait]
pub trait MqttAck {
    /// Acknowledge a received publish.
    async fn ack(&self, publish: &Publish) -> Result<CompletionToken, CoreError>;
}

/// Graceful MQTT disconnect.
#[async_trait]
pub trait MqttDisconnect {
    /// Send DISCONNECT and release the underlying transport.
    async fn disconnect(&self) -> Result<(), CoreError>;
}

/// Drives the Protocol Codec's event loop: PINGREQ/PINGRESP, inbound PUBLISH, and connection
/// state transitions all surface here.
#[async_trait]
pub trait MqttEventLoop {
    /// Poll for the next codec [`Event`].
    async fn poll(&mut self) -> Result<Event, CoreError>;

    /// Modify the clean-session flag used on the next reconnect attempt.
    fn set_clean_start(&mut self, clean_start: bool);
}
