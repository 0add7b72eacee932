// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Event types emitted by a [`crate::client_proxy::ClientProxy`] and the dispatcher that fans
//! them out to registered listeners.
//!
//! Each registration gets its own bounded channel, and a publish step prunes registrations whose
//! receiver has been dropped rather than letting the registration table grow without bound.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::config::TopicConfig;
use crate::control_packet::{PublishProperties, QoS};
use crate::error::CoreError;
use crate::topic::TopicSubscribeProperties;

/// Bound of each per-listener event channel. A slow listener applies back-pressure to the
/// dispatching proxy loop rather than unboundedly growing memory.
const CHANNEL_CAPACITY: usize = 256;

/// Emitted by a [`crate::listeners::SubscribeListener`] before it calls into the Facade.
#[derive(Debug, Clone)]
pub struct SubscribeEvent {
    /// Name of the pool the subscription targets.
    pub pool_name: String,
    /// The topic configs being applied.
    pub topic_configs: Vec<TopicConfig>,
}

/// Emitted by a [`crate::listeners::PublishListener`] before it calls into the Facade.
#[derive(Debug, Clone)]
pub struct PublishEvent {
    /// Name of the pool the publish targets.
    pub pool_name: String,
    /// Topic name to publish to.
    pub topic: String,
    /// Payload to publish.
    pub message: Bytes,
    /// Requested Quality of Service.
    pub qos: QoS,
}

/// Emitted once a SUBSCRIBE's SUBACK has been received.
#[derive(Debug, Clone)]
pub struct OnSubscribeEvent {
    /// Name of the pool the subscription was issued on.
    pub pool_name: String,
    /// Client identifier of the connection that issued the subscription.
    pub client_id: String,
    /// The transformed topic map that was actually sent to the broker.
    pub topics: HashMap<String, TopicSubscribeProperties>,
    /// Whether the subscribe succeeded.
    pub result: Result<(), String>,
}

/// Emitted for every inbound PUBLISH the proxy's receive loop observes.
#[derive(Debug, Clone)]
pub struct OnReceiveEvent {
    /// Topic the message was published to.
    pub topic: String,
    /// Whether this is a retransmission (the broker's DUP flag).
    pub dup: bool,
    /// Quality of Service the message was delivered at.
    pub qos: QoS,
    /// Whether the broker's RETAIN flag was set.
    pub retain: bool,
    /// Packet identifier, present for QoS 1/2 deliveries.
    pub message_id: Option<u16>,
    /// MQTT v5 publish properties carried with the message, if any.
    pub properties: Option<PublishProperties>,
    /// Message payload.
    pub payload: Bytes,
}

/// Emitted when a connection is torn down, whether by the broker or by the local transport.
#[derive(Debug, Clone)]
pub struct OnDisconnectEvent {
    /// Human-readable reason for the disconnect.
    pub reason: String,
    /// The DISCONNECT packet's v5 reason code, when the broker sent one. `None` when the
    /// disconnect was synthesized from a transport-level event-loop error rather than an actual
    /// DISCONNECT packet.
    pub code: Option<u8>,
    /// Name of the pool the connection belonged to.
    pub pool_name: String,
    /// Client identifier of the connection that was torn down.
    pub client_id: String,
}

struct Registration<T> {
    sender: Sender<T>,
}

/// Dispatches one event type to however many listeners have registered for it, pruning
/// registrations whose receiver has already been dropped.
pub struct EventChannel<T> {
    registrations: Mutex<Vec<Registration<T>>>,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    /// Construct an empty event channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener, returning the receiving half of its dedicated channel.
    pub fn register(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.registrations
            .lock()
            .expect("event channel mutex poisoned")
            .push(Registration { sender: tx });
        rx
    }

    /// Fan `event` out to every live registration, pruning any whose receiver has been dropped.
    ///
    /// Send attempts use `try_send`: a listener that is not keeping up with its channel sees a
    /// dropped event rather than blocking the proxy's receive loop. Listeners must not stall
    /// MQTT processing.
    pub async fn publish(&self, event: T) {
        let senders: Vec<Sender<T>> = {
            let mut registrations = self.registrations.lock().expect("event channel mutex poisoned");
            registrations.retain(|r| !r.sender.is_closed());
            registrations.iter().map(|r| r.sender.clone()).collect()
        };
        for sender in senders {
            if sender.try_send(event.clone()).is_err() {
                log::debug!("event listener channel full or closed; dropping one event");
            }
        }
    }

    /// Number of currently-live registrations. Exposed for tests.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registrations
            .lock()
            .expect("event channel mutex poisoned")
            .iter()
            .filter(|r| !r.sender.is_closed())
            .count()
    }
}

/// All event channels emitted by one [`crate::client_proxy::ClientProxy`] / Facade pair.
#[derive(Default)]
pub struct EventBus {
    /// Channel for [`SubscribeEvent`].
    pub subscribe: EventChannel<SubscribeEvent>,
    /// Channel for [`PublishEvent`].
    pub publish: EventChannel<PublishEvent>,
    /// Channel for [`OnSubscribeEvent`].
    pub on_subscribe: EventChannel<OnSubscribeEvent>,
    /// Channel for [`OnReceiveEvent`].
    pub on_receive: EventChannel<OnReceiveEvent>,
    /// Channel for [`OnDisconnectEvent`].
    pub on_disconnect: EventChannel<OnDisconnectEvent>,
}

impl EventBus {
    /// Construct an empty event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Wrap a fallible callback so it can be spawned rather than awaited inline, matching the
/// teacher's auto-ack-on-drop convention of never blocking the dispatcher on caller logic.
pub fn spawn_listener_callback<F>(future: F)
where
    F: std::future::Future<Output = Result<(), CoreError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = future.await {
            log::warn!("listener callback failed: {e}");
        }
    });
}

/// Default timeout a listener's spawned callback is allowed before it is abandoned. Not enforced
/// here directly; exposed for listeners that want to wrap their own callback in
/// `tokio::time::timeout`.
pub const LISTENER_CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);
