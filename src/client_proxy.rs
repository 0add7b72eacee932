// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Single-connection command loop: serializes every MQTT operation issued against one socket
//! and runs the receive loop that drives PUBACKs, keep-alive, and event dispatch.
//!
//! Exactly one [`ClientProxy`] task owns the underlying Protocol Codec handles; every other
//! task talks to it exclusively through a cloneable [`ClientProxyHandle`], whose methods send a
//! [`ProxyCommand`] with an embedded reply channel and await the reply. This gives FIFO
//! ordering and mutual exclusion on the socket without any lock on the socket itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::control_packet::{PublishProperties, QoS, SubscribeProperties, UnsubscribeProperties};
use crate::error::{CoreError, ProtocolErrorKind};
use crate::event_bus::{EventBus, OnDisconnectEvent, OnReceiveEvent, OnSubscribeEvent};
use crate::interface::{Event, Incoming, MqttAck, MqttDisconnect, MqttEventLoop, MqttPubSub};
use crate::topic::TopicSubscribeProperties;

/// Bound of the command channel feeding a [`ClientProxy`]'s loop. Sized to allow a modest burst
/// of concurrent callers without unbounded growth; callers beyond capacity simply await the
/// `send`, which is the serialization point the proxy is built around.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Outcome of a SUBSCRIBE, as returned to a `subscribe`/`multi_sub` caller.
pub type SubscribeResult = Result<(), CoreError>;

enum ProxyCommand {
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
        properties: Option<PublishProperties>,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    Subscribe {
        topics: HashMap<String, TopicSubscribeProperties>,
        properties: Option<SubscribeProperties>,
        reply: oneshot::Sender<SubscribeResult>,
    },
    Unsubscribe {
        topics: Vec<String>,
        properties: Option<UnsubscribeProperties>,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    MultiSub {
        topics: HashMap<String, TopicSubscribeProperties>,
        properties: Option<SubscribeProperties>,
        n: u32,
        reply: oneshot::Sender<SubscribeResult>,
    },
    Disconnect {
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
}

/// Caller-facing, cloneable handle to a running [`ClientProxy`] command loop.
#[derive(Clone)]
pub struct ClientProxyHandle {
    tx: mpsc::Sender<ProxyCommand>,
    closed: Arc<AtomicBool>,
    client_id: String,
}

impl ClientProxyHandle {
    /// The client identifier of the underlying connection.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// True once the command loop has exited (the socket is gone and the handle is unusable).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Publish one message. For QoS 1/2 this awaits the matching ack before returning.
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol(ProtocolErrorKind::DetachedProxy)`] if the command loop has
    /// already exited, or whatever error the Protocol Codec reported for the publish itself.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
        properties: Option<PublishProperties>,
    ) -> Result<(), CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProxyCommand::Publish {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
            properties,
            reply: reply_tx,
        })
        .await?;
        await_reply(reply_rx).await
    }

    /// Subscribe to a topic map in a single SUBSCRIBE packet.
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol(ProtocolErrorKind::DetachedProxy)`] if the command loop has
    /// already exited, or whatever error the Protocol Codec reported for the subscribe itself.
    pub async fn subscribe(
        &self,
        topics: HashMap<String, TopicSubscribeProperties>,
        properties: Option<SubscribeProperties>,
    ) -> SubscribeResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProxyCommand::Subscribe {
            topics,
            properties,
            reply: reply_tx,
        })
        .await?;
        await_reply(reply_rx).await
    }

    /// Unsubscribe from a set of topic filters.
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol(ProtocolErrorKind::DetachedProxy)`] if the command loop has
    /// already exited, or whatever error the Protocol Codec reported for the unsubscribe itself.
    pub async fn unsubscribe(
        &self,
        topics: Vec<String>,
        properties: Option<UnsubscribeProperties>,
    ) -> Result<(), CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProxyCommand::Unsubscribe {
            topics,
            properties,
            reply: reply_tx,
        })
        .await?;
        await_reply(reply_rx).await
    }

    /// Subscribe to the same topic map `n` times in strict sequence, on this same socket.
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol(ProtocolErrorKind::DetachedProxy)`] if the command loop has
    /// already exited, or whatever error the Protocol Codec reported for any of the `n`
    /// subscribes (the first failure aborts the remaining attempts).
    pub async fn multi_sub(
        &self,
        topics: HashMap<String, TopicSubscribeProperties>,
        properties: Option<SubscribeProperties>,
        n: u32,
    ) -> SubscribeResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProxyCommand::MultiSub {
            topics,
            properties,
            n,
            reply: reply_tx,
        })
        .await?;
        await_reply(reply_rx).await
    }

    /// Send a graceful DISCONNECT and terminate the command loop.
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol(ProtocolErrorKind::DetachedProxy)`] if the command loop has
    /// already exited.
    pub async fn disconnect(&self) -> Result<(), CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProxyCommand::Disconnect { reply: reply_tx }).await?;
        await_reply(reply_rx).await
    }

    async fn send(&self, command: ProxyCommand) -> Result<(), CoreError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoreError::Protocol(ProtocolErrorKind::DetachedProxy))
    }
}

async fn await_reply<T>(reply_rx: oneshot::Receiver<T>) -> T
where
    T: From<CoreError>,
{
    match reply_rx.await {
        Ok(result) => result,
        Err(_) => CoreError::Protocol(ProtocolErrorKind::DetachedProxy).into(),
    }
}

impl From<CoreError> for Result<(), CoreError> {
    fn from(e: CoreError) -> Self {
        Err(e)
    }
}

/// Spawn the command loop task for one connection and return the handle callers use.
///
/// `keep_alive` governs how often PINGREQ is sent when no other traffic has crossed the wire;
/// `Duration::ZERO` disables proactive keep-alive (the codec may still send its own).
pub fn spawn<C, L>(
    client: C,
    mut event_loop: L,
    client_id: String,
    pool_name: String,
    keep_alive: Duration,
    bus: Arc<EventBus>,
) -> ClientProxyHandle
where
    C: MqttPubSub + MqttAck + MqttDisconnect + Clone + Send + Sync + 'static,
    L: MqttEventLoop + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<ProxyCommand>(COMMAND_CHANNEL_CAPACITY);
    let closed = Arc::new(AtomicBool::new(false));
    let closed_in_task = closed.clone();
    let loop_client_id = client_id.clone();

    tokio::spawn(async move {
        let mut time_since_ping = Instant::now();
        loop {
            let keep_alive_deadline = if keep_alive.is_zero() {
                // Effectively disables the keep-alive branch of the select by making it never
                // fire sooner than a day out.
                Duration::from_secs(86_400)
            } else {
                keep_alive.saturating_sub(time_since_ping.elapsed())
            };

            tokio::select! {
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(ProxyCommand::Disconnect { reply }) => {
                            let result = client.disconnect().await;
                            let _ = reply.send(result);
                            break;
                        }
                        Some(cmd) => handle_command(cmd, &client).await,
                        None => break,
                    }
                }
                poll_result = event_loop.poll() => {
                    match poll_result {
                        Ok(event) => {
                            time_since_ping = Instant::now();
                            if handle_event(event, &client, &bus, &pool_name, &loop_client_id).await {
                                break;
                            }
                        }
                        Err(e) => {
                            bus.on_disconnect
                                .publish(OnDisconnectEvent {
                                    reason: e.to_string(),
                                    code: None,
                                    pool_name: pool_name.clone(),
                                    client_id: loop_client_id.clone(),
                                })
                                .await;
                            break;
                        }
                    }
                }
                () = tokio::time::sleep(keep_alive_deadline), if !keep_alive.is_zero() => {
                    // rumqttc's own event loop already manages PINGREQ internally based on
                    // MqttOptions::keep_alive; this branch exists to keep `time_since_ping`
                    // observable and to give future codecs a place to hook an explicit ping.
                    time_since_ping = Instant::now();
                }
            }
        }
        closed_in_task.store(true, Ordering::Release);
    });

    ClientProxyHandle { tx, closed, client_id }
}

async fn handle_command<C>(command: ProxyCommand, client: &C)
where
    C: MqttPubSub + MqttAck + MqttDisconnect,
{
    match command {
        ProxyCommand::Publish {
            topic,
            payload,
            qos,
            retain,
            properties,
            reply,
        } => {
            let result = async {
                let token = match properties {
                    Some(props) => client.publish_with_properties(topic, qos, retain, payload, props).await?,
                    None => client.publish(topic, qos, retain, payload).await?,
                };
                token.await
            }
            .await;
            let _ = reply.send(result);
        }
        ProxyCommand::Subscribe {
            topics,
            properties,
            reply,
        } => {
            let result = subscribe_all(client, &topics, properties.as_ref()).await;
            let _ = reply.send(result);
        }
        ProxyCommand::Unsubscribe {
            topics,
            properties,
            reply,
        } => {
            let result = unsubscribe_all(client, &topics, properties.as_ref()).await;
            let _ = reply.send(result);
        }
        ProxyCommand::MultiSub {
            topics,
            properties,
            n,
            reply,
        } => {
            let mut result = Ok(());
            for _ in 0..n {
                result = subscribe_all(client, &topics, properties.as_ref()).await;
                if result.is_err() {
                    break;
                }
            }
            let _ = reply.send(result);
        }
        ProxyCommand::Disconnect { .. } => unreachable!("handled in the select loop directly"),
    }
}

async fn subscribe_all<C: MqttPubSub>(
    client: &C,
    topics: &HashMap<String, TopicSubscribeProperties>,
    properties: Option<&SubscribeProperties>,
) -> SubscribeResult {
    for (topic, props) in topics {
        let token = match properties {
            Some(p) => {
                client
                    .subscribe_with_properties(topic.clone(), props.qos, p.clone())
                    .await?
            }
            None => client.subscribe(topic.clone(), props.qos).await?,
        };
        token.await?;
    }
    Ok(())
}

async fn unsubscribe_all<C: MqttPubSub>(
    client: &C,
    topics: &[String],
    properties: Option<&UnsubscribeProperties>,
) -> Result<(), CoreError> {
    for topic in topics {
        let token = match properties {
            Some(p) => client.unsubscribe_with_properties(topic.clone(), p.clone()).await?,
            None => client.unsubscribe(topic.clone()).await?,
        };
        token.await?;
    }
    Ok(())
}

/// Process one Protocol Codec event. Returns `true` if the loop should terminate.
async fn handle_event<C>(
    event: Event,
    client: &C,
    bus: &EventBus,
    pool_name: &str,
    client_id: &str,
) -> bool
where
    C: MqttAck,
{
    let Event::Incoming(incoming) = event else {
        return false;
    };
    match incoming {
        Incoming::Publish(publish) => {
            if publish.qos == QoS::AtLeastOnce {
                if let Err(e) = client.ack(&publish).await {
                    log::warn!("failed to ack publish on {pool_name}/{client_id}: {e}");
                }
            }
            bus.on_receive
                .publish(OnReceiveEvent {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    dup: publish.dup,
                    qos: publish.qos,
                    retain: publish.retain,
                    message_id: if publish.pkid == 0 { None } else { Some(publish.pkid) },
                    properties: publish.properties.clone(),
                    payload: publish.payload.clone(),
                })
                .await;
            false
        }
        Incoming::Disconnect(disconnect) => {
            bus.on_disconnect
                .publish(OnDisconnectEvent {
                    reason: "broker sent DISCONNECT".to_string(),
                    code: Some(disconnect.reason_code as u8),
                    pool_name: pool_name.to_string(),
                    client_id: client_id.to_string(),
                })
                .await;
            true
        }
        _ => false,
    }
}

/// Emit an [`OnSubscribeEvent`] once a subscribe's outcome is known. Split out from
/// [`subscribe_all`] so listeners (which know the pool/client identity the loop itself doesn't
/// thread through every command) can call it after a successful `ClientProxyHandle::subscribe`.
pub async fn emit_subscribe_outcome(
    bus: &EventBus,
    pool_name: String,
    client_id: String,
    topics: HashMap<String, TopicSubscribeProperties>,
    result: &SubscribeResult,
) {
    bus.on_subscribe
        .publish(OnSubscribeEvent {
            pool_name,
            client_id,
            topics,
            result: result.as_ref().map(|()| ()).map_err(std::string::ToString::to_string),
        })
        .await;
}
