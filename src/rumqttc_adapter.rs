// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The only Protocol Codec implementation shipped in this crate: binds the traits in
//! [`crate::interface`] onto `rumqttc`'s v5 `AsyncClient`/`EventLoop`.

use std::fs;

use async_trait::async_trait;
use bytes::Bytes;

use std::sync::Arc;
use std::time::Duration;

use crate::client_proxy::{self, ClientProxyHandle};
use crate::config::ClientConfig;
use crate::connection::ClientFactory;
use crate::control_packet::{Publish, PublishProperties, QoS, SubscribeProperties, UnsubscribeProperties};
use crate::error::{ConnectionErrorKind, CoreError, ProtocolErrorKind};
use crate::event_bus::EventBus;
use crate::interface::{CompletionToken, Event, MqttAck, MqttDisconnect, MqttEventLoop, MqttPubSub};

/// Concrete client handle type backing [`crate::client_proxy::ClientProxy`].
pub type RumqttcClient = rumqttc::v5::AsyncClient;
/// Concrete event loop type backing [`crate::client_proxy::ClientProxy`].
pub type RumqttcEventLoop = rumqttc::v5::EventLoop;

fn notice_error_to_core(e: rumqttc::NoticeError) -> CoreError {
    CoreError::Protocol(ProtocolErrorKind::Codec(e.to_string()))
}

fn client_error_to_core(e: rumqttc::v5::ClientError) -> CoreError {
    CoreError::Protocol(ProtocolErrorKind::Codec(e.to_string()))
}

#[async_trait]
impl MqttPubSub for RumqttcClient {
    async fn publish(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Bytes,
    ) -> Result<CompletionToken, CoreError> {
        let notice = self
            .publish(topic, qos, retain, payload)
            .await
            .map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }

    async fn publish_with_properties(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Bytes,
        properties: PublishProperties,
    ) -> Result<CompletionToken, CoreError> {
        let notice = self
            .publish_with_properties(topic, qos, retain, payload, properties)
            .await
            .map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }

    async fn subscribe(&self, topic: String, qos: QoS) -> Result<CompletionToken, CoreError> {
        let notice = self.subscribe(topic, qos).await.map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }

    async fn subscribe_with_properties(
        &self,
        topic: String,
        qos: QoS,
        properties: SubscribeProperties,
    ) -> Result<CompletionToken, CoreError> {
        let notice = self
            .subscribe_with_properties(topic, qos, properties)
            .await
            .map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }

    async fn unsubscribe(&self, topic: String) -> Result<CompletionToken, CoreError> {
        let notice = self.unsubscribe(topic).await.map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }

    async fn unsubscribe_with_properties(
        &self,
        topic: String,
        properties: UnsubscribeProperties,
    ) -> Result<CompletionToken, CoreError> {
        let notice = self
            .unsubscribe_with_properties(topic, properties)
            .await
            .map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }
}

#[async_trait]
impl MqttAck for RumqttcClient {
    async fn ack(&self, publish: &Publish) -> Result<CompletionToken, CoreError> {
        let notice = self.ack(publish).await.map_err(client_error_to_core)?;
        Ok(CompletionToken(Box::new(async move {
            notice.wait_async().await.map_err(notice_error_to_core)
        })))
    }
}

#[async_trait]
impl MqttDisconnect for RumqttcClient {
    async fn disconnect(&self) -> Result<(), CoreError> {
        self.disconnect().await.map_err(client_error_to_core)
    }
}

#[async_trait]
impl MqttEventLoop for RumqttcEventLoop {
    async fn poll(&mut self) -> Result<Event, CoreError> {
        self.poll().await.map_err(|e| {
            log::debug!("event loop poll failed: {e}");
            CoreError::ConnectionFailure(ConnectionErrorKind::Closed)
        })
    }

    fn set_clean_start(&mut self, clean_start: bool) {
        self.options.set_clean_start(clean_start);
    }
}

/// Build a connected client/event-loop pair from a [`ClientConfig`], along with the client
/// identifier actually used (either `config.client_id()` verbatim, or one freshly minted by the
/// [`crate::client_id_provider::ClientIdProvider`] if it was left empty).
///
/// # Errors
/// Returns [`CoreError::InvalidConfig`] if TLS material referenced by `config` cannot be read.
pub fn client(
    config: &ClientConfig,
    channel_capacity: usize,
) -> Result<(RumqttcClient, RumqttcEventLoop, String), CoreError> {
    let client_id = effective_client_id(config);
    let mut options = rumqttc::v5::MqttOptions::new(client_id.clone(), config.host().to_string(), config.port());
    options.set_keep_alive(std::time::Duration::from_secs(config.keep_alive().max(1)));
    options.set_connection_timeout(config.transport().connect_timeout.as_secs());
    options.set_clean_start(config.clean_session());

    if let Some(username) = config.username() {
        options.set_credentials(username, config.password().unwrap_or_default());
    }

    if let Some(tls) = &config.transport().tls {
        let tls_config = simple_tls_config(tls)?;
        options.set_transport(rumqttc::Transport::tls_with_config(tls_config));
    }

    let (rumqttc_client, event_loop) = rumqttc::v5::AsyncClient::new(options, channel_capacity);
    Ok((rumqttc_client, event_loop, client_id))
}

pub(crate) fn effective_client_id(config: &ClientConfig) -> String {
    if config.client_id().is_empty() {
        crate::client_id_provider::ClientIdProvider::shared().next_id(config.prefix())
    } else {
        config.client_id().to_string()
    }
}

/// The [`ClientFactory`] this crate ships: dials a fresh `rumqttc` client/event-loop pair and
/// spawns its command loop on every call. `pool_name` and `bus` are threaded through so the
/// spawned proxy can tag the events it emits.
pub struct RumqttcClientFactory {
    config: ClientConfig,
    pool_name: String,
    bus: Arc<EventBus>,
    channel_capacity: usize,
}

impl RumqttcClientFactory {
    /// Construct a factory that dials `config` for pool `pool_name`, dispatching events through
    /// `bus`. `channel_capacity` bounds `rumqttc`'s internal request channel.
    #[must_use]
    pub fn new(config: ClientConfig, pool_name: impl Into<String>, bus: Arc<EventBus>, channel_capacity: usize) -> Self {
        Self {
            config,
            pool_name: pool_name.into(),
            bus,
            channel_capacity,
        }
    }
}

#[async_trait]
impl ClientFactory for RumqttcClientFactory {
    async fn connect(&self) -> Result<ClientProxyHandle, CoreError> {
        let (rumqttc_client, event_loop, client_id) = client(&self.config, self.channel_capacity)?;
        let keep_alive = Duration::from_secs(self.config.keep_alive().max(1));
        Ok(client_proxy::spawn(
            rumqttc_client,
            event_loop,
            client_id,
            self.pool_name.clone(),
            keep_alive,
            Arc::clone(&self.bus),
        ))
    }
}

fn simple_tls_config(
    tls: &crate::config::TlsOptions,
) -> Result<rumqttc::TlsConfiguration, CoreError> {
    let ca = match &tls.ca_file {
        Some(path) => fs::read(path)
            .map_err(|e| CoreError::invalid_config(format!("cannot read ca_file {path}: {e}")))?,
        None => Vec::new(),
    };
    let client_auth = match (&tls.cert_file, &tls.key_file) {
        (Some(cert_path), Some(key_path)) => {
            let cert = fs::read(cert_path).map_err(|e| {
                CoreError::invalid_config(format!("cannot read cert_file {cert_path}: {e}"))
            })?;
            let key = fs::read(key_path).map_err(|e| {
                CoreError::invalid_config(format!("cannot read key_file {key_path}: {e}"))
            })?;
            Some((cert, key))
        }
        (None, None) => None,
        _ => {
            return Err(CoreError::invalid_config(
                "cert_file and key_file must be provided together",
            ));
        }
    };
    Ok(rumqttc::TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfigBuilder;

    #[test]
    fn client_builds_mqtt_options_for_plaintext_config() {
        let config = ClientConfigBuilder::default()
            .host("broker.example.com")
            .client_id("test-client")
            .build()
            .unwrap();
        let result = client(&config, 16);
        assert!(result.is_ok());
    }

    #[test]
    fn client_rejects_cert_without_matching_key() {
        let config = ClientConfigBuilder::default()
            .host("broker.example.com")
            .client_id("test-client")
            .transport(crate::config::TransportOptionsBuilder::default()
                .tls(Some(crate::config::TlsOptions {
                    ca_file: None,
                    cert_file: Some("/nonexistent/cert.pem".to_string()),
                    key_file: None,
                }))
                .build()
                .unwrap())
            .build()
            .unwrap();
        let result = client(&config, 16);
        assert!(result.is_err());
    }
}
