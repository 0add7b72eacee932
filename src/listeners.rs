// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Translates declarative [`TopicConfig`]/event-bus traffic into Facade calls: expands shared and
//! queue subscriptions, folds multi-subscribe counts into batched calls, and validates every
//! config before it reaches the wire.
//!
//! Each listener's `run` loop only ever does channel bookkeeping; the Facade call itself is
//! spawned via [`spawn_listener_callback`] so a slow broker round-trip never backs up the event
//! bus dispatcher that feeds it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use crate::config::TopicConfig;
use crate::event_bus::{spawn_listener_callback, PublishEvent, SubscribeEvent};
use crate::facade::Client;
use crate::topic::{generate_queue_topic, generate_share_topic, TopicSubscribeProperties};
use crate::validator::Validator;

/// Consumes [`SubscribeEvent`]s, applying share/queue/multi-sub topic transformations before
/// calling into the Facade.
pub struct SubscribeListener {
    facade: Arc<Client>,
    validator: Validator,
}

impl SubscribeListener {
    /// Construct a listener that issues subscribes through `facade`, validating configs with
    /// `validator` first.
    #[must_use]
    pub fn new(facade: Arc<Client>, validator: Validator) -> Self {
        Self { facade, validator }
    }

    /// Drain `rx` until the sending half is dropped, spawning one [`SubscribeListener::apply`]
    /// task per received event so a slow subscribe never delays the next event's arrival.
    pub async fn run(self: Arc<Self>, mut rx: Receiver<SubscribeEvent>) {
        while let Some(event) = rx.recv().await {
            let listener = Arc::clone(&self);
            spawn_listener_callback(async move {
                listener.apply(event.pool_name, event.topic_configs).await;
                Ok(())
            });
        }
    }

    /// Validate and apply one batch of [`TopicConfig`]s against `pool_name`. Invalid configs are
    /// skipped (and recorded as a validation failure via the `Validator`) rather than aborting
    /// the whole batch.
    pub async fn apply(&self, pool_name: String, configs: Vec<TopicConfig>) {
        let mut regular: HashMap<String, TopicSubscribeProperties> = HashMap::new();
        let mut multi: HashMap<u32, HashMap<String, TopicSubscribeProperties>> = HashMap::new();

        for cfg in &configs {
            if let Err(e) = self.validator.validate_topic_config(cfg) {
                log::warn!("skipping invalid topic config {:?}: {e}", cfg.topic());
                continue;
            }

            let props = TopicSubscribeProperties {
                qos: cfg.qos_value(),
                no_local: cfg.no_local(),
                retain_as_published: cfg.retain_as_published(),
                retain_handling: cfg.retain_handling(),
            };

            for topic in expand_topic(cfg) {
                if cfg.enable_multi_sub() {
                    multi.entry(cfg.multi_sub_num()).or_default().insert(topic, props);
                } else {
                    regular.insert(topic, props);
                }
            }
        }

        if !regular.is_empty() {
            if let Err(e) = self.facade.subscribe(&pool_name, regular, None).await {
                log::warn!("subscribe against pool {pool_name:?} failed: {e}");
            }
        }
        for (n, topics) in multi {
            if let Err(e) = self.facade.multi_sub(&pool_name, topics, None, n).await {
                log::warn!("multi_sub (n={n}) against pool {pool_name:?} failed: {e}");
            }
        }
    }
}

/// Queue subscriptions win over share subscriptions when a [`TopicConfig`] enables both (a
/// deliberate builder-level allowance; see `TopicConfigBuilder`'s tests). Regular topics pass
/// through unchanged.
fn expand_topic(cfg: &TopicConfig) -> Vec<String> {
    if cfg.enable_queue_topic() {
        return vec![generate_queue_topic(cfg.topic())];
    }
    if cfg.enable_share_topic() {
        return cfg
            .share_topic_groups()
            .iter()
            .filter_map(|group| match generate_share_topic(cfg.topic(), group) {
                Ok(topic) => Some(topic),
                Err(e) => {
                    log::warn!("skipping share group {group:?} for topic {:?}: {e}", cfg.topic());
                    None
                }
            })
            .collect();
    }
    vec![cfg.topic().to_string()]
}

/// Consumes [`PublishEvent`]s, validating topic/QoS before calling into the Facade.
pub struct PublishListener {
    facade: Arc<Client>,
    validator: Validator,
}

impl PublishListener {
    /// Construct a listener that issues publishes through `facade`, validating each event's
    /// topic/QoS with `validator` first.
    #[must_use]
    pub fn new(facade: Arc<Client>, validator: Validator) -> Self {
        Self { facade, validator }
    }

    /// Drain `rx` until the sending half is dropped, spawning one publish task per event.
    pub async fn run(self: Arc<Self>, mut rx: Receiver<PublishEvent>) {
        while let Some(event) = rx.recv().await {
            let listener = Arc::clone(&self);
            spawn_listener_callback(async move {
                listener.apply(event).await;
                Ok(())
            });
        }
    }

    /// Validate and publish one event.
    pub async fn apply(&self, event: PublishEvent) {
        if let Err(e) = self.validator.validate_publish_event(&event.topic, event.qos as u8) {
            log::warn!("dropping invalid publish event: {e}");
            return;
        }

        if let Err(e) = self
            .facade
            .publish(&event.pool_name, event.topic.clone(), event.message, event.qos, false, None)
            .await
        {
            log::warn!(
                "publish to {:?} on pool {:?} failed: {e}",
                event.topic,
                event.pool_name
            );
        }
    }
}
