// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use derive_builder::Builder;

use crate::control_packet::{QoS, RetainHandling};

/// Declarative description of one topic a caller wants to subscribe (or publish) to, including
/// which topic transformations the [`crate::event_bus`] listeners should apply before handing
/// the topic to the Protocol Codec.
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", setter(into), build_fn(validate = "Self::validate"))]
pub struct TopicConfig {
    /// MQTT topic filter (subscribe) or topic name (publish).
    pub(crate) topic: String,
    /// Requested Quality of Service.
    #[builder(default = "0")]
    pub(crate) qos: u8,
    /// Subscribe the same transformed topic(s) `multi_sub_num` times on the same connection.
    #[builder(default = "false")]
    pub(crate) enable_multi_sub: bool,
    /// How many times to repeat the subscription when `enable_multi_sub` is set.
    #[builder(default = "1")]
    pub(crate) multi_sub_num: u32,
    /// Expand this topic into one `$share/{group}/{topic}` subscription per configured group.
    #[builder(default = "false")]
    pub(crate) enable_share_topic: bool,
    /// Share groups to expand into when `enable_share_topic` is set.
    #[builder(default)]
    pub(crate) share_topic_groups: Vec<String>,
    /// Rewrite the topic as `$queue/{topic}` (EMQX-style queue subscription). Overrides
    /// `enable_share_topic` when both are set.
    #[builder(default = "false")]
    pub(crate) enable_queue_topic: bool,
    /// MQTT v5 No Local subscribe option: suppress delivery of this client's own publishes.
    #[builder(default = "false")]
    pub(crate) no_local: bool,
    /// MQTT v5 Retain As Published subscribe option.
    #[builder(default = "false")]
    pub(crate) retain_as_published: bool,
    /// MQTT v5 Retain Handling subscribe option.
    #[builder(default = "RetainHandling::SendAtSubscribe")]
    pub(crate) retain_handling: RetainHandling,
    /// An opaque, additional message-filter expression carried as a user property. This core
    /// does not interpret it; it is passed through to the broker/application unchanged.
    #[builder(default = "None")]
    pub(crate) filter: Option<String>,
}

impl TopicConfig {
    /// The configured topic filter or name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
    /// Requested Quality of Service, as a raw wire value (0, 1, or 2).
    #[must_use]
    pub fn qos(&self) -> u8 {
        self.qos
    }
    /// Requested Quality of Service, as the Protocol Codec's [`QoS`] type.
    ///
    /// # Panics
    /// Panics if `qos()` is not 0, 1, or 2; callers are expected to validate configs with
    /// [`crate::validator::validate_topic_config`] before relying on this.
    #[must_use]
    pub fn qos_value(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => panic!("qos must be validated before use, got {other}"),
        }
    }
    /// Whether the same transformed topic(s) should be subscribed `multi_sub_num` times.
    #[must_use]
    pub fn enable_multi_sub(&self) -> bool {
        self.enable_multi_sub
    }
    /// How many times to repeat the subscription when `enable_multi_sub` is set.
    #[must_use]
    pub fn multi_sub_num(&self) -> u32 {
        self.multi_sub_num
    }
    /// Whether to expand into one shared-subscription topic per configured group.
    #[must_use]
    pub fn enable_share_topic(&self) -> bool {
        self.enable_share_topic
    }
    /// Share groups to expand into when `enable_share_topic` is set.
    #[must_use]
    pub fn share_topic_groups(&self) -> &[String] {
        &self.share_topic_groups
    }
    /// Whether to rewrite the topic as a `$queue/` subscription.
    #[must_use]
    pub fn enable_queue_topic(&self) -> bool {
        self.enable_queue_topic
    }
    /// MQTT v5 No Local subscribe option.
    #[must_use]
    pub fn no_local(&self) -> bool {
        self.no_local
    }
    /// MQTT v5 Retain As Published subscribe option.
    #[must_use]
    pub fn retain_as_published(&self) -> bool {
        self.retain_as_published
    }
    /// MQTT v5 Retain Handling subscribe option.
    #[must_use]
    pub fn retain_handling(&self) -> RetainHandling {
        self.retain_handling
    }
    /// Retain Handling option's raw wire value, for validation of configs built outside this
    /// type's own builder (e.g. deserialized from an external source).
    #[must_use]
    pub fn retain_handling_raw(&self) -> Option<u8> {
        Some(self.retain_handling.as_wire_value())
    }
    /// Opaque message-filter expression, if configured.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Convenience entry point matching the other config types' `builder()` spelling.
    #[must_use]
    pub fn builder() -> TopicConfigBuilder {
        TopicConfigBuilder::default()
    }
}

impl TopicConfigBuilder {
    /// # Errors
    /// Returns a message describing the first structural violation found.
    fn validate(&self) -> Result<(), String> {
        if let Some(topic) = &self.topic {
            if topic.is_empty() {
                return Err("topic cannot be empty".to_string());
            }
        }
        if let Some(true) = self.enable_multi_sub {
            if let Some(n) = self.multi_sub_num {
                if n < 1 {
                    return Err("multi_sub_num must be >= 1 when enable_multi_sub is set".to_string());
                }
            }
        }
        if let Some(true) = self.enable_share_topic {
            if let Some(groups) = &self.share_topic_groups {
                if groups.is_empty() {
                    return Err(
                        "share_topic_groups must be non-empty when enable_share_topic is set"
                            .to_string(),
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let cfg = TopicConfigBuilder::default()
            .topic("sensors/#")
            .build()
            .unwrap();
        assert_eq!(cfg.qos(), 0);
        assert!(!cfg.enable_multi_sub());
        assert!(!cfg.enable_share_topic());
        assert!(!cfg.enable_queue_topic());
    }

    #[test]
    fn queue_overrides_share_is_a_listener_concern_not_a_builder_error() {
        // Both flags may legally be set together; enable_queue_topic wins at listener time
        // (see crate::event_bus), so the builder must not reject this combination.
        let cfg = TopicConfigBuilder::default()
            .topic("sensors/#")
            .enable_share_topic(true)
            .share_topic_groups(vec!["groupA".to_string()])
            .enable_queue_topic(true)
            .build()
            .unwrap();
        assert!(cfg.enable_share_topic());
        assert!(cfg.enable_queue_topic());
    }

    #[test]
    fn builder_rejects_multi_sub_without_count() {
        let result = TopicConfigBuilder::default()
            .topic("sensors/#")
            .enable_multi_sub(true)
            .multi_sub_num(0u32)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_share_topic_without_groups() {
        let result = TopicConfigBuilder::default()
            .topic("sensors/#")
            .enable_share_topic(true)
            .build();
        assert!(result.is_err());
    }
}
