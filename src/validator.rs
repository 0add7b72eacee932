// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stateless validation of configuration objects and the primitive values they're built from.
//!
//! Every `is_valid_*` function here is pure and side-effect free so it can be unit tested and
//! reused directly by `derive_builder`'s `build_fn(validate = ...)` hooks. The aggregate
//! `validate_*` functions collect every violation rather than short-circuiting on the first one,
//! so a caller gets a complete [`CoreError::InvalidConfig`] on the first attempt.

use crate::config::{ClientConfig, PoolConfig, TopicConfig};
use crate::error::CoreError;
use crate::metrics::Metrics;
use crate::topic::{TopicFilter, TopicName};

/// Maximum length, in bytes, of an MQTT client identifier, topic name, or topic filter (MQTT 5.0
/// 1.5.3/1.5.4, backed by the two-byte length prefix used on the wire).
const MQTT_STRING_MAX_LEN: usize = 65_535;

/// Maximum length, in bytes, of a DNS hostname (RFC 1035).
const HOSTNAME_MAX_LEN: usize = 253;

/// True if `s` is non-empty, no longer than 253 bytes, and is either a syntactically valid
/// hostname (dot-separated labels of `[A-Za-z0-9-]`, no label starting/ending with `-`) or a
/// valid IPv4/IPv6 literal.
#[must_use]
pub fn is_valid_host(s: &str) -> bool {
    if s.is_empty() || s.len() > HOSTNAME_MAX_LEN {
        return false;
    }
    if s.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// True iff `1 <= n <= 65535`.
#[must_use]
pub fn is_valid_port(n: u32) -> bool {
    (1..=65535).contains(&n)
}

/// True iff `n` is a valid MQTT Quality of Service level (0, 1, or 2).
#[must_use]
pub fn is_valid_qos(n: u8) -> bool {
    matches!(n, 0 | 1 | 2)
}

/// True if `s` is a non-empty, non-control-character string no longer than 65535 bytes.
///
/// MQTT client identifiers are UTF-8 strings; this crate additionally rejects control
/// characters, which are legal per the MQTT spec but never intentional in a client ID.
#[must_use]
pub fn is_valid_client_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MQTT_STRING_MAX_LEN
        && !s.chars().any(char::is_control)
}

/// True iff `s` parses as a valid MQTT topic name (a publish destination, no wildcards).
#[must_use]
pub fn is_valid_topic_name(s: &str) -> bool {
    TopicName::is_valid_topic_name(s)
}

/// True iff `s` parses as a valid MQTT topic filter (a subscription pattern, wildcards allowed).
#[must_use]
pub fn is_valid_topic_filter(s: &str) -> bool {
    TopicFilter::is_valid_topic_filter(s)
}

/// Validate a [`ClientConfig`], returning every violation found rather than just the first.
///
/// # Errors
/// Returns [`CoreError::InvalidConfig`] listing all violations when any are found.
pub fn validate_client_config(cfg: &ClientConfig) -> Result<(), CoreError> {
    let mut reasons = Vec::new();

    if !is_valid_host(cfg.host()) {
        reasons.push(format!("invalid host: {:?}", cfg.host()));
    }
    if !is_valid_port(u32::from(cfg.port())) {
        reasons.push(format!("invalid port: {}", cfg.port()));
    }
    if !matches!(cfg.protocol_level(), 4 | 5) {
        reasons.push(format!(
            "invalid protocol_level: {} (must be 4 or 5)",
            cfg.protocol_level()
        ));
    }
    if cfg.client_id().is_empty() && cfg.prefix().is_empty() {
        reasons.push(
            "client_id is empty and prefix is empty: ClientIdProvider has nothing to assign"
                .to_string(),
        );
    }
    if !cfg.client_id().is_empty() && !is_valid_client_id(cfg.client_id()) {
        reasons.push(format!("invalid client_id: {:?}", cfg.client_id()));
    }
    if let Some(will) = cfg.will() {
        if !is_valid_topic_name(&will.topic) {
            reasons.push(format!("invalid will topic: {:?}", will.topic));
        }
        if !is_valid_qos(will.qos) {
            reasons.push(format!("invalid will qos: {}", will.qos));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig { reasons })
    }
}

/// Validate a [`TopicConfig`], returning every violation found rather than just the first.
///
/// # Errors
/// Returns [`CoreError::InvalidConfig`] listing all violations when any are found.
pub fn validate_topic_config(cfg: &TopicConfig) -> Result<(), CoreError> {
    let mut reasons = Vec::new();

    if !is_valid_topic_filter(cfg.topic()) {
        reasons.push(format!("invalid topic filter: {:?}", cfg.topic()));
    }
    if !is_valid_qos(cfg.qos()) {
        reasons.push(format!("invalid qos: {}", cfg.qos()));
    }
    if cfg.enable_multi_sub() && cfg.multi_sub_num() < 1 {
        reasons.push("multi_sub_num must be >= 1 when enable_multi_sub is set".to_string());
    }
    if cfg.enable_share_topic() && cfg.share_topic_groups().is_empty() {
        reasons.push("share_topic_groups must be non-empty when enable_share_topic is set".to_string());
    }
    if let Some(rh) = cfg.retain_handling_raw() {
        if crate::control_packet::RetainHandling::from_wire_value(rh).is_none() {
            reasons.push(format!("invalid retain_handling: {rh} (must be 0, 1, or 2)"));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig { reasons })
    }
}

/// Validate a [`PoolConfig`], returning every violation found rather than just the first.
///
/// # Errors
/// Returns [`CoreError::InvalidConfig`] listing all violations when any are found.
pub fn validate_pool_config(cfg: &PoolConfig) -> Result<(), CoreError> {
    let mut reasons = Vec::new();

    let min_max = cfg.min_connections().max(1);
    if cfg.max_connections() < min_max {
        reasons.push(format!(
            "max_connections ({}) must be >= max(min_connections, 1) ({})",
            cfg.max_connections(),
            min_max
        ));
    }
    if cfg.connect_timeout().is_zero() {
        reasons.push("connect_timeout must be greater than zero".to_string());
    }
    if cfg.wait_timeout().is_zero() {
        reasons.push("wait_timeout must be greater than zero".to_string());
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig { reasons })
    }
}

/// Metrics-instrumented wrapper around the free `validate_*`/`is_valid_*` functions.
///
/// This struct carries no state of its own beyond a metrics handle; it exists purely so call
/// sites that want validation outcomes recorded don't have to duplicate the bookkeeping, while
/// the underlying functions stay plain and unit-testable without a [`Metrics`] instance.
#[derive(Clone)]
pub struct Validator {
    metrics: Metrics,
}

impl Validator {
    /// Wrap a [`Metrics`] handle so validation outcomes recorded through this instance are
    /// reflected in it.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }

    /// Validate a [`ClientConfig`], recording the outcome under `"client_config"`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] when validation fails.
    pub fn validate_client_config(&self, cfg: &ClientConfig) -> Result<(), CoreError> {
        self.record("client_config", validate_client_config(cfg))
    }

    /// Validate a [`TopicConfig`], recording the outcome under `"topic_config"`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] when validation fails.
    pub fn validate_topic_config(&self, cfg: &TopicConfig) -> Result<(), CoreError> {
        self.record("topic_config", validate_topic_config(cfg))
    }

    /// Validate a [`PoolConfig`], recording the outcome under `"pool_config"`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] when validation fails.
    pub fn validate_pool_config(&self, cfg: &PoolConfig) -> Result<(), CoreError> {
        self.record("pool_config", validate_pool_config(cfg))
    }

    /// Validate a publish topic/QoS pair, recording the outcome under `"publish_event"`. Exposed
    /// (unlike the other `validate_*` methods) for the `listeners` module, which has no
    /// corresponding config struct to validate against.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] if the topic name or QoS is invalid.
    pub fn validate_publish_event(&self, topic: &str, qos: u8) -> Result<(), CoreError> {
        let mut reasons = Vec::new();
        if !is_valid_topic_name(topic) {
            reasons.push(format!("invalid topic name: {topic:?}"));
        }
        if !is_valid_qos(qos) {
            reasons.push(format!("invalid qos: {qos}"));
        }
        self.record(
            "publish_event",
            if reasons.is_empty() {
                Ok(())
            } else {
                Err(CoreError::InvalidConfig { reasons })
            },
        )
    }

    fn record(&self, kind: &str, result: Result<(), CoreError>) -> Result<(), CoreError> {
        match &result {
            Ok(()) => self.metrics.record_validation_success(kind),
            Err(e) => self.metrics.record_validation_failure(kind, &e.to_string()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("broker.example.com" => true; "dns hostname")]
    #[test_case("localhost" => true; "bare label")]
    #[test_case("192.168.1.1" => true; "ipv4 literal")]
    #[test_case("::1" => true; "ipv6 literal")]
    #[test_case(""; "empty string" => false)]
    #[test_case("-bad.example.com" => false; "label starts with hyphen")]
    #[test_case("bad-.example.com" => false; "label ends with hyphen")]
    fn host_validation(s: &str) -> bool {
        is_valid_host(s)
    }

    #[test_case(1 => true; "minimum valid port")]
    #[test_case(65535 => true; "maximum valid port")]
    #[test_case(0 => false; "port zero is reserved")]
    #[test_case(65536 => false; "port exceeds u16 range")]
    fn port_validation(n: u32) -> bool {
        is_valid_port(n)
    }

    #[test_case(0 => true; "qos 0")]
    #[test_case(1 => true; "qos 1")]
    #[test_case(2 => true; "qos 2")]
    #[test_case(3 => false; "qos 3 is invalid")]
    fn qos_validation(n: u8) -> bool {
        is_valid_qos(n)
    }

    #[test]
    fn client_id_rejects_control_characters() {
        assert!(!is_valid_client_id("device\u{0007}id"));
        assert!(is_valid_client_id("device-001"));
    }

    #[test]
    fn client_id_rejects_empty() {
        assert!(!is_valid_client_id(""));
    }

    #[test]
    fn validate_pool_config_aggregates_multiple_violations() {
        let cfg = PoolConfig::builder()
            .min_connections(5usize)
            .max_connections(1usize)
            .connect_timeout(std::time::Duration::ZERO)
            .wait_timeout(std::time::Duration::ZERO)
            .build()
            .expect("builder-level field defaults should not fail to construct");
        let err = validate_pool_config(&cfg).unwrap_err();
        match err {
            CoreError::InvalidConfig { reasons } => assert_eq!(reasons.len(), 3),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }
}
