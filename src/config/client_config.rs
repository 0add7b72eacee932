// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::env::{self, VarError};
use std::time::Duration;

use derive_builder::Builder;

/// Last Will and Testament, published by the broker if the connection is lost uncleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WillMessage {
    /// Topic the will is published to.
    pub topic: String,
    /// Will payload.
    pub message: Vec<u8>,
    /// Quality of Service the will is published at.
    pub qos: u8,
    /// Whether the will is published with the RETAIN flag set.
    pub retain: bool,
}

/// TLS material for a connection, when `use_tls` is enabled on the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Path to a PEM file used to validate the broker's certificate.
    pub ca_file: Option<String>,
    /// Path to a PEM file establishing X509 client authentication.
    pub cert_file: Option<String>,
    /// Path to the private key file paired with `cert_file`.
    pub key_file: Option<String>,
}

/// Transport-level knobs independent of the MQTT session itself (the rendering of the source's
/// `swooleConfig` bag).
#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(pattern = "owned", setter(into))]
pub struct TransportOptions {
    /// Maximum size, in bytes, of a single packet the codec will accept.
    #[builder(default = "1_048_576")]
    pub package_max_length: u32,
    /// Timeout for the initial TCP/TLS handshake.
    #[builder(default = "Duration::from_secs(30)")]
    pub connect_timeout: Duration,
    /// TCP keepalive probe interval.
    #[builder(default = "Duration::from_secs(60)")]
    pub tcp_keepalive: Duration,
    /// TLS material, when the connection uses TLS. `None` means a plaintext transport.
    #[builder(default = "None")]
    pub tls: Option<TlsOptions>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptionsBuilder::default()
            .build()
            .expect("all TransportOptions fields have defaults")
    }
}

/// Immutable MQTT connection configuration, built through [`ClientConfigBuilder`].
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", setter(into), build_fn(validate = "Self::validate"))]
pub struct ClientConfig {
    /// Broker hostname or IP literal to dial.
    pub(crate) host: String,
    /// Broker TCP port.
    #[builder(default = "1883")]
    pub(crate) port: u16,
    /// Keep-alive interval, in seconds. `0` disables keep-alive PINGREQ.
    #[builder(default = "60")]
    pub(crate) keep_alive: u64,
    /// MQTT protocol level: `4` for v3.1.1, `5` for v5.0.
    #[builder(default = "5")]
    pub(crate) protocol_level: u8,
    /// Username presented at CONNECT time, if the broker requires one.
    #[builder(default = "None")]
    pub(crate) username: Option<String>,
    /// Password presented at CONNECT time, if the broker requires one.
    #[builder(default = "None")]
    pub(crate) password: Option<String>,
    /// Client identifier. When empty, [`crate::client_id_provider::ClientIdProvider`] assigns
    /// one from `prefix` at connect time.
    #[builder(default = "String::new()")]
    pub(crate) client_id: String,
    /// When true, the broker discards any previous session state for `client_id`.
    #[builder(default = "true")]
    pub(crate) clean_session: bool,
    /// Last Will and Testament, published if the connection drops uncleanly.
    #[builder(default = "None")]
    pub(crate) will: Option<WillMessage>,
    /// Transport-level options (packet size, timeouts, TLS).
    #[builder(default)]
    pub(crate) transport: TransportOptions,
    /// Prefix used by the `ClientIdProvider` to generate a `client_id` when none is supplied.
    #[builder(default = "String::new()")]
    pub(crate) prefix: String,
}

impl ClientConfig {
    /// Broker hostname or IP literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
    /// Broker TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
    /// Keep-alive interval, in seconds.
    #[must_use]
    pub fn keep_alive(&self) -> u64 {
        self.keep_alive
    }
    /// MQTT protocol level (4 or 5).
    #[must_use]
    pub fn protocol_level(&self) -> u8 {
        self.protocol_level
    }
    /// Username presented at CONNECT time, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
    /// Password presented at CONNECT time, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
    /// Explicitly configured client identifier (empty if one must be generated).
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
    /// Whether the broker should discard previous session state at connect.
    #[must_use]
    pub fn clean_session(&self) -> bool {
        self.clean_session
    }
    /// Last Will and Testament, if configured.
    #[must_use]
    pub fn will(&self) -> Option<&WillMessage> {
        self.will.as_ref()
    }
    /// Transport-level options.
    #[must_use]
    pub fn transport(&self) -> &TransportOptions {
        &self.transport
    }
    /// Prefix used to synthesize a client ID when none was configured.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Convenience entry point matching the other config types' `builder()` spelling.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

impl ClientConfigBuilder {
    /// Construct a builder by reading `MQTT_CLIENT_*` / `MQTT_BROKER_*` environment variables.
    ///
    /// Missing variables leave the corresponding field unset (falling back to its builder
    /// default, or surfacing as a validation error if the field is mandatory); it is not an
    /// error for a variable to be absent, since overriding the builder afterward is always
    /// legal.
    ///
    /// # Errors
    /// Returns a message describing the failure if a present variable fails to parse, or is not
    /// valid Unicode.
    pub fn from_environment() -> Result<Self, String> {
        let host = string_from_environment("MQTT_BROKER_HOSTNAME")?;
        let port = string_from_environment("MQTT_BROKER_TCP_PORT")?
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| format!("MQTT_BROKER_TCP_PORT: {e}"))?;
        let keep_alive = string_from_environment("MQTT_CLIENT_KEEP_ALIVE")?
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| format!("MQTT_CLIENT_KEEP_ALIVE: {e}"))?;
        let protocol_level = string_from_environment("MQTT_CLIENT_PROTOCOL_LEVEL")?
            .map(|v| v.parse::<u8>())
            .transpose()
            .map_err(|e| format!("MQTT_CLIENT_PROTOCOL_LEVEL: {e}"))?;
        let client_id = string_from_environment("MQTT_CLIENT_ID")?;
        let clean_session = string_from_environment("MQTT_CLIENT_CLEAN_SESSION")?
            .map(|v| v.parse::<bool>())
            .transpose()
            .map_err(|e| format!("MQTT_CLIENT_CLEAN_SESSION: {e}"))?;
        let username = Some(string_from_environment("MQTT_CLIENT_USERNAME")?);
        let password = Some(string_from_environment("MQTT_CLIENT_PASSWORD")?);
        let prefix = string_from_environment("MQTT_CLIENT_ID_PREFIX")?;

        if host.is_none() {
            log::warn!("MQTT_BROKER_HOSTNAME is not set in environment");
        }

        Ok(Self {
            host,
            port,
            keep_alive,
            protocol_level,
            username,
            password,
            client_id,
            clean_session,
            will: Some(None),
            transport: Some(TransportOptions::default()),
            prefix,
        })
    }

    /// # Errors
    /// Returns a message describing the first structural violation found.
    fn validate(&self) -> Result<(), String> {
        if let Some(host) = &self.host {
            if host.is_empty() {
                return Err("host cannot be empty".to_string());
            }
        }
        if let Some(client_id) = &self.client_id {
            if client_id.is_empty() {
                let prefix_is_empty = self
                    .prefix
                    .as_ref()
                    .map(String::is_empty)
                    .unwrap_or(true);
                if prefix_is_empty {
                    return Err(
                        "client_id is empty and prefix is empty: nothing for the client ID provider to assign".to_string(),
                    );
                }
            }
        }
        if let Some(protocol_level) = self.protocol_level {
            if !matches!(protocol_level, 4 | 5) {
                return Err(format!(
                    "protocol_level must be 4 or 5, got {protocol_level}"
                ));
            }
        }
        Ok(())
    }
}

/// Helper to read an environment variable as a string, distinguishing "absent" from "invalid".
fn string_from_environment(key: &str) -> Result<Option<String>, String> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => {
            Err(format!("{key}: environment variable is not valid unicode"))
        }
    }
}
