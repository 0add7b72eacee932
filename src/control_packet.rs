// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Aliases onto the Protocol Codec's (`rumqttc`) wire types.
//!
//! This core does not reimplement MQTT packet serialization; it only needs names for the
//! pieces of a packet that drive pooling, topic transformation, and event dispatch decisions.

/// Quality of Service
pub type QoS = rumqttc::v5::mqttbytes::QoS;

/// PUBLISH packet
pub type Publish = rumqttc::v5::mqttbytes::v5::Publish;

/// Properties for a CONNECT packet
pub type ConnectProperties = rumqttc::v5::mqttbytes::v5::ConnectProperties;
/// Properties for a PUBLISH packet
pub type PublishProperties = rumqttc::v5::mqttbytes::v5::PublishProperties;
/// Properties for a SUBSCRIBE packet
pub type SubscribeProperties = rumqttc::v5::mqttbytes::v5::SubscribeProperties;
/// Properties for a UNSUBSCRIBE packet
pub type UnsubscribeProperties = rumqttc::v5::mqttbytes::v5::UnsubscribeProperties;
/// Result of a SUBACK packet
pub type SubscribeReasonCode = rumqttc::v5::mqttbytes::v5::SubscribeReasonCode;
/// Reason code carried by a DISCONNECT packet, broker- or client-initiated.
pub type DisconnectReasonCode = rumqttc::v5::mqttbytes::v5::DisconnectReasonCode;

#[cfg(test)]
pub type PubAck = rumqttc::v5::mqttbytes::v5::PubAck;

/// MQTT v5 per-topic retain handling behavior, as carried in a SUBSCRIBE filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainHandling {
    /// Send retained messages at the time of the subscribe.
    SendAtSubscribe,
    /// Send retained messages only if the subscription did not already exist.
    SendAtSubscribeIfNew,
    /// Do not send retained messages at subscribe time.
    DoNotSend,
}

impl RetainHandling {
    /// Encode as the wire value MQTT v5 uses for this field (0, 1, or 2).
    #[must_use]
    pub fn as_wire_value(self) -> u8 {
        match self {
            RetainHandling::SendAtSubscribe => 0,
            RetainHandling::SendAtSubscribeIfNew => 1,
            RetainHandling::DoNotSend => 2,
        }
    }

    /// Decode from the wire value MQTT v5 uses for this field.
    #[must_use]
    pub fn from_wire_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(RetainHandling::SendAtSubscribe),
            1 => Some(RetainHandling::SendAtSubscribeIfNew),
            2 => Some(RetainHandling::DoNotSend),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retain_handling_round_trips() {
        for rh in [
            RetainHandling::SendAtSubscribe,
            RetainHandling::SendAtSubscribeIfNew,
            RetainHandling::DoNotSend,
        ] {
            assert_eq!(RetainHandling::from_wire_value(rh.as_wire_value()), Some(rh));
        }
    }

    #[test]
    fn retain_handling_rejects_out_of_range() {
        assert_eq!(RetainHandling::from_wire_value(3), None);
    }
}
