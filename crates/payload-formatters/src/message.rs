//! Uplink and downlink messages as seen by the payload formatters.
//!
//! Only the parts of a LoRaWAN message the formatters read or write are
//! modelled: end device identifiers and the application layer of the MAC
//! payload. Framing and MAC commands live in the network stack.

use prost_types::Struct;

/// Application layer of a data frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MacPayload {
    #[prost(uint32, tag = "1")]
    pub f_port: u32,

    /// Raw application payload as carried on the radio.
    #[prost(bytes = "vec", tag = "2")]
    pub frm_payload: Vec<u8>,

    /// Structured form of `frm_payload`.
    #[prost(message, optional, tag = "3")]
    pub decoded_payload: Option<Struct>,
}

/// PHY payload container. Join requests and other frames without an
/// application layer carry no MAC payload.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(message, optional, tag = "1")]
    pub mac_payload: Option<MacPayload>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UplinkMessage {
    #[prost(string, tag = "1")]
    pub application_id: String,

    #[prost(string, tag = "2")]
    pub device_id: String,

    #[prost(bytes = "vec", tag = "3")]
    pub dev_eui: Vec<u8>,

    #[prost(bytes = "vec", tag = "4")]
    pub join_eui: Vec<u8>,

    #[prost(message, optional, tag = "5")]
    pub payload: Option<Message>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DownlinkMessage {
    #[prost(string, tag = "1")]
    pub application_id: String,

    #[prost(string, tag = "2")]
    pub device_id: String,

    #[prost(bytes = "vec", tag = "3")]
    pub dev_eui: Vec<u8>,

    #[prost(bytes = "vec", tag = "4")]
    pub join_eui: Vec<u8>,

    #[prost(message, optional, tag = "5")]
    pub payload: Option<Message>,
}

/// Static description of an end device model.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EndDeviceModel {
    #[prost(string, tag = "1")]
    pub brand: String,

    #[prost(string, tag = "2")]
    pub model: String,

    #[prost(string, tag = "3")]
    pub hardware_version: String,

    #[prost(string, tag = "4")]
    pub firmware_version: String,
}

/// Read-only identity of the device a message belongs to.
#[derive(Debug, Clone, Copy)]
pub struct MessageIdentifiers<'a> {
    pub application_id: &'a str,
    pub device_id: &'a str,
    pub dev_eui: &'a [u8],
    pub join_eui: &'a [u8],
}

macro_rules! impl_radio_message {
    ($ty:ty) => {
        impl $ty {
            /// MAC payload of the message, if the frame carries one.
            pub fn mac_payload(&self) -> Option<&MacPayload> {
                self.payload.as_ref().and_then(|p| p.mac_payload.as_ref())
            }

            pub fn mac_payload_mut(&mut self) -> Option<&mut MacPayload> {
                self.payload.as_mut().and_then(|p| p.mac_payload.as_mut())
            }

            pub fn identifiers(&self) -> MessageIdentifiers<'_> {
                MessageIdentifiers {
                    application_id: &self.application_id,
                    device_id: &self.device_id,
                    dev_eui: &self.dev_eui,
                    join_eui: &self.join_eui,
                }
            }
        }
    };
}

impl_radio_message!(UplinkMessage);
impl_radio_message!(DownlinkMessage);
