//! CayenneLPP payload formatter.
//!
//! Uplinks are decoded record by record into `{<kind>_<channel>: value}`
//! documents; downlinks are encoded from documents of the same shape. See
//! [`measurement`] for the supported kinds and their resolutions.

mod decoder;
mod encoder;
pub mod measurement;

pub use decoder::*;
pub use encoder::*;
pub use measurement::{format_name, parse_name, GpsValue, Kind, NameError, Vector3};

use crate::codec::PayloadEncodeDecoder;
use crate::error::{CodecError, OutputError, Result};
use crate::message::{DownlinkMessage, EndDeviceModel, UplinkMessage};
use crate::structured;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// CayenneLPP encoder and decoder. Ignores the script parameter.
#[derive(Debug, Default, Clone)]
pub struct CayenneLppHost {
    decoder: CayenneLppDecoder,
}

impl CayenneLppHost {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayloadEncodeDecoder for CayenneLppHost {
    #[instrument(name = "cayennelpp_encode", skip_all, fields(device_id = %msg.device_id))]
    async fn encode(
        &self,
        _ctx: &CancellationToken,
        mut msg: DownlinkMessage,
        _model: &EndDeviceModel,
        _script: &str,
    ) -> Result<DownlinkMessage> {
        let payload = msg.mac_payload_mut().ok_or(CodecError::NoMacPayload)?;
        let Some(decoded) = payload.decoded_payload.as_ref() else {
            debug!("no decoded payload to encode");
            return Ok(msg);
        };

        let map = structured::to_map(decoded).map_err(CodecError::InvalidInput)?;
        let mut encoder = CayenneLppEncoder::new();
        encoder.encode_map(&map);
        payload.frm_payload = encoder.into_bytes().to_vec();

        debug!(
            f_port = payload.f_port,
            frm_payload_size = payload.frm_payload.len(),
            "encoded downlink"
        );
        Ok(msg)
    }

    #[instrument(name = "cayennelpp_decode", skip_all, fields(device_id = %msg.device_id))]
    async fn decode(
        &self,
        _ctx: &CancellationToken,
        mut msg: UplinkMessage,
        _model: &EndDeviceModel,
        _script: &str,
    ) -> Result<UplinkMessage> {
        let payload = msg.mac_payload_mut().ok_or(CodecError::NoMacPayload)?;

        let map = self
            .decoder
            .decode(&payload.frm_payload)
            .map_err(|e| CodecError::InvalidOutput(OutputError::Lpp(e)))?;
        let decoded = structured::from_map(&map)
            .map_err(|e| CodecError::InvalidOutputType(OutputError::Struct(e)))?;

        debug!(
            f_port = payload.f_port,
            fields = decoded.fields.len(),
            "decoded uplink"
        );
        payload.decoded_payload = Some(decoded);
        Ok(msg)
    }
}
