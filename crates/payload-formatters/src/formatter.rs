use crate::cayenne_lpp::CayenneLppHost;
use crate::codec::PayloadEncodeDecoder;
use crate::config::ScriptConfig;
use crate::error::Result;
use crate::message::{DownlinkMessage, EndDeviceModel, UplinkMessage};
use crate::script::{RhaiEngine, ScriptHost};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Payload formatter selected for a device or end device model.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormatter {
    #[default]
    None,
    CayenneLpp,
    Script,
}

impl PayloadFormatter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormatter::None => "none",
            PayloadFormatter::CayenneLpp => "cayennelpp",
            PayloadFormatter::Script => "script",
        }
    }
}

impl fmt::Display for PayloadFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown payload formatter: {0}")]
pub struct UnknownFormatter(pub String);

impl FromStr for PayloadFormatter {
    type Err = UnknownFormatter;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(PayloadFormatter::None),
            "cayennelpp" => Ok(PayloadFormatter::CayenneLpp),
            "script" => Ok(PayloadFormatter::Script),
            other => Err(UnknownFormatter(other.to_string())),
        }
    }
}

/// Dispatches encode and decode calls to the configured formatter.
#[derive(Clone)]
pub struct Formatters {
    cayenne_lpp: Arc<dyn PayloadEncodeDecoder>,
    script: Arc<dyn PayloadEncodeDecoder>,
}

impl Formatters {
    pub fn new(
        cayenne_lpp: Arc<dyn PayloadEncodeDecoder>,
        script: Arc<dyn PayloadEncodeDecoder>,
    ) -> Self {
        Self {
            cayenne_lpp,
            script,
        }
    }

    /// CayenneLPP and Rhai script formatters with the given script limits.
    pub fn from_config(config: ScriptConfig) -> Self {
        Self::new(
            Arc::new(CayenneLppHost::new()),
            Arc::new(ScriptHost::new(RhaiEngine::new(config))),
        )
    }

    fn codec(&self, formatter: PayloadFormatter) -> Option<&dyn PayloadEncodeDecoder> {
        match formatter {
            PayloadFormatter::None => None,
            PayloadFormatter::CayenneLpp => Some(self.cayenne_lpp.as_ref()),
            PayloadFormatter::Script => Some(self.script.as_ref()),
        }
    }

    pub async fn encode(
        &self,
        ctx: &CancellationToken,
        formatter: PayloadFormatter,
        msg: DownlinkMessage,
        model: &EndDeviceModel,
        parameter: &str,
    ) -> Result<DownlinkMessage> {
        match self.codec(formatter) {
            Some(codec) => codec.encode(ctx, msg, model, parameter).await,
            None => {
                debug!(device_id = %msg.device_id, "no payload formatter, downlink unchanged");
                Ok(msg)
            }
        }
    }

    pub async fn decode(
        &self,
        ctx: &CancellationToken,
        formatter: PayloadFormatter,
        msg: UplinkMessage,
        model: &EndDeviceModel,
        parameter: &str,
    ) -> Result<UplinkMessage> {
        match self.codec(formatter) {
            Some(codec) => codec.decode(ctx, msg, model, parameter).await,
            None => {
                debug!(device_id = %msg.device_id, "no payload formatter, uplink unchanged");
                Ok(msg)
            }
        }
    }
}

impl Default for Formatters {
    fn default() -> Self {
        Self::from_config(ScriptConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MockPayloadEncodeDecoder;
    use crate::error::CodecError;
    use crate::message::{MacPayload, Message};

    fn uplink() -> UplinkMessage {
        UplinkMessage {
            device_id: "dev-1".to_string(),
            payload: Some(Message {
                mac_payload: Some(MacPayload {
                    f_port: 1,
                    frm_payload: vec![0x01, 0x67, 0x01, 0x10],
                    decoded_payload: None,
                }),
            }),
            ..Default::default()
        }
    }

    fn unused() -> Arc<dyn PayloadEncodeDecoder> {
        let mut codec = MockPayloadEncodeDecoder::new();
        codec.expect_encode().never();
        codec.expect_decode().never();
        Arc::new(codec)
    }

    #[test]
    fn test_parse_formatter() {
        assert_eq!("none".parse(), Ok(PayloadFormatter::None));
        assert_eq!("cayennelpp".parse(), Ok(PayloadFormatter::CayenneLpp));
        assert_eq!("script".parse(), Ok(PayloadFormatter::Script));
        assert_eq!(
            "javascript".parse::<PayloadFormatter>(),
            Err(UnknownFormatter("javascript".to_string()))
        );
        assert_eq!(PayloadFormatter::CayenneLpp.to_string(), "cayennelpp");
        assert_eq!(PayloadFormatter::default(), PayloadFormatter::None);
    }

    #[tokio::test]
    async fn test_none_returns_message_unchanged() {
        let formatters = Formatters::new(unused(), unused());
        let ctx = CancellationToken::new();
        let model = EndDeviceModel::default();

        let msg = uplink();
        let result = formatters
            .decode(&ctx, PayloadFormatter::None, msg.clone(), &model, "")
            .await
            .unwrap();
        assert_eq!(result, msg);

        let result = formatters
            .encode(
                &ctx,
                PayloadFormatter::None,
                DownlinkMessage::default(),
                &model,
                "",
            )
            .await
            .unwrap();
        assert_eq!(result, DownlinkMessage::default());
    }

    #[tokio::test]
    async fn test_dispatches_to_script_with_parameter() {
        let mut script = MockPayloadEncodeDecoder::new();
        script
            .expect_decode()
            .times(1)
            .withf(|_, _, _, parameter| parameter == "fn Decoder(p, f) { #{} }")
            .returning(|_, msg, _, _| Ok(msg));

        let formatters = Formatters::new(unused(), Arc::new(script));
        let result = formatters
            .decode(
                &CancellationToken::new(),
                PayloadFormatter::Script,
                uplink(),
                &EndDeviceModel::default(),
                "fn Decoder(p, f) { #{} }",
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_propagates_codec_error() {
        let mut lpp = MockPayloadEncodeDecoder::new();
        lpp.expect_encode()
            .times(1)
            .returning(|_, _, _, _| Err(CodecError::NoMacPayload));

        let formatters = Formatters::new(Arc::new(lpp), unused());
        let result = formatters
            .encode(
                &CancellationToken::new(),
                PayloadFormatter::CayenneLpp,
                DownlinkMessage::default(),
                &EndDeviceModel::default(),
                "",
            )
            .await;
        assert!(matches!(result, Err(CodecError::NoMacPayload)));
    }

    #[tokio::test]
    async fn test_default_decodes_cayenne_lpp() {
        let msg = Formatters::default()
            .decode(
                &CancellationToken::new(),
                PayloadFormatter::CayenneLpp,
                uplink(),
                &EndDeviceModel::default(),
                "",
            )
            .await
            .unwrap();

        let decoded = msg.mac_payload().unwrap().decoded_payload.as_ref().unwrap();
        assert!(decoded.fields.contains_key("temperature_1"));
    }
}
