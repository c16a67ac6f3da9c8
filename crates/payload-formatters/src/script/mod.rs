//! Script payload formatter.
//!
//! The user script defines `Encoder(payload, f_port)` and/or
//! `Decoder(payload, f_port)`. The formatter appends a call to the function
//! matching the direction and evaluates the result in a [`ScriptEngine`].
//!
//! # Encoding
//!
//! `Encoder` receives the decoded payload as a map and must return an array
//! of byte values:
//!
//! ```rhai
//! fn Encoder(payload, f_port) {
//!     [payload.led, payload.brightness]
//! }
//! ```
//!
//! # Decoding
//!
//! `Decoder` receives the raw payload as a blob and must return a map:
//!
//! ```rhai
//! fn Decoder(payload, f_port) {
//!     #{ temperature: ((payload[0] << 8) | payload[1]) / 10.0 }
//! }
//! ```
//!
//! The device model and identifiers are readable as `env.brand`,
//! `env.device_id` and so on, both at the top level of the script and inside
//! `Encoder` and `Decoder`.

mod engine;
mod environment;
mod rhai_engine;
mod value;

pub use engine::*;
pub use environment::*;
pub use rhai_engine::*;
pub use value::*;

use crate::codec::PayloadEncodeDecoder;
use crate::error::{CodecError, OutputError, Result};
use crate::message::{DownlinkMessage, EndDeviceModel, UplinkMessage};
use crate::structured;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const BYTE_LOW: i64 = 0x00;
const BYTE_HIGH: i64 = 0xFF;

/// Payload formatter evaluating user scripts in `E`.
pub struct ScriptHost<E> {
    engine: E,
}

impl<E: ScriptEngine> ScriptHost<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl Default for ScriptHost<RhaiEngine> {
    fn default() -> Self {
        Self::new(RhaiEngine::default())
    }
}

fn encoder_script(script: &str) -> String {
    format!("{script}\nEncoder(env.payload, env.f_port)\n")
}

fn decoder_script(script: &str) -> String {
    format!("{script}\nDecoder(env.payload, env.f_port)\n")
}

/// Narrow the value returned by `Encoder` to a byte sequence.
fn to_frm_payload(value: ScriptValue) -> Result<Vec<u8>> {
    let items = match value {
        ScriptValue::Array(items) => items,
        ScriptValue::Blob(bytes) => return Ok(bytes),
        other => {
            return Err(CodecError::InvalidOutputType(OutputError::NotSequence {
                found: other.type_name(),
            }));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let value = item.as_integer().ok_or_else(|| {
                CodecError::InvalidOutput(OutputError::NotInteger {
                    index,
                    found: item.type_name(),
                })
            })?;
            if !(BYTE_LOW..=BYTE_HIGH).contains(&value) {
                return Err(CodecError::InvalidOutputRange {
                    value,
                    low: BYTE_LOW,
                    high: BYTE_HIGH,
                });
            }
            Ok(value as u8)
        })
        .collect()
}

/// Convert the value returned by `Decoder` to a decoded payload.
fn to_decoded_payload(value: ScriptValue) -> Result<prost_types::Struct> {
    if !matches!(value, ScriptValue::Map(_)) {
        return Err(CodecError::InvalidOutput(OutputError::NotMap {
            found: value.type_name(),
        }));
    }
    let Some(JsonValue::Object(map)) = value.to_json() else {
        return Err(CodecError::InvalidOutput(OutputError::Unrepresentable(
            "non-finite number".to_string(),
        )));
    };
    structured::from_map(&map).map_err(|e| CodecError::InvalidOutput(OutputError::Struct(e)))
}

#[async_trait]
impl<E: ScriptEngine> PayloadEncodeDecoder for ScriptHost<E> {
    #[instrument(
        name = "script_encode",
        skip_all,
        fields(device_id = %msg.device_id, script_size = script.len())
    )]
    async fn encode(
        &self,
        ctx: &CancellationToken,
        mut msg: DownlinkMessage,
        model: &EndDeviceModel,
        script: &str,
    ) -> Result<DownlinkMessage> {
        let env = {
            let ids = msg.identifiers();
            let payload = msg.mac_payload().ok_or(CodecError::NoMacPayload)?;
            let Some(decoded) = payload.decoded_payload.as_ref() else {
                debug!("no decoded payload to encode");
                return Ok(msg);
            };
            let map = structured::to_map(decoded).map_err(CodecError::InvalidInput)?;
            create_environment(model, ids, payload.f_port, ScriptValue::from(&map))
        };

        let value = self.engine.run(ctx, encoder_script(script), env).await?;
        let frm_payload = to_frm_payload(value)?;

        debug!(frm_payload_size = frm_payload.len(), "encoded downlink");
        if let Some(payload) = msg.mac_payload_mut() {
            payload.frm_payload = frm_payload;
        }
        Ok(msg)
    }

    #[instrument(
        name = "script_decode",
        skip_all,
        fields(device_id = %msg.device_id, script_size = script.len())
    )]
    async fn decode(
        &self,
        ctx: &CancellationToken,
        mut msg: UplinkMessage,
        model: &EndDeviceModel,
        script: &str,
    ) -> Result<UplinkMessage> {
        let env = {
            let ids = msg.identifiers();
            let payload = msg.mac_payload().ok_or(CodecError::NoMacPayload)?;
            create_environment(
                model,
                ids,
                payload.f_port,
                ScriptValue::Blob(payload.frm_payload.clone()),
            )
        };

        let value = self.engine.run(ctx, decoder_script(script), env).await?;
        let decoded = to_decoded_payload(value)?;

        debug!(fields = decoded.fields.len(), "decoded uplink");
        if let Some(payload) = msg.mac_payload_mut() {
            payload.decoded_payload = Some(decoded);
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MacPayload, Message};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn model() -> EndDeviceModel {
        EndDeviceModel {
            brand: "acme".to_string(),
            model: "sensor-x".to_string(),
            hardware_version: "1.0".to_string(),
            firmware_version: "1.2.3".to_string(),
        }
    }

    fn downlink(decoded: Option<JsonValue>) -> DownlinkMessage {
        let decoded_payload = decoded.map(|value| match value {
            JsonValue::Object(map) => structured::from_map(&map).unwrap(),
            _ => panic!("expected object"),
        });
        DownlinkMessage {
            application_id: "app-1".to_string(),
            device_id: "dev-1".to_string(),
            payload: Some(Message {
                mac_payload: Some(MacPayload {
                    f_port: 2,
                    frm_payload: vec![],
                    decoded_payload,
                }),
            }),
            ..Default::default()
        }
    }

    fn uplink(frm_payload: Vec<u8>) -> UplinkMessage {
        UplinkMessage {
            application_id: "app-1".to_string(),
            device_id: "dev-1".to_string(),
            payload: Some(Message {
                mac_payload: Some(MacPayload {
                    f_port: 4,
                    frm_payload,
                    decoded_payload: None,
                }),
            }),
            ..Default::default()
        }
    }

    fn engine_returning(value: ScriptValue) -> MockScriptEngine {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_run()
            .times(1)
            .return_once(move |_, _, _| Ok(value));
        engine
    }

    async fn encode_with(value: ScriptValue) -> Result<DownlinkMessage> {
        ScriptHost::new(engine_returning(value))
            .encode(
                &CancellationToken::new(),
                downlink(Some(json!({"value": 65}))),
                &model(),
                "",
            )
            .await
    }

    async fn decode_with(value: ScriptValue) -> Result<UplinkMessage> {
        ScriptHost::new(engine_returning(value))
            .decode(&CancellationToken::new(), uplink(vec![0x01]), &model(), "")
            .await
    }

    #[tokio::test]
    async fn test_encode_passes_script_and_environment() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_run()
            .times(1)
            .withf(|_, script, env| {
                script.starts_with("fn Encoder(p, port) { [p.value] }")
                    && script.trim_end().ends_with("Encoder(env.payload, env.f_port)")
                    && env["f_port"] == ScriptValue::Int(2)
                    && env["device_id"] == ScriptValue::from("dev-1")
                    && env["payload"]
                        == ScriptValue::Map(BTreeMap::from([(
                            "value".to_string(),
                            ScriptValue::Int(65),
                        )]))
            })
            .return_once(|_, _, _| Ok(ScriptValue::Array(vec![ScriptValue::Int(65)])));

        let msg = ScriptHost::new(engine)
            .encode(
                &CancellationToken::new(),
                downlink(Some(json!({"value": 65}))),
                &model(),
                "fn Encoder(p, port) { [p.value] }",
            )
            .await
            .unwrap();
        assert_eq!(msg.mac_payload().unwrap().frm_payload, vec![0x41]);
    }

    #[tokio::test]
    async fn test_encode_accepts_integral_floats_and_blobs() {
        let msg = encode_with(ScriptValue::Array(vec![
            ScriptValue::Float(1.0),
            ScriptValue::Int(255),
            ScriptValue::Int(0),
        ]))
        .await
        .unwrap();
        assert_eq!(msg.mac_payload().unwrap().frm_payload, vec![1, 255, 0]);

        let msg = encode_with(ScriptValue::Blob(vec![9, 8])).await.unwrap();
        assert_eq!(msg.mac_payload().unwrap().frm_payload, vec![9, 8]);
    }

    #[tokio::test]
    async fn test_encode_out_of_range() {
        let result = encode_with(ScriptValue::Array(vec![ScriptValue::Int(256)])).await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutputRange {
                value: 256,
                low: 0,
                high: 255
            })
        ));

        let result = encode_with(ScriptValue::Array(vec![
            ScriptValue::Int(1),
            ScriptValue::Int(-1),
        ]))
        .await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutputRange {
                value: -1,
                low: 0,
                high: 255
            })
        ));
    }

    #[tokio::test]
    async fn test_encode_non_integer_element() {
        let result = encode_with(ScriptValue::Array(vec![
            ScriptValue::Int(1),
            ScriptValue::String("2".to_string()),
        ]))
        .await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutput(OutputError::NotInteger {
                index: 1,
                found: "string"
            }))
        ));

        let result = encode_with(ScriptValue::Array(vec![ScriptValue::Float(1.5)])).await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutput(OutputError::NotInteger { index: 0, .. }))
        ));
    }

    #[tokio::test]
    async fn test_encode_not_a_sequence() {
        let result = encode_with(ScriptValue::Int(65)).await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutputType(OutputError::NotSequence { found: "int" }))
        ));

        let result = encode_with(ScriptValue::Unit).await;
        assert!(matches!(result, Err(CodecError::InvalidOutputType(_))));
    }

    #[tokio::test]
    async fn test_encode_without_decoded_payload_is_noop() {
        let mut engine = MockScriptEngine::new();
        engine.expect_run().never();

        let msg = downlink(None);
        let result = ScriptHost::new(engine)
            .encode(&CancellationToken::new(), msg.clone(), &model(), "")
            .await
            .unwrap();
        assert_eq!(result, msg);
    }

    #[tokio::test]
    async fn test_no_mac_payload() {
        let mut engine = MockScriptEngine::new();
        engine.expect_run().never();
        let host = ScriptHost::new(engine);
        let ctx = CancellationToken::new();

        let result = host
            .encode(&ctx, DownlinkMessage::default(), &model(), "")
            .await;
        assert!(matches!(result, Err(CodecError::NoMacPayload)));

        let result = host
            .decode(&ctx, UplinkMessage::default(), &model(), "")
            .await;
        assert!(matches!(result, Err(CodecError::NoMacPayload)));
    }

    #[tokio::test]
    async fn test_execution_error_passes_through() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_run()
            .return_once(|_, _, _| Err(ExecutionError::Runtime("boom".to_string())));

        let result = ScriptHost::new(engine)
            .decode(&CancellationToken::new(), uplink(vec![]), &model(), "")
            .await;
        assert!(matches!(
            result,
            Err(CodecError::Execution(ExecutionError::Runtime(ref m))) if m == "boom"
        ));
    }

    #[tokio::test]
    async fn test_decode_passes_blob_payload() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_run()
            .times(1)
            .withf(|_, script, env| {
                script.trim_end().ends_with("Decoder(env.payload, env.f_port)")
                    && env["payload"] == ScriptValue::Blob(vec![0x01, 0x10])
                    && env["f_port"] == ScriptValue::Int(4)
            })
            .return_once(|_, _, _| {
                Ok(ScriptValue::Map(BTreeMap::from([(
                    "temperature".to_string(),
                    ScriptValue::Float(27.2),
                )])))
            });

        let msg = ScriptHost::new(engine)
            .decode(&CancellationToken::new(), uplink(vec![0x01, 0x10]), &model(), "")
            .await
            .unwrap();

        let decoded = msg.mac_payload().unwrap().decoded_payload.as_ref().unwrap();
        assert_eq!(
            JsonValue::Object(structured::to_map(decoded).unwrap()),
            json!({"temperature": 27.2})
        );
    }

    #[tokio::test]
    async fn test_decode_non_map_output() {
        let result = decode_with(ScriptValue::Int(42)).await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutput(OutputError::NotMap { found: "int" }))
        ));

        let result = decode_with(ScriptValue::Array(vec![])).await;
        assert!(matches!(result, Err(CodecError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_decode_unconvertible_map() {
        let result = decode_with(ScriptValue::Map(BTreeMap::from([(
            "value".to_string(),
            ScriptValue::Float(f64::INFINITY),
        )])))
        .await;
        assert!(matches!(
            result,
            Err(CodecError::InvalidOutput(OutputError::Unrepresentable(_)))
        ));
    }
}
