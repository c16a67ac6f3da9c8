//! Payload formatters for LoRaWAN messages.
//!
//! A formatter converts between the binary `frm_payload` of a message and
//! its structured `decoded_payload`. Two formatters are provided:
//!
//! - [`CayenneLppHost`] for the CayenneLPP type-length-value format
//! - [`ScriptHost`] for user scripts defining `Encoder`/`Decoder`, evaluated
//!   in a sandboxed [`ScriptEngine`]
//!
//! Both implement [`PayloadEncodeDecoder`]; [`Formatters`] selects one by
//! [`PayloadFormatter`].

pub mod cayenne_lpp;
mod codec;
mod config;
mod error;
mod formatter;
pub mod message;
pub mod script;
pub mod structured;

pub use cayenne_lpp::{CayenneLppDecoder, CayenneLppEncoder, CayenneLppHost, LppError};
pub use codec::*;
pub use config::ScriptConfig;
pub use error::{CodecError, OutputError, Result};
pub use formatter::{Formatters, PayloadFormatter, UnknownFormatter};
pub use message::{DownlinkMessage, EndDeviceModel, MacPayload, Message, UplinkMessage};
pub use script::{ExecutionError, RhaiEngine, ScriptEngine, ScriptHost, ScriptValue};
