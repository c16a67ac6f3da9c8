use super::{Environment, ScriptValue};
use crate::message::{EndDeviceModel, MessageIdentifiers};

/// Script environment for a message of `ids` sent on `f_port`.
///
/// `payload` is a map for downlinks and a blob for uplinks. EUIs are rendered
/// as uppercase hex, or an empty string when unset.
pub fn create_environment(
    model: &EndDeviceModel,
    ids: MessageIdentifiers<'_>,
    f_port: u32,
    payload: ScriptValue,
) -> Environment {
    let mut env = Environment::new();
    env.insert("brand".to_string(), model.brand.as_str().into());
    env.insert("model".to_string(), model.model.as_str().into());
    env.insert(
        "hardware_version".to_string(),
        model.hardware_version.as_str().into(),
    );
    env.insert(
        "firmware_version".to_string(),
        model.firmware_version.as_str().into(),
    );
    env.insert("application_id".to_string(), ids.application_id.into());
    env.insert("device_id".to_string(), ids.device_id.into());
    env.insert("dev_eui".to_string(), hex::encode_upper(ids.dev_eui).into());
    env.insert("join_eui".to_string(), hex::encode_upper(ids.join_eui).into());
    env.insert("f_port".to_string(), i64::from(f_port).into());
    env.insert("payload".to_string(), payload);
    env
}
