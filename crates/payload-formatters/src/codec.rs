use crate::error::Result;
use crate::message::{DownlinkMessage, EndDeviceModel, UplinkMessage};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Converts between `frm_payload` and `decoded_payload` of a message.
///
/// Implementations:
/// - Take the message by value and hand it back with the converted side set
/// - Return the downlink unchanged when it has no decoded payload
/// - Fail with `NoMacPayload` when the message carries no MAC payload
/// - Abort promptly when `ctx` is cancelled
///
/// `script` is formatter specific; formatters that need no configuration
/// ignore it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PayloadEncodeDecoder: Send + Sync {
    /// Encode the decoded payload of a downlink into its `frm_payload`.
    async fn encode(
        &self,
        ctx: &CancellationToken,
        msg: DownlinkMessage,
        model: &EndDeviceModel,
        script: &str,
    ) -> Result<DownlinkMessage>;

    /// Decode the `frm_payload` of an uplink into its decoded payload.
    async fn decode(
        &self,
        ctx: &CancellationToken,
        msg: UplinkMessage,
        model: &EndDeviceModel,
        script: &str,
    ) -> Result<UplinkMessage>;
}
