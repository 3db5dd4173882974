//! Outbound command builders.
//!
//! Each builder returns a fresh, unstamped envelope. The timestamp is set when
//! the envelope is encoded for publishing.

use super::envelope::{CommandEnvelope, MessageKind};
use super::error::EncodeError;
use super::states::FanState;

/// Request id the device expects with `JOIN-NETWORK`
pub const JOIN_NETWORK_REQUEST_ID: &str = "0123456789ABCDEF";
/// Request id the device expects with `AUTHORISE-USER-REQUEST`
pub const AUTHORISE_USER_REQUEST_ID: &str = "01234567890ABCDEF";
/// Identity sent with `AUTHORISE-USER-REQUEST`
pub const NIL_IDENTITY: &str = "00000000-0000-0000-0000-000000000000";
/// `mode-reason` of changes made through the app
pub const MODE_REASON_APP: &str = "LAPP";

/// `STATE-SET` carrying the fields of `state` that are set, flagged as an app
/// change.
pub fn build_set_state(state: &FanState) -> Result<CommandEnvelope, EncodeError> {
    let data = serde_json::to_value(state)?;
    Ok(CommandEnvelope::new(MessageKind::SetState)
        .with_mode_reason(MODE_REASON_APP)
        .with_data(data))
}

/// `REQUEST-CURRENT-STATE`. The device answers with `CURRENT-STATE` and
/// `ENVIRONMENTAL-CURRENT-SENSOR-DATA`.
pub fn build_request_current_state() -> CommandEnvelope {
    CommandEnvelope::new(MessageKind::RequestCurrentState)
}

pub fn build_join_network(ssid: &str, password: &str) -> CommandEnvelope {
    CommandEnvelope::new(MessageKind::JoinNetwork)
        .with_wifi(ssid, password)
        .with_request_id(JOIN_NETWORK_REQUEST_ID)
}

pub fn build_authorise_user() -> CommandEnvelope {
    CommandEnvelope::new(MessageKind::AuthoriseUserRequest)
        .with_request_id(AUTHORISE_USER_REQUEST_ID)
        .with_id(NIL_IDENTITY)
}

pub fn build_close_access_point() -> CommandEnvelope {
    CommandEnvelope::new(MessageKind::CloseAccessPoint)
}

/// The three envelopes that move an unconfigured device onto a wifi network,
/// in the order they have to be published.
pub fn bootstrap_sequence(ssid: &str, password: &str) -> [CommandEnvelope; 3] {
    [
        build_join_network(ssid, password),
        build_authorise_user(),
        build_close_access_point(),
    ]
}
