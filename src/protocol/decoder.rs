//! # State Decoder
//!
//! Two ways of turning a device payload into a typed record:
//!
//! - **structural**: the payload is a `{code: "value"}` object and maps
//!   straight onto the record through its serde field names.
//! - **diff**: the payload of a `STATE-CHANGE` carries `{code: [old, new]}`.
//!   Only `new` is kept, then the result is decoded structurally.
//!
//! Both are lenient on individual fields. Unknown codes are ignored and a
//! field whose value has the wrong shape is dropped, since firmware updates
//! keep adding fields. Only a payload that is not an object at all fails.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::DecodeError;
use super::states::{DeviceCredentials, EnvironmentState, ProductState};

const CURRENT_STATE: &str = "CURRENT-STATE";
const ENVIRONMENT_DATA: &str = "ENVIRONMENTAL-CURRENT-SENSOR-DATA";
const STATE_CHANGE: &str = "STATE-CHANGE";
const DEVICE_CREDENTIALS: &str = "DEVICE-CREDENTIALS";

/// `product-state` of a `CURRENT-STATE` message.
pub fn decode_product_state(payload: Option<&Value>) -> Result<ProductState, DecodeError> {
    decode_structural(payload, CURRENT_STATE)
}

/// `data` of an `ENVIRONMENTAL-CURRENT-SENSOR-DATA` message.
pub fn decode_environment_state(payload: Option<&Value>) -> Result<EnvironmentState, DecodeError> {
    decode_structural(payload, ENVIRONMENT_DATA)
}

/// `product-state` of a `STATE-CHANGE` message.
///
/// ```text
/// {"fmod": ["OFF", "FAN"], "fnsp": ["0004", "0007"]}  ->  fmod=FAN, fnsp=0007
/// ```
pub fn decode_state_change(payload: Option<&Value>) -> Result<ProductState, DecodeError> {
    let map = match payload {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(DecodeError::shape(
                STATE_CHANGE,
                format!("expected an object of [old, new] pairs, got {}", type_name(other)),
            ))
        }
        None => return Err(DecodeError::shape(STATE_CHANGE, "missing product-state")),
    };

    let mut latest = Map::with_capacity(map.len());
    for (code, change) in map {
        match change.as_array().map(Vec::as_slice) {
            Some([_, Value::String(new)]) => {
                latest.insert(code.clone(), Value::String(new.clone()));
            }
            _ => debug!("Skipping state-change field {} without [old, new] pair", code),
        }
    }

    from_object(latest, STATE_CHANGE)
}

/// Credentials are not nested; the whole envelope is the record.
pub fn decode_credentials(raw: &[u8]) -> Result<DeviceCredentials, DecodeError> {
    serde_json::from_slice(raw).map_err(|e| DecodeError::shape(DEVICE_CREDENTIALS, e.to_string()))
}

fn decode_structural<T>(payload: Option<&Value>, command: &'static str) -> Result<T, DecodeError>
where
    T: DeserializeOwned + Default,
{
    match payload {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::Object(map)) => {
            let fields = map
                .iter()
                .filter(|(code, value)| {
                    let keep = value.is_string();
                    if !keep {
                        debug!("Skipping {} field {} with non-string value", command, code);
                    }
                    keep
                })
                .map(|(code, value)| (code.clone(), value.clone()))
                .collect();
            from_object(fields, command)
        }
        Some(other) => Err(DecodeError::shape(
            command,
            format!("expected an object, got {}", type_name(other)),
        )),
    }
}

fn from_object<T: DeserializeOwned>(
    fields: Map<String, Value>,
    command: &'static str,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| DecodeError::shape(command, e.to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_keeps_new_values_and_ignores_noise() {
        let payload = json!({"fmod": ["OFF", "FAN"], "fnsp": ["0004", "0007"], "bogus": "x"});
        let state = decode_state_change(Some(&payload)).unwrap();
        assert_eq!(state.fan_mode.as_deref(), Some("FAN"));
        assert_eq!(state.fan_speed.as_deref(), Some("0007"));
        assert_eq!(
            state,
            ProductState {
                fan_mode: Some("FAN".into()),
                fan_speed: Some("0007".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn diff_drops_irregular_entries() {
        let payload = json!({
            "oson": ["OFF"],
            "nmod": ["OFF", "ON", "ON"],
            "sltm": ["OFF", 15],
            "qtar": "0003",
            "rhtm": ["OFF", "ON"],
            "newf": ["a", "b"]
        });
        let state = decode_state_change(Some(&payload)).unwrap();
        assert_eq!(
            state,
            ProductState {
                standby_monitoring: Some("ON".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn diff_rejects_non_object_payloads() {
        let array = json!([["OFF", "FAN"]]);
        assert!(matches!(
            decode_state_change(Some(&array)),
            Err(DecodeError::PayloadShape { command: "STATE-CHANGE", .. })
        ));
        assert!(decode_state_change(Some(&json!("FAN"))).is_err());
        assert!(decode_state_change(None).is_err());
    }

    #[test]
    fn structural_maps_every_product_code() {
        let payload = json!({
            "fmod": "AUTO", "fnsp": "AUTO", "oson": "ON", "sltm": "OFF", "rhtm": "ON",
            "rstf": "STET", "qtar": "0004", "nmod": "OFF", "hmod": "HEAT", "hmax": "2931",
            "ffoc": "ON", "fnst": "FAN", "hsta": "OFF", "filf": "2087", "ercd": "NONE",
            "wacd": "NONE", "tilt": "OK"
        });
        let state = decode_product_state(Some(&payload)).unwrap();
        assert_eq!(state.fan_mode.as_deref(), Some("AUTO"));
        assert_eq!(state.standby_monitoring.as_deref(), Some("ON"));
        assert_eq!(state.heat_mode.as_deref(), Some("HEAT"));
        assert_eq!(state.heat_target_fahrenheit(), Some(68));
        assert_eq!(state.focused_mode.as_deref(), Some("ON"));
        assert_eq!(state.fan_state.as_deref(), Some("FAN"));
        assert_eq!(state.heat_state.as_deref(), Some("OFF"));
        assert_eq!(state.filter_life.as_deref(), Some("2087"));
        assert_eq!(state.unknown_ercd.as_deref(), Some("NONE"));
        assert_eq!(state.unknown_wacd.as_deref(), Some("NONE"));
        assert_eq!(state.tilt.as_deref(), Some("OK"));
    }

    #[test]
    fn structural_is_case_exact_and_lenient() {
        let payload = json!({"FMOD": "FAN", "fnsp": 7, "nmod": "ON", "xxxx": "1"});
        let state = decode_product_state(Some(&payload)).unwrap();
        assert_eq!(
            state,
            ProductState {
                night_mode: Some("ON".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn structural_missing_payload_is_empty_record() {
        assert_eq!(decode_product_state(None).unwrap(), ProductState::default());
        assert_eq!(
            decode_environment_state(Some(&Value::Null)).unwrap(),
            EnvironmentState::default()
        );
        assert!(decode_environment_state(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn environment_codes() {
        let payload = json!({"tact": "2956", "hact": "0046", "pact": "0002", "vact": "INIT", "sltm": "OFF"});
        let env = decode_environment_state(Some(&payload)).unwrap();
        assert_eq!(env.temperature.as_deref(), Some("2956"));
        assert_eq!(env.humidity.as_deref(), Some("0046"));
        assert_eq!(env.particulate.as_deref(), Some("0002"));
        assert_eq!(env.unknown_vact.as_deref(), Some("INIT"));
        assert_eq!(env.sleep_timer.as_deref(), Some("OFF"));
    }
}
