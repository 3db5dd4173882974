//! # Device State Records
//!
//! Typed views of the payloads the fan exchanges with us. Field names on the
//! wire are four letter codes (`fmod`, `fnsp`, ...); the serde renames below are
//! the one and only name table used by both the plain and the diff decoder.
//!
//! Every value is an `Option<String>`. `None` means "not reported" on inbound
//! records and "leave unchanged" on [`FanState`]. Numbers and booleans are not
//! coerced: the device expects `"0007"`, not `7`, and `"ON"`, not `true`.

use serde::{Deserialize, Serialize};

use super::units;

// Fan mode (fmod)
pub const FAN_MODE_OFF: &str = "OFF";
pub const FAN_MODE_ON: &str = "FAN";
pub const FAN_MODE_AUTO: &str = "AUTO";

// Switches shared by oson, nmod, rhtm, ffoc, hmod
pub const ON: &str = "ON";
pub const OFF: &str = "OFF";

/// Heat mode on-value for hot+cool models
pub const HEAT_MODE_HEAT: &str = "HEAT";

// Air quality target (qtar)
pub const QUALITY_TARGET_LOW: &str = "0001";
pub const QUALITY_TARGET_NORMAL: &str = "0003";
pub const QUALITY_TARGET_HIGH: &str = "0004";

/// Fan speed keyword for automatic speed
pub const FAN_SPEED_AUTO: &str = "AUTO";

/// Formats a numeric fan speed (1-10) the way `fnsp` carries it.
pub fn fan_speed_code(speed: u8) -> String {
    format!("{:04}", speed)
}

pub(crate) fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Outbound intent for a `STATE-SET` command.
///
/// Only fields that are set end up in the envelope; everything else keeps its
/// current value on the device.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FanState {
    #[serde(rename = "fmod", skip_serializing_if = "is_unset")]
    pub fan_mode: Option<String>,
    #[serde(rename = "fnsp", skip_serializing_if = "is_unset")]
    pub fan_speed: Option<String>,
    #[serde(rename = "oson", skip_serializing_if = "is_unset")]
    pub oscillate: Option<String>,
    #[serde(rename = "sltm", skip_serializing_if = "is_unset")]
    pub sleep_timer: Option<String>,
    /// Keep sensors running (and reporting) while the fan is off
    #[serde(rename = "rhtm", skip_serializing_if = "is_unset")]
    pub standby_monitoring: Option<String>,
    #[serde(rename = "rstf", skip_serializing_if = "is_unset")]
    pub reset_filter: Option<String>,
    #[serde(rename = "qtar", skip_serializing_if = "is_unset")]
    pub quality_target: Option<String>,
    #[serde(rename = "nmod", skip_serializing_if = "is_unset")]
    pub night_mode: Option<String>,
    #[serde(rename = "hmod", skip_serializing_if = "is_unset")]
    pub heat_mode: Option<String>,
    #[serde(rename = "hmax", skip_serializing_if = "is_unset")]
    pub heat_target: Option<String>,
    #[serde(rename = "ffoc", skip_serializing_if = "is_unset")]
    pub focused_mode: Option<String>,
}

impl FanState {
    pub fn with_fan_mode(mut self, mode: impl Into<String>) -> Self {
        self.fan_mode = Some(mode.into());
        self
    }

    pub fn with_fan_speed(mut self, speed: u8) -> Self {
        self.fan_speed = Some(fan_speed_code(speed));
        self
    }

    pub fn with_oscillate(mut self, on: bool) -> Self {
        self.oscillate = Some(switch(on));
        self
    }

    pub fn with_night_mode(mut self, on: bool) -> Self {
        self.night_mode = Some(switch(on));
        self
    }

    pub fn with_sleep_timer(mut self, timer: impl Into<String>) -> Self {
        self.sleep_timer = Some(timer.into());
        self
    }

    pub fn with_heat_target_fahrenheit(mut self, fahrenheit: i32) -> Self {
        self.heat_target = Some(units::heat_target_from_fahrenheit(fahrenheit));
        self
    }

    /// True when nothing would be sent to the device.
    pub fn is_empty(&self) -> bool {
        [
            &self.fan_mode,
            &self.fan_speed,
            &self.oscillate,
            &self.sleep_timer,
            &self.standby_monitoring,
            &self.reset_filter,
            &self.quality_target,
            &self.night_mode,
            &self.heat_mode,
            &self.heat_target,
            &self.focused_mode,
        ]
        .into_iter()
        .all(is_unset)
    }
}

fn switch(on: bool) -> String {
    let value = if on { ON } else { OFF };
    value.to_string()
}

/// Canonical device state as reported in `CURRENT-STATE` and `STATE-CHANGE`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProductState {
    #[serde(rename = "fmod", skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<String>,
    #[serde(rename = "fnsp", skip_serializing_if = "Option::is_none")]
    pub fan_speed: Option<String>,
    #[serde(rename = "oson", skip_serializing_if = "Option::is_none")]
    pub oscillate: Option<String>,
    #[serde(rename = "sltm", skip_serializing_if = "Option::is_none")]
    pub sleep_timer: Option<String>,
    #[serde(rename = "rhtm", skip_serializing_if = "Option::is_none")]
    pub standby_monitoring: Option<String>,
    #[serde(rename = "rstf", skip_serializing_if = "Option::is_none")]
    pub reset_filter: Option<String>,
    #[serde(rename = "qtar", skip_serializing_if = "Option::is_none")]
    pub quality_target: Option<String>,
    #[serde(rename = "nmod", skip_serializing_if = "Option::is_none")]
    pub night_mode: Option<String>,
    #[serde(rename = "hmod", skip_serializing_if = "Option::is_none")]
    pub heat_mode: Option<String>,
    #[serde(rename = "hmax", skip_serializing_if = "Option::is_none")]
    pub heat_target: Option<String>,
    #[serde(rename = "ffoc", skip_serializing_if = "Option::is_none")]
    pub focused_mode: Option<String>,
    #[serde(rename = "fnst", skip_serializing_if = "Option::is_none")]
    pub fan_state: Option<String>,
    #[serde(rename = "hsta", skip_serializing_if = "Option::is_none")]
    pub heat_state: Option<String>,
    /// Remaining filter life in hours
    #[serde(rename = "filf", skip_serializing_if = "Option::is_none")]
    pub filter_life: Option<String>,
    #[serde(rename = "ercd", skip_serializing_if = "Option::is_none")]
    pub unknown_ercd: Option<String>,
    #[serde(rename = "wacd", skip_serializing_if = "Option::is_none")]
    pub unknown_wacd: Option<String>,
    #[serde(rename = "tilt", skip_serializing_if = "Option::is_none")]
    pub tilt: Option<String>,
}

macro_rules! overlay {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$source.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

impl ProductState {
    /// Applies the fields reported by `changes` on top of `self`.
    ///
    /// A `STATE-CHANGE` only carries what changed, so consumers that keep a
    /// full picture merge it instead of replacing their copy.
    pub fn merge(&mut self, changes: &ProductState) {
        overlay!(
            self,
            changes,
            fan_mode,
            fan_speed,
            oscillate,
            sleep_timer,
            standby_monitoring,
            reset_filter,
            quality_target,
            night_mode,
            heat_mode,
            heat_target,
            focused_mode,
            fan_state,
            heat_state,
            filter_life,
            unknown_ercd,
            unknown_wacd,
            tilt,
        );
    }

    /// Heat target in Fahrenheit, if the device reported a numeric one.
    pub fn heat_target_fahrenheit(&self) -> Option<i32> {
        self.heat_target.as_deref().and_then(units::parse_fahrenheit)
    }

    pub fn is_fan_off(&self) -> bool {
        self.fan_mode.as_deref().map_or(true, |mode| mode == FAN_MODE_OFF)
    }
}

/// Readings from `ENVIRONMENTAL-CURRENT-SENSOR-DATA`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EnvironmentState {
    #[serde(rename = "tact", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
    #[serde(rename = "hact", skip_serializing_if = "Option::is_none")]
    pub humidity: Option<String>,
    #[serde(rename = "pact", skip_serializing_if = "Option::is_none")]
    pub particulate: Option<String>,
    #[serde(rename = "vact", skip_serializing_if = "Option::is_none")]
    pub unknown_vact: Option<String>,
    #[serde(rename = "sltm", skip_serializing_if = "Option::is_none")]
    pub sleep_timer: Option<String>,
}

impl EnvironmentState {
    pub fn temperature_fahrenheit(&self) -> Option<i32> {
        self.temperature.as_deref().and_then(units::parse_fahrenheit)
    }
}

/// Reply to the bootstrap sequence. Sent at the top level of the envelope.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceCredentials {
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    #[serde(rename = "apPasswordHash")]
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_are_not_serialized() {
        let state = FanState::default().with_fan_mode(FAN_MODE_ON).with_fan_speed(7);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value, json!({"fmod": "FAN", "fnsp": "0007"}));
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let state = FanState {
            oscillate: Some(String::new()),
            night_mode: Some(ON.to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value, json!({"nmod": "ON"}));
        assert!(!state.is_empty());
        assert!(FanState {
            oscillate: Some(String::new()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn merge_only_overwrites_reported_fields() {
        let mut known = ProductState {
            fan_mode: Some("FAN".into()),
            fan_speed: Some("0004".into()),
            filter_life: Some("2087".into()),
            ..Default::default()
        };
        let change = ProductState {
            fan_speed: Some("0007".into()),
            oscillate: Some("ON".into()),
            ..Default::default()
        };
        known.merge(&change);
        assert_eq!(known.fan_mode.as_deref(), Some("FAN"));
        assert_eq!(known.fan_speed.as_deref(), Some("0007"));
        assert_eq!(known.oscillate.as_deref(), Some("ON"));
        assert_eq!(known.filter_life.as_deref(), Some("2087"));
    }

    #[test]
    fn credentials_use_camel_case_keys() {
        let creds: DeviceCredentials = serde_json::from_value(json!({
            "msg": "DEVICE-CREDENTIALS",
            "serialNumber": "NN4-CH-HEA0429A",
            "apPasswordHash": "abc=="
        }))
        .unwrap();
        assert_eq!(creds.serial_number, "NN4-CH-HEA0429A");
        assert_eq!(creds.password_hash, "abc==");
    }

    #[test]
    fn temperature_helpers() {
        let env = EnvironmentState {
            temperature: Some("2931".into()),
            ..Default::default()
        };
        assert_eq!(env.temperature_fahrenheit(), Some(68));

        let state = FanState::default().with_heat_target_fahrenheit(68);
        assert_eq!(state.heat_target.as_deref(), Some("2931"));
    }
}
