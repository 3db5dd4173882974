//! Temperature conversion between the device scale and Fahrenheit.
//!
//! The fan reports and accepts temperatures (`tact`, `hmax`) as tenths of a
//! kelvin-like scale. 0 °C sits at [`DEVICE_ZERO_CELSIUS`], so `2931` is 20.0 °C
//! or 68 °F. All arithmetic is integer based; halves round away from zero.

/// Device reading that corresponds to 0 °C
pub const DEVICE_ZERO_CELSIUS: i64 = 2731;

/// Converts a raw device reading to whole degrees Fahrenheit.
pub fn to_fahrenheit(raw: i32) -> i32 {
    // F = (raw - zero) / 10 * 9 / 5 + 32  ==  ((raw - zero) * 9 + 1600) / 50
    let numerator = (i64::from(raw) - DEVICE_ZERO_CELSIUS) * 9 + 1600;
    saturate(div_round_half_away(numerator, 50))
}

/// Converts whole degrees Fahrenheit to the raw device scale.
pub fn from_fahrenheit(fahrenheit: i32) -> i32 {
    // raw = (F - 32) * 5 / 9 * 10 + zero  ==  ((F - 32) * 50 + zero * 9) / 9
    let numerator = (i64::from(fahrenheit) - 32) * 50 + DEVICE_ZERO_CELSIUS * 9;
    saturate(div_round_half_away(numerator, 9))
}

/// Formats a Fahrenheit value as the four digit string used by `hmax`.
pub fn heat_target_from_fahrenheit(fahrenheit: i32) -> String {
    format!("{:04}", from_fahrenheit(fahrenheit))
}

/// Parses a raw device temperature string (e.g. `"2931"`) into Fahrenheit.
///
/// Returns `None` for the non-numeric placeholders the device sometimes sends
/// (`"OFF"`, `"INIT"`, empty).
pub fn parse_fahrenheit(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().map(to_fahrenheit)
}

/// Clamps to the `i32` range instead of wrapping.
fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

fn div_round_half_away(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        quotient + numerator.signum() * denominator.signum()
    } else {
        quotient
    }
}
