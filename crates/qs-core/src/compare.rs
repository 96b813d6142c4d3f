use regex::Regex;

use crate::value::Value;

/// Matches a complete base-ten numeral, including exponent notation.
const NUMERIC_TEXT_PATTERN: &str = r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$";

/// A value takes part in numeric comparison when it is a number or a text
/// that parses fully as a base-ten numeral (`"05"` yes, `"5a"` no).
pub fn is_numeric_comparable(value: &Value) -> bool {
    numeric_value(value).is_some()
}

pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => Some(*number),
        Value::Text(text) => {
            let pattern =
                Regex::new(NUMERIC_TEXT_PATTERN).expect("numeric text pattern must compile");
            if pattern.is_match(text) {
                text.parse::<f64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Loose equality: when both sides are numeric-comparable their numeric
/// values are compared, so `"05"` equals `5`. Anything else falls back to
/// strict equality.
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (numeric_value(a), numeric_value(b)) {
        (Some(left), Some(right)) => left == right,
        _ => strict_equals(a, b),
    }
}

/// Strict equality: value and type must both match, so `"5a"` never equals
/// `5` and `"5"` never equals `5` either.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    a == b
}
