//! Response interpretation: how a learner's raw text answer becomes a value,
//! whether it is complete enough to grade, and what to tell the learner when
//! it is not.

use qs_core::{ConfigError, Value};
use regex::Regex;

/// How the raw response text is interpreted before comparison. The numeric
/// codes are the persisted wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    String,
    StringCaseSensitive,
    Numeric,
    Binary,
    Hexadecimal,
    Octal,
}

impl ResponseMode {
    pub fn from_code(code: i64) -> Result<Self, ConfigError> {
        match code {
            0 => Ok(Self::String),
            1 => Ok(Self::Numeric),
            2 => Ok(Self::Binary),
            3 => Ok(Self::Hexadecimal),
            4 => Ok(Self::Octal),
            5 => Ok(Self::StringCaseSensitive),
            other => Err(ConfigError::InvalidResponseMode(other)),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::String => 0,
            Self::Numeric => 1,
            Self::Binary => 2,
            Self::Hexadecimal => 3,
            Self::Octal => 4,
            Self::StringCaseSensitive => 5,
        }
    }
}

/// How an answer expression is matched against the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// The answer expression is evaluated and must equal the response.
    MustEqual,
    /// The answer expression sees the response as `resp` / `response` and
    /// must evaluate to a truthy value.
    MustEvalTrue,
}

impl AnswerMode {
    pub fn from_code(code: i64) -> Result<Self, ConfigError> {
        match code {
            0 => Ok(Self::MustEqual),
            2 => Ok(Self::MustEvalTrue),
            other => Err(ConfigError::InvalidGradingMode(other)),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::MustEqual => 0,
            Self::MustEvalTrue => 2,
        }
    }
}

/// One graded answer row: the expression to match, the mark fraction it
/// earns, and the feedback shown when it matches.
#[derive(Debug, Clone)]
pub struct Answer {
    pub expression: String,
    pub fraction: f64,
    pub feedback: String,
}

/// Converts raw response text to the value used for comparison. Unparseable
/// input becomes `Bool(false)`, a sentinel that never compares equal to a
/// legitimate answer value.
pub fn parse_response(mode: ResponseMode, raw: &str) -> Value {
    let trimmed = raw.trim();
    match mode {
        ResponseMode::String => Value::Text(trimmed.to_lowercase()),
        ResponseMode::StringCaseSensitive => Value::Text(trimmed.to_string()),
        ResponseMode::Numeric => parse_numeric(trimmed),
        ResponseMode::Binary => parse_radix(trimmed, &["0b", "0B", "%"], 2),
        ResponseMode::Hexadecimal => parse_radix(trimmed, &["0x", "0X", "$"], 16),
        ResponseMode::Octal => parse_radix(trimmed, &["0o", "0O", "@"], 8),
    }
}

fn parse_numeric(text: &str) -> Value {
    if text.is_empty() {
        return Value::Bool(false);
    }
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return match u64::from_str_radix(digits, 16) {
            Ok(number) => Value::Number(number as f64),
            Err(_) => Value::Bool(false),
        };
    }
    // Longest leading numeral, like PHP's floatval: "1.5kg" is 1.5 and
    // "kg1.5" is 0.
    let prefix = Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
        .expect("numeric prefix pattern must compile");
    let number = prefix
        .find(text)
        .and_then(|numeral| numeral.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);
    Value::Number(number)
}

fn parse_radix(text: &str, prefixes: &[&str], radix: u32) -> Value {
    let mut digits = text;
    for prefix in prefixes {
        if let Some(rest) = text.strip_prefix(prefix) {
            digits = rest;
            break;
        }
    }
    if digits.is_empty() {
        return Value::Number(0.0);
    }
    match u64::from_str_radix(digits, radix) {
        Ok(number) => Value::Number(number as f64),
        Err(_) => Value::Bool(false),
    }
}

/// Whether the raw text is gradeable at all. An incomplete response is
/// rejected with [`validation_error`] before grading runs.
pub fn is_complete_response(mode: ResponseMode, raw: &str) -> bool {
    let trimmed = raw.trim();
    match mode {
        ResponseMode::String | ResponseMode::StringCaseSensitive => !trimmed.is_empty(),
        ResponseMode::Numeric => {
            let pattern = Regex::new(
                r"^(?:[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?|0[xX][0-9a-fA-F]+)$",
            )
            .expect("numeric completeness pattern must compile");
            pattern.is_match(trimmed)
        }
        ResponseMode::Binary => radix_complete(trimmed, r"^(?:0[bB]|%)?[01]+$"),
        ResponseMode::Hexadecimal => radix_complete(trimmed, r"^(?:0[xX]|\$)?[0-9a-fA-F]+$"),
        ResponseMode::Octal => radix_complete(trimmed, r"^(?:0[oO]|@)?[0-7]+$"),
    }
}

// Radix modes accept an empty response as zero, so empty is complete.
fn radix_complete(trimmed: &str, pattern: &str) -> bool {
    trimmed.is_empty()
        || Regex::new(pattern)
            .expect("radix completeness pattern must compile")
            .is_match(trimmed)
}

/// The learner-facing message for an incomplete response in this mode.
pub fn validation_error(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::String | ResponseMode::StringCaseSensitive => "Please enter an answer.",
        ResponseMode::Numeric => "Your answer must be a decimal number.",
        ResponseMode::Binary => "Your answer must be a binary number.",
        ResponseMode::Hexadecimal => "Your answer must be a hexadecimal number.",
        ResponseMode::Octal => "Your answer must be an octal number.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        for code in [0, 1, 2, 3, 4, 5] {
            let mode = ResponseMode::from_code(code).expect("valid code");
            assert_eq!(mode.code(), code);
        }
        assert!(ResponseMode::from_code(9).is_err());

        for code in [0, 2] {
            let mode = AnswerMode::from_code(code).expect("valid code");
            assert_eq!(mode.code(), code);
        }
        assert!(AnswerMode::from_code(1).is_err());
    }

    #[test]
    fn string_mode_lowercases_and_trims() {
        assert_eq!(
            parse_response(ResponseMode::String, "  HeLLo "),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            parse_response(ResponseMode::StringCaseSensitive, " HeLLo"),
            Value::Text("HeLLo".to_string())
        );
    }

    #[test]
    fn numeric_mode_parses_prefixes_like_floatval() {
        assert_eq!(
            parse_response(ResponseMode::Numeric, "1.5kg"),
            Value::Number(1.5)
        );
        assert_eq!(
            parse_response(ResponseMode::Numeric, "kg"),
            Value::Number(0.0)
        );
        assert_eq!(
            parse_response(ResponseMode::Numeric, "0x1F"),
            Value::Number(31.0)
        );
        assert_eq!(parse_response(ResponseMode::Numeric, ""), Value::Bool(false));
    }

    #[test]
    fn radix_modes_strip_their_prefixes() {
        assert_eq!(
            parse_response(ResponseMode::Binary, "0b101"),
            Value::Number(5.0)
        );
        assert_eq!(
            parse_response(ResponseMode::Binary, "%101"),
            Value::Number(5.0)
        );
        assert_eq!(
            parse_response(ResponseMode::Hexadecimal, "$ff"),
            Value::Number(255.0)
        );
        assert_eq!(
            parse_response(ResponseMode::Octal, "@17"),
            Value::Number(15.0)
        );
        assert_eq!(parse_response(ResponseMode::Octal, ""), Value::Number(0.0));
        assert_eq!(
            parse_response(ResponseMode::Binary, "0b12"),
            Value::Bool(false)
        );
    }

    #[test]
    fn completeness_follows_the_mode() {
        assert!(is_complete_response(ResponseMode::String, "hi"));
        assert!(!is_complete_response(ResponseMode::String, "   "));

        assert!(is_complete_response(ResponseMode::Numeric, "-2.5e3"));
        assert!(is_complete_response(ResponseMode::Numeric, "0x1F"));
        assert!(!is_complete_response(ResponseMode::Numeric, "1.5kg"));
        assert!(!is_complete_response(ResponseMode::Numeric, ""));

        assert!(is_complete_response(ResponseMode::Binary, ""));
        assert!(is_complete_response(ResponseMode::Binary, "0b1011"));
        assert!(!is_complete_response(ResponseMode::Binary, "0b12"));

        assert!(is_complete_response(ResponseMode::Hexadecimal, "$dead"));
        assert!(!is_complete_response(ResponseMode::Hexadecimal, "0xzz"));

        assert!(is_complete_response(ResponseMode::Octal, "@17"));
        assert!(!is_complete_response(ResponseMode::Octal, "19"));
    }

    #[test]
    fn validation_messages_name_the_expected_base() {
        assert!(validation_error(ResponseMode::Binary).contains("binary"));
        assert!(validation_error(ResponseMode::Hexadecimal).contains("hexadecimal"));
    }
}
