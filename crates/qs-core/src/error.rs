use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by a scripting backend. Resource-limit violations are
/// a distinct variant so the host can message "this script ran too long"
/// instead of a generic error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    Runtime(String),
    #[error("{0}")]
    ResourceExceeded(String),
}

impl LanguageError {
    pub fn message(&self) -> &str {
        match self {
            Self::Syntax(message) | Self::Runtime(message) | Self::ResourceExceeded(message) => {
                message
            }
        }
    }

    pub fn is_resource_exceeded(&self) -> bool {
        matches!(self, Self::ResourceExceeded(_))
    }
}

/// Persisted attempt state failed to decode. The host decides whether to
/// fail the attempt or reinitialize; the core never panics on bad blobs.
#[derive(Debug, Error)]
#[error("malformed attempt state: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// A misconfigured question, distinct from learner-facing grading outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown scripting language \"{0}\"")]
    UnknownLanguage(String),
    #[error("invalid grading mode code {0}")]
    InvalidGradingMode(i64),
    #[error("invalid response mode code {0}")]
    InvalidResponseMode(i64),
}

/// Best-effort error details surfaced to authoring tools. The line number is
/// recovered from the `"<line>: <rest>"` message convention when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    pub line_number: Option<u32>,
}

impl ErrorInfo {
    pub fn from_message(message: &str) -> Self {
        let line_number = message
            .split_once(':')
            .and_then(|(prefix, _)| prefix.trim().parse::<u32>().ok());
        Self {
            message: message.to_string(),
            line_number,
        }
    }
}
