//! Error classification: maps a failure to a user-facing message, a
//! coarse type and retry guidance.
//!
//! Classifiers are tried in a fixed order and the first one that accepts
//! the error wins. The last classifier accepts everything.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CompletionError;

pub const MSG_NETWORK: &str = "Network connection failed, please check your connection and retry";
pub const MSG_RATE_LIMIT: &str = "Too many requests, please try again later";
pub const MSG_QUOTA: &str = "API quota exhausted, please contact the administrator";
pub const MSG_VALIDATION: &str = "Input validation failed, please check your input";
pub const MSG_SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable, please try again later";
pub const MSG_UNKNOWN: &str = "An unknown error occurred, please try again later";

/// Substrings that mark an error message as a validation failure.
const VALIDATION_MARKERS: &[&str] = &["invalid", "validation", "required", "验证", "无效", "必填"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Network,
    ApiLimit,
    Validation,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Network => "network",
            ErrorType::ApiLimit => "api_limit",
            ErrorType::Validation => "validation",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

impl ClassifiedError {
    fn new(message: impl Into<String>, error_type: ErrorType, can_retry: bool, retry_delay_ms: Option<u64>) -> Self {
        Self {
            message: message.into(),
            error_type,
            can_retry,
            retry_delay_ms,
        }
    }
}

// ── Classifiers ─────────────────────────────────────────────────────

pub trait ErrorClassifier: Send + Sync {
    fn can_handle(&self, err: &CompletionError) -> bool;
    fn handle(&self, err: &CompletionError) -> ClassifiedError;
}

pub struct NetworkClassifier;

impl ErrorClassifier for NetworkClassifier {
    fn can_handle(&self, err: &CompletionError) -> bool {
        matches!(err, CompletionError::Network(_))
    }

    fn handle(&self, _err: &CompletionError) -> ClassifiedError {
        ClassifiedError::new(MSG_NETWORK, ErrorType::Network, true, Some(2000))
    }
}

pub struct HttpStatusClassifier;

impl ErrorClassifier for HttpStatusClassifier {
    fn can_handle(&self, err: &CompletionError) -> bool {
        err.status().is_some()
    }

    fn handle(&self, err: &CompletionError) -> ClassifiedError {
        match err.status() {
            Some(429) => ClassifiedError::new(MSG_RATE_LIMIT, ErrorType::ApiLimit, true, Some(60_000)),
            Some(402) => ClassifiedError::new(MSG_QUOTA, ErrorType::ApiLimit, false, None),
            Some(400) => ClassifiedError::new(MSG_VALIDATION, ErrorType::Validation, false, None),
            _ => ClassifiedError::new(MSG_SERVICE_UNAVAILABLE, ErrorType::Unknown, true, Some(5000)),
        }
    }
}

/// Accepts any error whose message carries a validation marker and
/// passes the message through verbatim.
pub struct ValidationMessageClassifier;

impl ErrorClassifier for ValidationMessageClassifier {
    fn can_handle(&self, err: &CompletionError) -> bool {
        let message = err.to_string().to_lowercase();
        VALIDATION_MARKERS.iter().any(|m| message.contains(m))
    }

    fn handle(&self, err: &CompletionError) -> ClassifiedError {
        ClassifiedError::new(err.to_string(), ErrorType::Validation, false, None)
    }
}

pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn can_handle(&self, _err: &CompletionError) -> bool {
        true
    }

    fn handle(&self, err: &CompletionError) -> ClassifiedError {
        tracing::error!("Unhandled error: {}", err);
        ClassifiedError::new(MSG_UNKNOWN, ErrorType::Unknown, true, Some(3000))
    }
}

// ── Chain ───────────────────────────────────────────────────────────

pub struct ClassificationChain {
    classifiers: Vec<Box<dyn ErrorClassifier>>,
}

impl Default for ClassificationChain {
    fn default() -> Self {
        Self {
            classifiers: vec![
                Box::new(NetworkClassifier),
                Box::new(HttpStatusClassifier),
                Box::new(ValidationMessageClassifier),
                Box::new(DefaultClassifier),
            ],
        }
    }
}

impl ClassificationChain {
    pub fn classify(&self, err: &CompletionError) -> ClassifiedError {
        self.classifiers
            .iter()
            .find(|c| c.can_handle(err))
            .map(|c| c.handle(err))
            .unwrap_or_else(|| ClassifiedError::new(MSG_UNKNOWN, ErrorType::Unknown, false, None))
    }
}

pub fn classify(err: &CompletionError) -> ClassifiedError {
    ClassificationChain::default().classify(err)
}
