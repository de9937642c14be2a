use common::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong, decided where the failure happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Network,
    RateLimit,
    Quota,
    Validation,
    Unknown,
}

#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    /// Transport failure after the retry budget was spent
    #[error("network error: {0}")]
    Network(String),

    #[error("completion API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    Parse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Other(String),
}

impl CompletionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CompletionError::Network(_) => FailureKind::Network,
            CompletionError::Http { status: 429, .. } => FailureKind::RateLimit,
            CompletionError::Http { status: 402, .. } => FailureKind::Quota,
            CompletionError::Http { status: 400, .. } => FailureKind::Validation,
            CompletionError::Validation(_) => FailureKind::Validation,
            CompletionError::Http { .. } | CompletionError::Parse(_) | CompletionError::Other(_) => {
                FailureKind::Unknown
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Shorten an upstream body for logs and error messages.
pub(crate) fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_by_status() {
        let http = |status| CompletionError::Http { status, body: String::new() };
        assert_eq!(http(429).kind(), FailureKind::RateLimit);
        assert_eq!(http(402).kind(), FailureKind::Quota);
        assert_eq!(http(400).kind(), FailureKind::Validation);
        assert_eq!(http(503).kind(), FailureKind::Unknown);
        assert_eq!(CompletionError::Network("reset".into()).kind(), FailureKind::Network);
        assert_eq!(
            CompletionError::from(ValidationError::UnknownModel("x".into())).kind(),
            FailureKind::Validation
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("短文本", 10), "短文本");
        assert_eq!(truncate("服务暂时不可用", 4), "服务暂时...");
    }
}
