//! JSON envelopes exchanged over the HTTP routes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{AnalysisResult, ModelCategory, ThinkingModel};

// ── Requests ────────────────────────────────────────────────────────

/// Body of `POST /api/models`. Fields stay loosely typed so a wrong JSON
/// type is reported as a validation failure instead of a decode error.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RecommendRequest {
    #[serde(default)]
    pub question: Option<Value>,
}

impl RecommendRequest {
    pub fn question(&self) -> Option<&str> {
        self.question.as_ref().and_then(Value::as_str)
    }
}

/// Body of `POST /api/analyze`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub question: Option<Value>,
    #[serde(default)]
    pub model_id: Option<Value>,
}

impl AnalyzeRequest {
    pub fn question(&self) -> Option<&str> {
        self.question.as_ref().and_then(Value::as_str)
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_ref().and_then(Value::as_str)
    }
}

// ── Responses ───────────────────────────────────────────────────────

/// Success envelope: `{success: true, data, timestamp}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_mode: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            debug_mode: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = Some(debug_mode);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationData {
    pub question: String,
    pub recommended_models: Vec<ThinkingModel>,
    pub total_models: usize,
    pub debug_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    pub models: Vec<ThinkingModel>,
    pub total_count: usize,
    pub categories: Vec<ModelCategory>,
}

pub type AnalyzeResponse = ApiResponse<AnalysisResult>;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub provider: String,
    pub mode: String,
    pub total_models: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeReport>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeReport {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failure envelope: `{success: false, error, errorType, canRetry,
/// retryAfterMs, timestamp}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorShape {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_retry: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorShape {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_type: None,
            can_retry: None,
            retry_after_ms: None,
            timestamp: Utc::now(),
        }
    }

    /// Validation failures are never retryable.
    pub fn validation(error: impl Into<String>) -> Self {
        Self::new(error).with_type("validation").retryable(false, None)
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn retryable(mut self, can_retry: bool, retry_after_ms: Option<u64>) -> Self {
        self.can_retry = Some(can_retry);
        self.retry_after_ms = retry_after_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_tolerates_wrong_types() {
        let req: AnalyzeRequest =
            serde_json::from_value(json!({"question": 42, "modelId": "pareto-principle"})).unwrap();
        assert_eq!(req.question(), None);
        assert_eq!(req.model_id(), Some("pareto-principle"));

        let req: RecommendRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.question(), None);
    }

    #[test]
    fn test_error_shape_wire_format() {
        let v = serde_json::to_value(
            ErrorShape::new("rate limited")
                .with_type("api_limit")
                .retryable(true, Some(60_000)),
        )
        .unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["errorType"], "api_limit");
        assert_eq!(v["canRetry"], true);
        assert_eq!(v["retryAfterMs"], 60_000);
    }

    #[test]
    fn test_recommendation_omits_fallback_when_absent() {
        let data = RecommendationData {
            question: "q".into(),
            recommended_models: vec![],
            total_models: 30,
            debug_mode: false,
            fallback: None,
            error: None,
        };
        let v = serde_json::to_value(ApiResponse::ok(data)).unwrap();
        assert_eq!(v["data"]["totalModels"], 30);
        assert!(v["data"].get("fallback").is_none());
        assert!(v.get("debugMode").is_none());
    }
}
