//! HTTP surface: recommendation, catalog listing, single analysis and a
//! health probe.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use agent::{classify, CompletionError, FailureKind};
use common::protocol::{
    AnalyzeRequest, ApiResponse, CatalogData, ErrorShape, HealthReport, ProbeReport, RecommendRequest,
    RecommendationData,
};
use common::validation::{validate_model_id, validate_question};
use common::ValidationError;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/models", get(list_models).post(recommend_models))
        .route("/api/analyze", post(analyze))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorShape::validation(message))).into_response()
}

/// Decode a body leniently: an empty or malformed body is treated as `{}`
/// so the missing-field check produces the error message.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        warn!("Unreadable request body: {}", e);
        T::default()
    })
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Network => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        FailureKind::Quota => StatusCode::PAYMENT_REQUIRED,
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn upstream_failure(err: &CompletionError) -> Response {
    let classified = classify(err);
    let shape = ErrorShape::new(classified.message)
        .with_type(classified.error_type.as_str())
        .retryable(classified.can_retry, classified.retry_delay_ms);
    (status_for(err.kind()), Json(shape)).into_response()
}

// ── GET /api/models ─────────────────────────────────────────────────

async fn list_models(State(state): State<AppState>) -> Json<ApiResponse<CatalogData>> {
    Json(ApiResponse::ok(CatalogData {
        models: state.catalog.models().to_vec(),
        total_count: state.catalog.len(),
        categories: state.catalog.categories(),
    }))
}

// ── POST /api/models ────────────────────────────────────────────────

async fn recommend_models(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RecommendRequest = parse_body(&body);
    let Some(question) = request.question() else {
        return bad_request(ValidationError::MissingQuestion.to_string());
    };
    if let Err(e) = validate_question(question) {
        return bad_request(e.to_string());
    }

    let debug_mode = state.debug_mode();
    let data = match state.recommender.recommend(question).await {
        Ok(rec) => RecommendationData {
            question: question.to_string(),
            recommended_models: rec.models,
            total_models: state.catalog.len(),
            debug_mode,
            fallback: None,
            error: None,
        },
        Err(e) => {
            warn!("Recommendation failed, returning popular models: {}", e);
            RecommendationData {
                question: question.to_string(),
                recommended_models: state.recommender.popular(),
                total_models: state.catalog.len(),
                debug_mode,
                fallback: Some(true),
                error: Some(e.to_string()),
            }
        }
    };
    Json(ApiResponse::ok(data)).into_response()
}

// ── POST /api/analyze ───────────────────────────────────────────────

async fn analyze(State(state): State<AppState>, body: Bytes) -> Response {
    let request: AnalyzeRequest = parse_body(&body);
    let (Some(question), Some(model_id)) = (request.question(), request.model_id()) else {
        return bad_request("question and modelId are required");
    };
    if let Err(e) = validate_question(question) {
        return bad_request(e.to_string());
    }
    if let Err(e) = validate_model_id(model_id) {
        return bad_request(e.to_string());
    }
    if !state.catalog.contains(model_id) {
        return bad_request(ValidationError::UnknownModel(model_id.to_string()).to_string());
    }

    let request_id = Uuid::new_v4();
    info!(%request_id, model = %model_id, "Analysis requested");
    let debug_mode = state.debug_mode();
    match state.analyzer.analyze(question, model_id).await {
        Ok(result) => Json(ApiResponse::ok(result).with_debug_mode(debug_mode)).into_response(),
        Err(e) if e.kind() != FailureKind::Validation && state.config.synthetic_fallback() => {
            warn!(%request_id, "Analysis failed, serving synthetic result: {}", e);
            let result = state.analyzer.synthetic_result(question, model_id);
            Json(ApiResponse::ok(result).with_debug_mode(true)).into_response()
        }
        Err(e) => {
            warn!(%request_id, "Analysis failed: {}", e);
            upstream_failure(&e)
        }
    }
}

// ── GET /api/health ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct HealthQuery {
    #[serde(default)]
    probe: bool,
}

async fn health(State(state): State<AppState>, Query(query): Query<HealthQuery>) -> Json<HealthReport> {
    let probe = if query.probe {
        let report = match state.provider.health_check().await {
            Ok(()) => ProbeReport { ok: true, error: None },
            Err(e) => ProbeReport {
                ok: false,
                error: Some(e.to_string()),
            },
        };
        Some(report)
    } else {
        None
    };
    let status = match &probe {
        Some(ProbeReport { ok: false, .. }) => "degraded",
        _ => "ok",
    };
    Json(HealthReport {
        status: status.to_string(),
        provider: state.provider.name().to_string(),
        mode: state.provider.mode().as_str().to_string(),
        total_models: state.catalog.len(),
        probe,
    })
}
