//! Health Handler

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::infrastructure::http::dto::{HealthDetails, HealthResponse};
use crate::infrastructure::http::state::AppState;

/// 健康检查
///
/// 以模型工件是否齐全为准；不触发模型加载
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (model_ready, model_message) = state.service.model_health();

    let (status_code, status, message) = if model_ready {
        (StatusCode::OK, "OK", model_message.clone())
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "ERROR",
            format!("Service is degraded, voice model is not ready: {}", model_message),
        )
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
            details: HealthDetails {
                model_ready,
                model_status_message: model_message,
            },
        }),
    )
}
