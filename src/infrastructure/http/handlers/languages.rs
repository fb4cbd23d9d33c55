//! Languages Handler

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};

use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::state::AppState;

/// 支持的语言表（语言码 -> 显示名）
pub async fn languages(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<BTreeMap<String, String>>> {
    let table: BTreeMap<String, String> = state
        .service
        .supported_languages()
        .iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

    Json(ApiResponse::success(table))
}
