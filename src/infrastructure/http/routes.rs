//! HTTP Routes
//!
//! API Endpoints:
//! - /health                 GET   健康检查（开放）
//! - /languages              GET   支持语言表（开放）
//! - /tts                    POST  提交合成任务（multipart，需 API Key）
//! - /tts/status/:task_id    GET   查询任务状态（需 API Key）
//! - /tts/result/:task_id    GET   下载合成结果（需 API Key）

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::middleware::api_key_middleware;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/tts", post(handlers::submit_tts))
        .route("/tts/status/:task_id", get(handlers::task_status))
        .route("/tts/result/:task_id", get(handlers::task_result))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/languages", get(handlers::languages))
        .merge(protected)
        .with_state(state)
}
