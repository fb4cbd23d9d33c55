//! HTTP Middleware
//!
//! API Key 校验中间件 + HTTP 状态码错误日志中间件

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use super::state::AppState;

/// API Key 校验中间件
///
/// 只挂在 /tts 系列路由上；/health 与 /languages 开放访问。
/// Key 的分发与轮换不在本服务职责内
pub async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(state.key_header.as_str())
        .and_then(|v| v.to_str().ok());

    match provided {
        None => {
            tracing::warn!(
                uri = %request.uri(),
                header = %state.key_header,
                "Request rejected: missing API key"
            );
            ApiError::Unauthorized(format!(
                "API key required. Provide it in the '{}' header.",
                state.key_header
            ))
            .into_response()
        }
        Some(key) if !state.api_keys.iter().any(|k| k == key) => {
            tracing::warn!(
                uri = %request.uri(),
                key_prefix = %&key[..key.len().min(8)],
                "Request rejected: invalid API key"
            );
            ApiError::Forbidden("API key is invalid or not allowed.".to_string()).into_response()
        }
        Some(_) => next.run(request).await,
    }
}

/// HTTP 状态码错误日志中间件
///
/// 拦截 HTTP 响应，当状态码为 4xx 或 5xx 时记录日志
/// 注意：业务错误（errno != 0）在 ApiError::into_response() 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP client error"
        );
    }

    response
}
