//! Data Transfer Objects

use serde::Serialize;

use crate::application::ports::RetryInfo;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    #[allow(dead_code)]
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// TTS DTOs
// ============================================================================

/// 提交响应
#[derive(Debug, Serialize)]
pub struct TtsSubmitResponse {
    pub message: String,
    pub task_id: String,
    pub status_url: String,
}

/// 成功任务的结果摘要
#[derive(Debug, Serialize)]
pub struct TaskResultSummary {
    pub message: String,
    pub filename: String,
    pub download_url: String,
}

/// 重投信息
#[derive(Debug, Serialize)]
pub struct RetryDto {
    pub reason: String,
    pub eta: String,
    pub retries_left: u32,
}

impl From<RetryInfo> for RetryDto {
    fn from(info: RetryInfo) -> Self {
        Self {
            reason: info.reason,
            eta: info.eta.to_rfc3339(),
            retries_left: info.retries_left,
        }
    }
}

/// 任务状态快照
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    /// 统一大写状态令牌
    pub status: String,
    /// ISO-8601 UTC 时间戳
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResultSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryDto>,
}

/// 结果尚未就绪时的占位响应
#[derive(Debug, Serialize)]
pub struct PendingResultResponse {
    pub message: String,
    pub status: String,
}

// ============================================================================
// Health DTO
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthDetails {
    pub model_ready: bool,
    pub model_status_message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub details: HealthDetails,
}
