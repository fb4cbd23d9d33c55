//! Task Status/Result Handlers
//!
//! 可轮询的任务状态契约：状态查询永远返回快照，绝不因任务
//! 未完成而报错；结果下载只在 SUCCESS 且产物仍在时放行，
//! 产物被清理返回 NOT_FOUND（与"尚未完成"可区分）

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tokio_util::io::ReaderStream;

use crate::application::ports::{JobState, StoreError, UNKNOWN_STATE};
use crate::infrastructure::http::dto::{
    ApiResponse, PendingResultResponse, TaskResultSummary, TaskStatusResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 查询任务状态
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Json<ApiResponse<TaskStatusResponse>> {
    let timestamp = Utc::now().to_rfc3339();

    let response = match state.service.status(&task_id) {
        None => TaskStatusResponse {
            task_id,
            status: UNKNOWN_STATE.to_string(),
            timestamp,
            message: Some("Task id is unknown to this server.".to_string()),
            result: None,
            error_details: None,
            retry: None,
        },
        Some(job) => match job.state {
            JobState::Success => {
                let result = job.result.map(|r| TaskResultSummary {
                    message: "Speech synthesis completed successfully.".to_string(),
                    download_url: format!("{}/tts/result/{}", state.public_base_url, job.id),
                    filename: r.filename,
                });
                TaskStatusResponse {
                    task_id,
                    status: job.state.as_str().to_string(),
                    timestamp,
                    message: None,
                    result,
                    error_details: None,
                    retry: None,
                }
            }
            JobState::Failure | JobState::Revoked => TaskStatusResponse {
                task_id,
                status: job.state.as_str().to_string(),
                timestamp,
                message: None,
                result: None,
                error_details: Some(
                    job.error
                        .unwrap_or_else(|| "Unknown worker-side error.".to_string()),
                ),
                retry: None,
            },
            JobState::Pending | JobState::Started | JobState::Retry => TaskStatusResponse {
                task_id,
                status: job.state.as_str().to_string(),
                timestamp,
                message: Some("Request is being processed or waiting in the queue.".to_string()),
                result: None,
                error_details: None,
                retry: job.retry.map(Into::into),
            },
        },
    };

    Json(ApiResponse::success(response))
}

/// 下载任务结果
///
/// SUCCESS 时以附件流式返回产物；其余状态返回结构化响应
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(job) = state.service.status(&task_id) else {
        return Err(ApiError::NotFound(format!("Unknown task: {}", task_id)));
    };

    match job.state {
        JobState::Success => {
            let result = job.result.ok_or_else(|| {
                ApiError::Internal("Task succeeded but result metadata is incomplete.".to_string())
            })?;

            match state.store.open_artifact(&result.filename).await {
                Ok((file, size)) => {
                    tracing::info!(
                        task_id = %task_id,
                        filename = %result.filename,
                        bytes = size,
                        "Serving synthesis result"
                    );
                    let stream = ReaderStream::new(file);
                    Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, "audio/wav")
                        .header(header::CONTENT_LENGTH, size)
                        .header(
                            header::CONTENT_DISPOSITION,
                            format!("attachment; filename=\"{}\"", result.filename),
                        )
                        .body(Body::from_stream(stream))
                        .map_err(|e| ApiError::Internal(e.to_string()))
                }
                Err(StoreError::NotFound(_)) => {
                    tracing::error!(
                        task_id = %task_id,
                        filename = %result.filename,
                        "Task succeeded but the result file is gone"
                    );
                    Err(ApiError::NotFound(
                        "Result file no longer exists on the server. It may have been purged."
                            .to_string(),
                    ))
                }
                Err(e) => Err(ApiError::Internal(format!(
                    "Failed to open result file: {}",
                    e
                ))),
            }
        }
        JobState::Failure | JobState::Revoked => Err(ApiError::BadRequest(format!(
            "Task processing failed, no result is available. Check /tts/status/{} for details.",
            task_id
        ))),
        JobState::Pending | JobState::Started | JobState::Retry => {
            Ok(Json(ApiResponse::success(PendingResultResponse {
                message: "Processing is not finished yet. Check the status endpoint.".to_string(),
                status: job.state.as_str().to_string(),
            }))
            .into_response())
        }
    }
}
