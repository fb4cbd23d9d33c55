//! TTS Submission Handler
//!
//! multipart 表单受理：text / language / speaker_audio_file 三个
//! 已知字段，其余键一律收进扁平参数表交给类型化解析

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::application::service::{SpeakerUpload, SubmitRequest};
use crate::infrastructure::http::dto::{ApiResponse, TtsSubmitResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 提交合成请求（异步，返回任务 ID 与状态查询地址）
pub async fn submit_tts(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<TtsSubmitResponse>>, ApiError> {
    let mut request = SubmitRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "text" => {
                request.text = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read 'text' field: {}", e))
                })?);
            }
            "language" => {
                request.language = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read 'language' field: {}", e))
                })?);
            }
            "speaker_audio_file" => {
                let original_filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        ApiError::BadRequest(format!("Failed to read speaker audio: {}", e))
                    })?
                    .to_vec();

                if let Some(original_filename) = original_filename {
                    if !data.is_empty() {
                        request.speaker_upload = Some(SpeakerUpload {
                            original_filename,
                            data,
                        });
                    }
                }
            }
            "" => {}
            other => {
                let value = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read '{}' field: {}", other, e))
                })?;
                request.form.insert(other.to_string(), value);
            }
        }
    }

    let task_id = state.service.submit(request).await?;
    let status_url = format!("{}/tts/status/{}", state.public_base_url, task_id);

    Ok(Json(ApiResponse::success(TtsSubmitResponse {
        message: "Synthesis request accepted and queued for processing.".to_string(),
        task_id,
        status_url,
    })))
}
