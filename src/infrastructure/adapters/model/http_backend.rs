//! HTTP Model Backend - 调用外部推理进程
//!
//! 神经网络跑在独立的推理服务里（与本服务共享模型目录），
//! 本后端通过 HTTP 传递文本与潜变量：
//!
//! POST {base}/api/model/conditioning
//!   Request: {"reference_audio": "..."}  (JSON)
//!   Response: {"gpt_cond_latent": [...], "speaker_embedding": [...]}
//!
//! POST {base}/api/model/inference
//!   Request: {"text", "language", 潜变量, 合成参数}  (JSON)
//!   Response: audio/wav binary
//!
//! POST {base}/api/model/release  清理推理缓存

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::application::ports::{ConditioningLatents, ModelError, SegmentAudio};
use crate::domain::params::SynthesisParams;
use crate::domain::wav;

use super::ModelBackend;

/// 条件潜变量请求体
#[derive(Debug, Serialize)]
struct ConditioningHttpRequest<'a> {
    reference_audio: &'a str,
}

/// 推理请求体
#[derive(Debug, Serialize)]
struct InferenceHttpRequest<'a> {
    text: &'a str,
    language: &'a str,
    gpt_cond_latent: &'a [f32],
    speaker_embedding: &'a [f32],
    #[serde(flatten)]
    params: &'a SynthesisParams,
}

/// HTTP 后端配置
#[derive(Debug, Clone)]
pub struct HttpModelBackendConfig {
    /// 推理服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpModelBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

/// HTTP 推理后端
pub struct HttpModelBackend {
    client: Client,
    config: HttpModelBackendConfig,
}

impl HttpModelBackend {
    pub fn new(config: HttpModelBackendConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn conditioning_url(&self) -> String {
        format!("{}/api/model/conditioning", self.config.base_url)
    }

    fn inference_url(&self) -> String {
        format!("{}/api/model/inference", self.config.base_url)
    }

    fn release_url(&self) -> String {
        format!("{}/api/model/release", self.config.base_url)
    }

    fn map_request_error(e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout
        } else if e.is_connect() {
            ModelError::Backend(format!("Cannot connect to inference service: {}", e))
        } else {
            ModelError::Backend(e.to_string())
        }
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    async fn derive_conditioning(
        &self,
        reference_audio: &Path,
    ) -> Result<ConditioningLatents, ModelError> {
        let reference = reference_audio.display().to_string();
        tracing::debug!(
            url = %self.conditioning_url(),
            reference = %reference,
            "Requesting conditioning latents"
        );

        let response = self
            .client
            .post(self.conditioning_url())
            .json(&ConditioningHttpRequest {
                reference_audio: &reference,
            })
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ModelError::Backend(format!("HTTP {}: {}", status, detail)));
        }

        let latents: ConditioningLatents = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            gpt_cond_len = latents.gpt_cond_latent.len(),
            embedding_len = latents.speaker_embedding.len(),
            "Conditioning latents derived"
        );
        Ok(latents)
    }

    async fn infer(
        &self,
        text: &str,
        language: &str,
        latents: &ConditioningLatents,
        params: &SynthesisParams,
    ) -> Result<SegmentAudio, ModelError> {
        let response = self
            .client
            .post(self.inference_url())
            .json(&InferenceHttpRequest {
                text,
                language,
                gpt_cond_latent: &latents.gpt_cond_latent,
                speaker_embedding: &latents.speaker_embedding,
                params,
            })
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ModelError::Backend(format!("HTTP {}: {}", status, detail)));
        }

        let audio_bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("Failed to read audio: {}", e)))?;

        let (samples, sample_rate) = wav::decode(&audio_bytes)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            text_len = text.chars().count(),
            samples = samples.len(),
            sample_rate,
            "Segment inference completed"
        );

        Ok(SegmentAudio {
            samples,
            sample_rate,
        })
    }

    async fn release_cache(&self) {
        if let Err(e) = self.client.post(self.release_url()).send().await {
            tracing::debug!(error = %e, "Cache release request failed, ignoring");
        }
    }
}
