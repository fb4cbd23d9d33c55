//! TTS Application Service - 请求受理
//!
//! HTTP 前端的用例入口：入参校验、参数类型化解析、
//! 上传参考音频落盘、任务派发与派发失败时的清理。
//! 校验错误同步返回，不产生任务记录

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::application::ports::{
    ArtifactStorePort, Job, JobBrokerPort, JobPayload, ModelReadinessPort, SpeakerSource,
};
use crate::domain::language;
use crate::domain::params::{self, FormParams, PostprocParams, SynthesisParams};

/// 允许上传的参考音频扩展名
pub const ALLOWED_SPEAKER_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

/// 提交错误
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Field 'text' is required and must not be empty")]
    MissingText,

    #[error("Input text is too short: at least {0} characters required")]
    TextTooShort(usize),

    #[error("Language '{0}' is not supported. Supported languages: {1}")]
    UnsupportedLanguage(String, String),

    #[error("Invalid speaker audio file type '{0}'. Allowed: {1}")]
    InvalidSpeakerFormat(String, String),

    #[error("Voice model is not available: {0}")]
    ModelUnavailable(String),

    #[error("Failed to store uploaded speaker audio: {0}")]
    UploadStore(String),

    #[error("Failed to dispatch synthesis job: {0}")]
    Dispatch(String),
}

/// 上传的参考音频
#[derive(Debug)]
pub struct SpeakerUpload {
    pub original_filename: String,
    pub data: Vec<u8>,
}

/// 提交请求（已从 multipart 解出）
#[derive(Debug, Default)]
pub struct SubmitRequest {
    pub text: Option<String>,
    pub language: Option<String>,
    pub speaker_upload: Option<SpeakerUpload>,
    /// 其余扁平表单键值，逐键类型化解析
    pub form: FormParams,
}

/// 服务配置
#[derive(Debug, Clone)]
pub struct TtsServiceConfig {
    /// 输入文本最小字符数
    pub min_input_chars: usize,
    /// 未指定语言时的默认语言
    pub default_language: String,
}

impl Default for TtsServiceConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 3,
            default_language: "vi".to_string(),
        }
    }
}

/// TTS 应用服务
pub struct TtsService {
    broker: Arc<dyn JobBrokerPort>,
    store: Arc<dyn ArtifactStorePort>,
    readiness: Arc<dyn ModelReadinessPort>,
    config: TtsServiceConfig,
}

impl TtsService {
    pub fn new(
        broker: Arc<dyn JobBrokerPort>,
        store: Arc<dyn ArtifactStorePort>,
        readiness: Arc<dyn ModelReadinessPort>,
        config: TtsServiceConfig,
    ) -> Self {
        Self {
            broker,
            store,
            readiness,
            config,
        }
    }

    /// 受理一次合成请求，返回任务 ID
    pub async fn submit(&self, request: SubmitRequest) -> Result<String, SubmitError> {
        let text = request
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SubmitError::MissingText)?
            .to_string();

        if text.chars().count() < self.config.min_input_chars {
            return Err(SubmitError::TextTooShort(self.config.min_input_chars));
        }

        let lang = request
            .language
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&self.config.default_language)
            .trim()
            .to_lowercase();
        if !language::is_supported(&lang) {
            return Err(SubmitError::UnsupportedLanguage(
                lang,
                language::supported_codes(),
            ));
        }

        let missing = self.readiness.missing_artifacts();
        if !missing.is_empty() {
            return Err(SubmitError::ModelUnavailable(format!(
                "missing model files: {}",
                missing.join(", ")
            )));
        }

        let normalize_text = params::parse_bool(&request.form, "normalize_text", true);
        let synthesis = SynthesisParams::from_form(&request.form);
        let postproc = PostprocParams::from_form(&request.form);

        let speaker = match request.speaker_upload {
            None => SpeakerSource::Default,
            Some(upload) => {
                let extension = speaker_extension(&upload.original_filename)?;
                let path = self
                    .store
                    .save_temp_speaker(&extension, &upload.data)
                    .await
                    .map_err(|e| SubmitError::UploadStore(e.to_string()))?;
                tracing::info!(
                    path = %path.display(),
                    bytes = upload.data.len(),
                    "Uploaded speaker audio stored"
                );
                SpeakerSource::Uploaded(path)
            }
        };

        let payload = JobPayload {
            text,
            language: lang.clone(),
            speaker: speaker.clone(),
            normalize_text,
            synthesis,
            postproc,
        };

        match self.broker.submit(payload) {
            Ok(job_id) => {
                tracing::info!(job_id = %job_id, language = %lang, "Synthesis job dispatched");
                Ok(job_id)
            }
            Err(e) => {
                // 派发失败必须立刻清理刚落盘的临时文件
                if let SpeakerSource::Uploaded(path) = &speaker {
                    self.store.remove_temp(path).await;
                    tracing::info!(
                        path = %path.display(),
                        "Temp speaker audio removed after dispatch failure"
                    );
                }
                tracing::error!(error = %e, "Failed to dispatch synthesis job");
                Err(SubmitError::Dispatch(e.to_string()))
            }
        }
    }

    /// 任务状态快照，未知 ID 返回 None（由网关映射为 UNKNOWN）
    pub fn status(&self, job_id: &str) -> Option<Job> {
        self.broker.snapshot(job_id)
    }

    /// 模型健康状况：(是否就绪, 描述)
    pub fn model_health(&self) -> (bool, String) {
        let missing = self.readiness.missing_artifacts();
        if missing.is_empty() {
            (true, "Voice model artifacts are present".to_string())
        } else {
            (
                false,
                format!("Voice model is not available, missing files: {}", missing.join(", ")),
            )
        }
    }

    /// 支持的语言表
    pub fn supported_languages(&self) -> &'static [(&'static str, &'static str)] {
        language::SUPPORTED_LANGUAGES
    }
}

/// 校验上传文件扩展名，返回小写扩展名（无扩展名按 wav 处理）
fn speaker_extension(original_filename: &str) -> Result<String, SubmitError> {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "wav".to_string());

    if !ALLOWED_SPEAKER_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SubmitError::InvalidSpeakerFormat(
            original_filename.to_string(),
            ALLOWED_SPEAKER_EXTENSIONS.join(", "),
        ));
    }
    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::storage::FileArtifactStore;
    use crate::infrastructure::memory::InMemoryJobBroker;
    use tokio::sync::mpsc;

    struct ReadyModel;
    impl ModelReadinessPort for ReadyModel {
        fn missing_artifacts(&self) -> Vec<String> {
            Vec::new()
        }
    }

    struct BrokenModel;
    impl ModelReadinessPort for BrokenModel {
        fn missing_artifacts(&self) -> Vec<String> {
            vec!["model.pth".to_string()]
        }
    }

    async fn service_with(
        readiness: Arc<dyn ModelReadinessPort>,
        queue_capacity: usize,
    ) -> (TtsService, mpsc::Receiver<String>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(queue_capacity);
        let broker = Arc::new(InMemoryJobBroker::new(tx, 1));
        let store = Arc::new(FileArtifactStore::new(dir.path()).await.unwrap());
        let service = TtsService::new(broker, store, readiness, TtsServiceConfig::default());
        (service, rx, dir)
    }

    fn valid_request() -> SubmitRequest {
        SubmitRequest {
            text: Some("Xin chào bạn".to_string()),
            language: Some("vi".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_returns_job_id_and_enqueues() {
        let (service, mut rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let job_id = service.submit(valid_request()).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), job_id);
        assert!(service.status(&job_id).is_some());
    }

    #[tokio::test]
    async fn test_duplicate_submissions_get_distinct_ids() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let a = service.submit(valid_request()).await.unwrap();
        let b = service.submit(valid_request()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_missing_text_rejected() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let err = service
            .submit(SubmitRequest {
                text: Some("   ".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::MissingText));
    }

    #[tokio::test]
    async fn test_short_text_rejected() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let err = service
            .submit(SubmitRequest {
                text: Some("ab".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::TextTooShort(3)));
    }

    #[tokio::test]
    async fn test_unsupported_language_rejected() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let mut request = valid_request();
        request.language = Some("klingon".to_string());
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, SubmitError::UnsupportedLanguage(..)));
    }

    #[tokio::test]
    async fn test_default_language_applied() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let mut request = valid_request();
        request.language = None;
        let job_id = service.submit(request).await.unwrap();
        let job = service.status(&job_id).unwrap();
        assert_eq!(job.payload.language, "vi");
    }

    #[tokio::test]
    async fn test_model_unavailable_is_synchronous() {
        let (service, _rx, _dir) = service_with(Arc::new(BrokenModel), 8).await;
        let err = service.submit(valid_request()).await.unwrap_err();
        assert!(matches!(err, SubmitError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_speaker_extension_rejected() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let mut request = valid_request();
        request.speaker_upload = Some(SpeakerUpload {
            original_filename: "voice.exe".to_string(),
            data: vec![0u8; 16],
        });
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, SubmitError::InvalidSpeakerFormat(..)));
    }

    #[tokio::test]
    async fn test_uploaded_speaker_stored_and_recorded() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let mut request = valid_request();
        request.speaker_upload = Some(SpeakerUpload {
            original_filename: "voice.wav".to_string(),
            data: vec![1u8; 64],
        });
        let job_id = service.submit(request).await.unwrap();
        let job = service.status(&job_id).unwrap();
        match job.payload.speaker {
            SpeakerSource::Uploaded(path) => assert!(path.exists()),
            SpeakerSource::Default => panic!("expected uploaded speaker"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_cleans_temp_upload() {
        // 容量 1 的队列：先占满，再带上传提交
        let (service, _rx, dir) = service_with(Arc::new(ReadyModel), 1).await;
        service.submit(valid_request()).await.unwrap();

        let mut request = valid_request();
        request.speaker_upload = Some(SpeakerUpload {
            original_filename: "voice.wav".to_string(),
            data: vec![1u8; 64],
        });
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, SubmitError::Dispatch(_)));

        // 临时文件已被清理
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("speaker_upload_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_form_params_flow_into_payload() {
        let (service, _rx, _dir) = service_with(Arc::new(ReadyModel), 8).await;
        let mut request = valid_request();
        request.form.insert("temperature".to_string(), "0.9".to_string());
        request.form.insert("trim_silence".to_string(), "true".to_string());
        request.form.insert("normalize_text".to_string(), "false".to_string());
        let job_id = service.submit(request).await.unwrap();
        let job = service.status(&job_id).unwrap();
        assert_eq!(job.payload.synthesis.temperature, 0.9);
        assert!(job.payload.postproc.trim_silence);
        assert!(!job.payload.normalize_text);
    }
}
