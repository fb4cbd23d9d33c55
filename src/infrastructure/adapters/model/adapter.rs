//! Voice Model Adapter - 模型生命周期与就绪门控
//!
//! 加载时核对三个必需工件（权重、结构配置、词表），
//! 任一缺失即进入永久 NotLoaded 状态并记录缺失清单，
//! 不做自动重试。每个 worker 上下文恰好一次加载尝试

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{
    ConditioningLatents, ModelError, ModelReadinessPort, SegmentAudio, VoiceModelPort,
};
use crate::domain::params::SynthesisParams;

use super::ModelBackend;

/// 模型工件清单
///
/// 与推理后端共享同一个模型目录；文件核对由本服务负责
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    dir: PathBuf,
    weights: String,
    config: String,
    vocab: String,
}

impl ModelArtifacts {
    pub fn new(
        dir: impl AsRef<Path>,
        weights: impl Into<String>,
        config: impl Into<String>,
        vocab: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            weights: weights.into(),
            config: config.into(),
            vocab: vocab.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 缺失的工件文件名
    pub fn missing(&self) -> Vec<String> {
        [&self.weights, &self.config, &self.vocab]
            .into_iter()
            .filter(|name| !self.dir.join(name).exists())
            .cloned()
            .collect()
    }
}

impl ModelReadinessPort for ModelArtifacts {
    fn missing_artifacts(&self) -> Vec<String> {
        self.missing()
    }
}

/// 加载结果
#[derive(Debug)]
enum ModelState {
    Ready,
    NotLoaded { missing: Vec<String> },
}

/// 语音模型适配器
///
/// worker 级单例：加载一次，跨任务复用，摊薄加载成本
/// （这是整个系统的主要延迟来源）。并发由编排器串行化
pub struct VoiceModelAdapter {
    state: ModelState,
    backend: Arc<dyn ModelBackend>,
}

impl VoiceModelAdapter {
    /// 尝试加载：核对工件并初始化后端访问
    pub fn load(artifacts: ModelArtifacts, backend: Arc<dyn ModelBackend>) -> Self {
        let missing = artifacts.missing();
        let state = if missing.is_empty() {
            tracing::info!(
                dir = %artifacts.dir().display(),
                "Voice model artifacts verified, adapter ready"
            );
            ModelState::Ready
        } else {
            tracing::error!(
                dir = %artifacts.dir().display(),
                missing = %missing.join(", "),
                "Voice model cannot be loaded, required files are missing"
            );
            ModelState::NotLoaded { missing }
        };

        Self { state, backend }
    }
}

#[async_trait]
impl VoiceModelPort for VoiceModelAdapter {
    fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready)
    }

    fn missing_artifacts(&self) -> Vec<String> {
        match &self.state {
            ModelState::Ready => Vec::new(),
            ModelState::NotLoaded { missing } => missing.clone(),
        }
    }

    async fn derive_conditioning(
        &self,
        reference_audio: &Path,
    ) -> Result<ConditioningLatents, ModelError> {
        if let ModelState::NotLoaded { missing } = &self.state {
            return Err(ModelError::NotLoaded(missing.clone()));
        }
        if !reference_audio.exists() {
            return Err(ModelError::ReferenceNotFound(
                reference_audio.display().to_string(),
            ));
        }

        self.backend.derive_conditioning(reference_audio).await
    }

    async fn synthesize_segment(
        &self,
        text: &str,
        language: &str,
        latents: &ConditioningLatents,
        params: &SynthesisParams,
    ) -> Result<SegmentAudio, ModelError> {
        if let ModelState::NotLoaded { missing } = &self.state {
            return Err(ModelError::NotLoaded(missing.clone()));
        }

        self.backend.infer(text, language, latents, params).await
    }

    async fn release_transient_memory(&self) {
        self.backend.release_cache().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::model::FakeModelBackend;

    fn artifacts_in(dir: &Path) -> ModelArtifacts {
        ModelArtifacts::new(dir, "model.pth", "config.json", "vocab.json")
    }

    fn create_artifacts(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"stub").unwrap();
        }
    }

    #[test]
    fn test_missing_files_reported() {
        let dir = tempfile::tempdir().unwrap();
        create_artifacts(dir.path(), &["config.json"]);
        let missing = artifacts_in(dir.path()).missing();
        assert_eq!(missing, vec!["model.pth".to_string(), "vocab.json".to_string()]);
    }

    #[test]
    fn test_adapter_not_ready_when_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = VoiceModelAdapter::load(
            artifacts_in(dir.path()),
            Arc::new(FakeModelBackend::default()),
        );
        assert!(!adapter.is_ready());
        assert_eq!(adapter.missing_artifacts().len(), 3);
    }

    #[test]
    fn test_adapter_ready_when_all_files_present() {
        let dir = tempfile::tempdir().unwrap();
        create_artifacts(dir.path(), &["model.pth", "config.json", "vocab.json"]);
        let adapter = VoiceModelAdapter::load(
            artifacts_in(dir.path()),
            Arc::new(FakeModelBackend::default()),
        );
        assert!(adapter.is_ready());
        assert!(adapter.missing_artifacts().is_empty());
    }

    #[tokio::test]
    async fn test_conditioning_requires_loaded_model() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = VoiceModelAdapter::load(
            artifacts_in(dir.path()),
            Arc::new(FakeModelBackend::default()),
        );
        let err = adapter
            .derive_conditioning(Path::new("/nonexistent.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::NotLoaded(_)));
    }

    #[tokio::test]
    async fn test_conditioning_requires_existing_reference() {
        let dir = tempfile::tempdir().unwrap();
        create_artifacts(dir.path(), &["model.pth", "config.json", "vocab.json"]);
        let adapter = VoiceModelAdapter::load(
            artifacts_in(dir.path()),
            Arc::new(FakeModelBackend::default()),
        );
        let err = adapter
            .derive_conditioning(&dir.path().join("missing.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::ReferenceNotFound(_)));
    }

    #[tokio::test]
    async fn test_conditioning_succeeds_with_reference() {
        let dir = tempfile::tempdir().unwrap();
        create_artifacts(
            dir.path(),
            &["model.pth", "config.json", "vocab.json", "speaker.wav"],
        );
        let adapter = VoiceModelAdapter::load(
            artifacts_in(dir.path()),
            Arc::new(FakeModelBackend::default()),
        );
        let latents = adapter
            .derive_conditioning(&dir.path().join("speaker.wav"))
            .await
            .unwrap();
        assert!(!latents.speaker_embedding.is_empty());
    }
}
