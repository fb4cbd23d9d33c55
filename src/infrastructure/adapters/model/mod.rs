//! Voice Model Adapters - 语音模型适配器
//!
//! VoiceModelAdapter 负责模型工件的生命周期与就绪门控；
//! 真正的神经网络推理在 ModelBackend 后端内完成
//! （生产环境为 HTTP 推理进程，测试为确定性假后端）

mod adapter;
mod fake_backend;
mod http_backend;

use std::path::Path;

use async_trait::async_trait;

use crate::application::ports::{ConditioningLatents, ModelError, SegmentAudio};
use crate::domain::params::SynthesisParams;

pub use adapter::{ModelArtifacts, VoiceModelAdapter};
pub use fake_backend::{FakeBackendCounters, FakeModelBackend};
pub use http_backend::{HttpModelBackend, HttpModelBackendConfig};

/// 推理后端抽象（不透明模型的调用契约）
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// 从参考音频导出条件潜变量
    async fn derive_conditioning(
        &self,
        reference_audio: &Path,
    ) -> Result<ConditioningLatents, ModelError>;

    /// 单句推理
    async fn infer(
        &self,
        text: &str,
        language: &str,
        latents: &ConditioningLatents,
        params: &SynthesisParams,
    ) -> Result<SegmentAudio, ModelError>;

    /// 释放推理缓存，失败只记录不传播
    async fn release_cache(&self);
}
