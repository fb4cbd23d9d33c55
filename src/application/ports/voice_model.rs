//! Voice Model Port - 语音模型抽象
//!
//! 定义编排器所依赖的模型调用契约，具体实现在
//! infrastructure/adapters/model 层。模型本体视为不透明：
//! 这里只约定条件潜变量提取与逐句推理两类调用

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::params::SynthesisParams;

/// 模型错误
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Voice model is not loaded (missing files: {})", .0.join(", "))]
    NotLoaded(Vec<String>),

    #[error("Reference audio not found: {0}")]
    ReferenceNotFound(String),

    #[error("Inference backend error: {0}")]
    Backend(String),

    #[error("Inference request timed out")]
    Timeout,

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// 条件潜变量
///
/// 由参考音频一次性导出，同一请求的所有句子共享；
/// 不跨请求缓存，每次重新导出，换取说话人不串音
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditioningLatents {
    pub gpt_cond_latent: Vec<f32>,
    pub speaker_embedding: Vec<f32>,
}

/// 单句推理产物
#[derive(Debug, Clone)]
pub struct SegmentAudio {
    /// 原始波形（单声道 f32）
    pub samples: Vec<f32>,
    /// 采样率
    pub sample_rate: u32,
}

/// Voice Model Port
///
/// 适配器为 worker 级单例：每个 worker 上下文恰好一次加载尝试。
/// 并发调用由编排器串行化，适配器自身不做同步
#[async_trait]
pub trait VoiceModelPort: Send + Sync {
    /// 模型是否可用
    fn is_ready(&self) -> bool;

    /// 缺失的模型文件名（可用时为空）
    fn missing_artifacts(&self) -> Vec<String>;

    /// 从参考音频导出条件潜变量
    async fn derive_conditioning(
        &self,
        reference_audio: &Path,
    ) -> Result<ConditioningLatents, ModelError>;

    /// 合成单句
    ///
    /// 完整转发逐次调用的参数集
    async fn synthesize_segment(
        &self,
        text: &str,
        language: &str,
        latents: &ConditioningLatents,
        params: &SynthesisParams,
    ) -> Result<SegmentAudio, ModelError>;

    /// 释放推理过程中的瞬态显存/内存
    ///
    /// 每句之后无条件调用（包括推理失败），约束峰值占用
    async fn release_transient_memory(&self);
}

/// 模型就绪探测
///
/// 供 HTTP 前端做同步可用性检查：只查模型文件是否齐全，
/// 不触发加载，不违反"每个 worker 一次加载"的约束
pub trait ModelReadinessPort: Send + Sync {
    /// 缺失的模型文件名
    fn missing_artifacts(&self) -> Vec<String>;

    /// 文件齐全即视为可服务
    fn is_available(&self) -> bool {
        self.missing_artifacts().is_empty()
    }
}
