//! Fake Model Backend - 测试用推理后端
//!
//! 产出确定性的正弦波形，时长与文本长度成正比；
//! 可注入失败（按子串匹配）用于验证逐句隔离与重投路径

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{ConditioningLatents, ModelError, SegmentAudio};
use crate::domain::params::SynthesisParams;

use super::ModelBackend;

/// 调用计数（测试断言用）
#[derive(Debug, Default)]
struct CounterInner {
    inferences: AtomicUsize,
    released: AtomicUsize,
}

/// 计数器句柄
#[derive(Debug, Clone, Default)]
pub struct FakeBackendCounters(Arc<CounterInner>);

impl FakeBackendCounters {
    pub fn inferences(&self) -> usize {
        self.0.inferences.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.0.released.load(Ordering::SeqCst)
    }
}

/// 假推理后端
pub struct FakeModelBackend {
    sample_rate: u32,
    samples_per_char: usize,
    fail_substring: Option<String>,
    conditioning_fails: bool,
    counters: FakeBackendCounters,
}

impl Default for FakeModelBackend {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            samples_per_char: 256,
            fail_substring: None,
            conditioning_fails: false,
            counters: FakeBackendCounters::default(),
        }
    }
}

impl FakeModelBackend {
    /// 文本包含指定子串时推理失败
    pub fn failing_on(mut self, substring: impl Into<String>) -> Self {
        self.fail_substring = Some(substring.into());
        self
    }

    /// 潜变量导出失败
    pub fn with_conditioning_error(mut self) -> Self {
        self.conditioning_fails = true;
        self
    }

    /// 每字符产出的采样数
    pub fn with_samples_per_char(mut self, samples_per_char: usize) -> Self {
        self.samples_per_char = samples_per_char;
        self
    }

    pub fn counters(&self) -> FakeBackendCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl ModelBackend for FakeModelBackend {
    async fn derive_conditioning(
        &self,
        reference_audio: &Path,
    ) -> Result<ConditioningLatents, ModelError> {
        if self.conditioning_fails {
            return Err(ModelError::Backend(
                "conditioning failed (injected)".to_string(),
            ));
        }

        tracing::debug!(
            reference = %reference_audio.display(),
            "FakeModelBackend: returning fixed latents"
        );
        Ok(ConditioningLatents {
            gpt_cond_latent: vec![0.5; 32],
            speaker_embedding: vec![0.25; 16],
        })
    }

    async fn infer(
        &self,
        text: &str,
        _language: &str,
        _latents: &ConditioningLatents,
        _params: &SynthesisParams,
    ) -> Result<SegmentAudio, ModelError> {
        if let Some(needle) = &self.fail_substring {
            if text.contains(needle.as_str()) {
                return Err(ModelError::Backend(format!(
                    "inference failed (injected on '{}')",
                    needle
                )));
            }
        }

        self.counters.0.inferences.fetch_add(1, Ordering::SeqCst);

        let total = text.chars().count() * self.samples_per_char;
        let samples = (0..total)
            .map(|i| {
                (i as f32 * 2.0 * std::f32::consts::PI * 220.0 / self.sample_rate as f32).sin()
                    * 0.5
            })
            .collect();

        Ok(SegmentAudio {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    async fn release_cache(&self) {
        self.counters.0.released.fetch_add(1, Ordering::SeqCst);
    }
}
