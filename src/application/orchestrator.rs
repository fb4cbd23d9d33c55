//! Synthesis Orchestrator - 合成编排器
//!
//! 单次请求的状态机：校验 -> 规范化 -> 分句 -> 导出条件潜变量
//! -> 逐句推理 -> 拼接 -> 后处理 -> 序列化 -> 命名。
//! 首个不可恢复错误即终止；逐句失败被隔离记录，循环继续：
//! 一句坏文本只降低产出质量，不拖垮整个请求。
//! 编排器自身没有任何重试逻辑，重试属于队列运行时

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ModelError, VoiceModelPort};
use crate::domain::params::{PostprocParams, SynthesisParams};
use crate::domain::postproc::AudioPostprocessor;
use crate::domain::{filename, language, normalizer, segmenter, wav};

/// 合成错误
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Voice model is not ready: {0}")]
    ModelNotReady(String),

    #[error("Language '{0}' is not supported. Supported languages: {1}")]
    UnsupportedLanguage(String, String),

    #[error("Speaker reference audio not found: {0}")]
    SpeakerNotFound(String),

    #[error("Input text contains no synthesizable content")]
    NoSegments,

    #[error("No audio was produced (all segments failed or were filtered out)")]
    NoAudioProduced,

    #[error("Audio post-processing produced an empty waveform")]
    PostprocessEmpty,

    #[error("Synthesis was cancelled before completion")]
    Cancelled,

    #[error("Failed to serialize audio: {0}")]
    Serialize(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// 单次合成请求
///
/// 构建后不可变，生命周期随编排调用结束
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub language: String,
    pub speaker_audio: PathBuf,
    pub normalize_text: bool,
    pub synthesis: SynthesisParams,
    pub postproc: PostprocParams,
}

/// 合成产物
///
/// 所有权交给调用方：worker 落盘，或同步调用方直接返回
#[derive(Debug)]
pub struct AudioOutput {
    /// WAV 容器字节
    pub data: Vec<u8>,
    pub filename: String,
    pub mimetype: &'static str,
}

/// 单句处理结果
///
/// 逐句失败以显式结果收集，不用异常控制流
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    /// 成功产出音频
    Synthesized { samples: usize },
    /// 低于最小字符数被跳过
    SkippedTooShort,
    /// 推理失败或产出为空
    Failed { reason: String },
}

/// 编排器配置
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// 输出采样率
    pub sample_rate: u32,
    /// 参与合成的句子最小字符数
    pub min_segment_chars: usize,
    /// 文件名前缀最大字符数
    pub max_filename_prefix_chars: usize,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            min_segment_chars: 3,
            max_filename_prefix_chars: filename::DEFAULT_MAX_PREFIX_CHARS,
        }
    }
}

/// 合成编排器
///
/// 每个 worker 上下文持有一个，随模型适配器一同创建和回收
pub struct SpeechSynthesizer {
    model: Arc<dyn VoiceModelPort>,
    postprocessor: AudioPostprocessor,
    config: SynthesizerConfig,
}

impl SpeechSynthesizer {
    pub fn new(model: Arc<dyn VoiceModelPort>, config: SynthesizerConfig) -> Self {
        let postprocessor = AudioPostprocessor::new(config.sample_rate);
        Self {
            model,
            postprocessor,
            config,
        }
    }

    /// 执行一次完整合成
    ///
    /// `cancel` 在句间检查（软超时的协作取消点）；
    /// 推理与后处理调用本身一旦开始即跑到完成
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<AudioOutput, SynthesisError> {
        if !self.model.is_ready() {
            let missing = self.model.missing_artifacts();
            let detail = if missing.is_empty() {
                "model failed to load".to_string()
            } else {
                format!("missing model files: {}", missing.join(", "))
            };
            return Err(SynthesisError::ModelNotReady(detail));
        }

        let lang = request.language.to_lowercase();
        if !language::is_supported(&lang) {
            return Err(SynthesisError::UnsupportedLanguage(
                request.language.clone(),
                language::supported_codes(),
            ));
        }

        if !request.speaker_audio.exists() {
            return Err(SynthesisError::SpeakerNotFound(
                request.speaker_audio.display().to_string(),
            ));
        }

        tracing::info!(
            language = %lang,
            text_len = request.text.chars().count(),
            speaker = %request.speaker_audio.display(),
            "Starting synthesis"
        );

        // 规范化只在请求开启且语言有专用规范器时进行，失败回退原文
        let text = if request.normalize_text && lang == "vi" {
            match normalizer::normalize_vietnamese(&request.text) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracing::warn!(error = %e, "Text normalization failed, using original text");
                    request.text.clone()
                }
            }
        } else {
            request.text.clone()
        };

        let segments = segmenter::segment(&text, &lang);
        if segments.is_empty() {
            return Err(SynthesisError::NoSegments);
        }
        tracing::info!(count = segments.len(), "Text segmented");

        let latents = self
            .model
            .derive_conditioning(&request.speaker_audio)
            .await
            .map_err(|e| match e {
                ModelError::ReferenceNotFound(path) => SynthesisError::SpeakerNotFound(path),
                other => SynthesisError::Model(other),
            })?;

        let (chunks, report) = self
            .synthesize_segments(&segments, &lang, &latents, &request.synthesis, cancel)
            .await?;

        let produced = report
            .iter()
            .filter(|o| matches!(o, SegmentOutcome::Synthesized { .. }))
            .count();
        tracing::info!(
            total = segments.len(),
            produced,
            skipped = report.iter().filter(|o| *o == &SegmentOutcome::SkippedTooShort).count(),
            failed = report.iter().filter(|o| matches!(o, SegmentOutcome::Failed { .. })).count(),
            "Segment loop finished"
        );

        if chunks.is_empty() {
            return Err(SynthesisError::NoAudioProduced);
        }

        let total_samples: usize = chunks.iter().map(Vec::len).sum();
        let mut waveform = Vec::with_capacity(total_samples);
        for chunk in &chunks {
            waveform.extend_from_slice(chunk);
        }
        if waveform.is_empty() {
            return Err(SynthesisError::NoAudioProduced);
        }
        tracing::info!(
            chunks = chunks.len(),
            samples = waveform.len(),
            "Audio chunks concatenated"
        );

        let processed = self.postprocessor.process(waveform, &request.postproc);
        if processed.is_empty() {
            return Err(SynthesisError::PostprocessEmpty);
        }

        let data = wav::encode(&processed, self.config.sample_rate)
            .map_err(|e| SynthesisError::Serialize(e.to_string()))?;

        let output_filename =
            filename::generate_safe_filename(&request.text, self.config.max_filename_prefix_chars);
        tracing::info!(
            filename = %output_filename,
            bytes = data.len(),
            "Synthesis complete"
        );

        Ok(AudioOutput {
            data,
            filename: output_filename,
            mimetype: "audio/wav",
        })
    }

    /// 逐句推理循环
    ///
    /// 每句之后无条件释放模型瞬态内存，推理抛错也不例外
    async fn synthesize_segments(
        &self,
        segments: &[String],
        lang: &str,
        latents: &crate::application::ports::ConditioningLatents,
        params: &SynthesisParams,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Vec<f32>>, Vec<SegmentOutcome>), SynthesisError> {
        let mut chunks: Vec<Vec<f32>> = Vec::new();
        let mut report: Vec<SegmentOutcome> = Vec::with_capacity(segments.len());

        for (index, sentence) in segments.iter().enumerate() {
            let ordinal = index + 1;

            if cancel.is_cancelled() {
                tracing::warn!(segment = ordinal, "Cancellation requested, stopping loop");
                return Err(SynthesisError::Cancelled);
            }

            let char_count = sentence.chars().count();
            if char_count < self.config.min_segment_chars {
                tracing::warn!(
                    segment = ordinal,
                    chars = char_count,
                    min = self.config.min_segment_chars,
                    "Segment below minimum length, skipping"
                );
                report.push(SegmentOutcome::SkippedTooShort);
                continue;
            }

            tracing::info!(
                segment = ordinal,
                total = segments.len(),
                "Synthesizing segment"
            );

            let outcome = self
                .model
                .synthesize_segment(sentence, lang, latents, params)
                .await;
            self.model.release_transient_memory().await;

            match outcome {
                Ok(audio) => {
                    let mut samples = audio.samples;
                    if let Some(cap) = segmenter::keep_length(sentence, lang) {
                        if cap > 0 && samples.len() > cap {
                            tracing::debug!(
                                segment = ordinal,
                                cap,
                                produced = samples.len(),
                                "Applying keep-length truncation"
                            );
                            samples.truncate(cap);
                        }
                    }

                    if samples.is_empty() {
                        tracing::warn!(segment = ordinal, "Segment produced an empty waveform");
                        report.push(SegmentOutcome::Failed {
                            reason: "empty waveform".to_string(),
                        });
                    } else {
                        report.push(SegmentOutcome::Synthesized {
                            samples: samples.len(),
                        });
                        chunks.push(samples);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        segment = ordinal,
                        error = %e,
                        "Segment inference failed, continuing with remaining segments"
                    );
                    report.push(SegmentOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok((chunks, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::model::{
        FakeModelBackend, ModelArtifacts, VoiceModelAdapter,
    };
    use std::path::Path;

    /// 在临时目录布好模型文件与参考音频
    fn test_fixture(dir: &Path) -> (ModelArtifacts, PathBuf) {
        let artifacts = ModelArtifacts::new(dir, "model.pth", "config.json", "vocab.json");
        for name in ["model.pth", "config.json", "vocab.json"] {
            std::fs::write(dir.join(name), b"stub").unwrap();
        }
        let speaker = dir.join("speaker.wav");
        std::fs::write(&speaker, b"stub").unwrap();
        (artifacts, speaker)
    }

    fn synthesizer_with(
        dir: &Path,
        backend: FakeModelBackend,
    ) -> (SpeechSynthesizer, PathBuf) {
        let (artifacts, speaker) = test_fixture(dir);
        let adapter = Arc::new(VoiceModelAdapter::load(artifacts, Arc::new(backend)));
        (
            SpeechSynthesizer::new(adapter, SynthesizerConfig::default()),
            speaker,
        )
    }

    fn request(text: &str, language: &str, speaker: PathBuf) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            language: language.to_string(),
            speaker_audio: speaker,
            normalize_text: true,
            synthesis: SynthesisParams::default(),
            postproc: PostprocParams::default(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_produces_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, speaker) = synthesizer_with(dir.path(), FakeModelBackend::default());
        let req = request("Xin chào bạn", "vi", speaker);

        let output = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap();

        assert!(output.filename.ends_with(".wav"));
        assert!(output.filename.contains("xin_cho_bn"));
        assert_eq!(output.mimetype, "audio/wav");
        let (samples, rate) = wav::decode(&output.data).unwrap();
        assert!(!samples.is_empty());
        assert_eq!(rate, 24_000);
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, speaker) = synthesizer_with(dir.path(), FakeModelBackend::default());
        let req = request("Hello there.", "xx", speaker);

        let err = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::UnsupportedLanguage(..)));
    }

    #[tokio::test]
    async fn test_missing_speaker_audio() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, _) = synthesizer_with(dir.path(), FakeModelBackend::default());
        let req = request(
            "Hello there.",
            "en",
            dir.path().join("no_such_speaker.wav"),
        );

        let err = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::SpeakerNotFound(_)));
    }

    #[tokio::test]
    async fn test_model_not_ready_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        // 只创建参考音频，不创建模型文件
        let artifacts = ModelArtifacts::new(dir.path(), "model.pth", "config.json", "vocab.json");
        let speaker = dir.path().join("speaker.wav");
        std::fs::write(&speaker, b"stub").unwrap();

        let adapter = Arc::new(VoiceModelAdapter::load(
            artifacts,
            Arc::new(FakeModelBackend::default()),
        ));
        let synth = SpeechSynthesizer::new(adapter, SynthesizerConfig::default());
        let req = request("Hello there.", "en", speaker);

        let err = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            SynthesisError::ModelNotReady(detail) => {
                assert!(detail.contains("model.pth"));
                assert!(detail.contains("vocab.json"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_segments_too_short_yields_no_audio_produced() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, speaker) = synthesizer_with(dir.path(), FakeModelBackend::default());
        // 每句都低于 3 字符
        let mut req = request("a. b. c.", "en", speaker);
        req.normalize_text = false;

        let err = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::NoAudioProduced));
    }

    #[tokio::test]
    async fn test_segment_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeModelBackend::default().failing_on("bad");
        let (synth, speaker) = synthesizer_with(dir.path(), backend);
        let req = request("This sentence is fine. This one is bad. Another good one.", "en", speaker);

        // 中间一句失败，整体仍应成功
        let output = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!output.data.is_empty());
    }

    #[tokio::test]
    async fn test_all_segments_failing_yields_no_audio_produced() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeModelBackend::default().failing_on("sentence");
        let (synth, speaker) = synthesizer_with(dir.path(), backend);
        let req = request("First sentence here. Second sentence there.", "en", speaker);

        let err = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::NoAudioProduced));
    }

    #[tokio::test]
    async fn test_keep_length_truncates_short_sentence_audio() {
        let dir = tempfile::tempdir().unwrap();
        // 每字符 40000 采样，远超两词句的 keep-length 上限
        let backend = FakeModelBackend::default().with_samples_per_char(40_000);
        let (synth, speaker) = synthesizer_with(dir.path(), backend);
        let mut req = request("hi there", "en", speaker);
        req.normalize_text = false;

        let output = synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap();
        let (samples, _) = wav::decode(&output.data).unwrap();
        // 2 词 0 标点: 上限 36000
        assert_eq!(samples.len(), 36_000);
    }

    #[tokio::test]
    async fn test_cancellation_between_segments() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, speaker) = synthesizer_with(dir.path(), FakeModelBackend::default());
        let req = request("One sentence. Two sentence.", "en", speaker);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = synth.synthesize(&req, &cancel).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Cancelled));
    }

    #[tokio::test]
    async fn test_memory_released_after_failed_segment() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeModelBackend::default().failing_on("bad");
        let counters = backend.counters();
        let (synth, speaker) = synthesizer_with(dir.path(), backend);
        let req = request("Good sentence one. Totally bad here. Good sentence two.", "en", speaker);

        synth
            .synthesize(&req, &CancellationToken::new())
            .await
            .unwrap();
        // 三句各触发一次释放，包括失败的那句
        assert_eq!(counters.released(), 3);
    }
}
