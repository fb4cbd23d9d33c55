//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（VoiceModel、JobBroker、ArtifactStore）
//! - orchestrator: 合成编排器（单次请求的状态机）
//! - service: TTS 应用服务（受理、校验、派发）

pub mod orchestrator;
pub mod ports;
pub mod service;

pub use orchestrator::{
    AudioOutput, SegmentOutcome, SpeechSynthesizer, SynthesisError, SynthesisRequest,
    SynthesizerConfig,
};
pub use ports::{
    ArtifactStorePort, BrokerError, ConditioningLatents, Job, JobBrokerPort, JobPayload,
    JobResultData, JobState, ModelError, ModelReadinessPort, RetryInfo, SegmentAudio,
    SpeakerSource, StoreError, VoiceModelPort, UNKNOWN_STATE,
};
pub use service::{
    SpeakerUpload, SubmitError, SubmitRequest, TtsService, TtsServiceConfig,
    ALLOWED_SPEAKER_EXTENSIONS,
};
