//! Voxa - 异步语音克隆 TTS 服务
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 语言表、分句器、越南语规范化、文件命名、参数模式、后处理链、WAV 编解码
//!
//! 应用层 (application/):
//! - Ports: 端口定义（VoiceModel, JobBroker, ArtifactStore）
//! - Orchestrator: 合成编排器（单次请求状态机，逐句失败隔离）
//! - Service: TTS 应用服务（受理、校验、派发）
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API（提交 / 状态轮询 / 结果下载）
//! - Memory: JobBroker 内存实现（at-least-once + 保留窗口）
//! - Worker: 合成 Worker 池（懒加载模型上下文、回收、软硬超时）
//! - Adapters: 模型适配器（HTTP 推理后端 + 测试假后端）、文件产物存储

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
