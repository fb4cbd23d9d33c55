//! Job Broker Port - 异步任务队列抽象
//!
//! 定义任务的提交、状态查询与 worker 侧状态迁移接口，
//! 具体实现在 infrastructure/memory 层。
//!
//! 投递语义为 at-least-once：终态写入即确认（acks-late），
//! worker 崩溃导致重投，终态之前的副作用必须可安全重复

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::params::{PostprocParams, SynthesisParams};

/// Broker 错误
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Job queue is full, dispatch rejected")]
    QueueFull,

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job state transition: {0}")]
    InvalidState(String),
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// 等待执行
    Pending,
    /// worker 已领取
    Started,
    /// 等待重投
    Retry,
    /// 成功（终态）
    Success,
    /// 失败（终态）
    Failure,
    /// 被强制终止（终态）
    Revoked,
}

impl JobState {
    /// 对外状态令牌（统一大写）
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Started => "STARTED",
            JobState::Retry => "RETRY",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
            JobState::Revoked => "REVOKED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure | JobState::Revoked)
    }
}

/// 未知任务的对外状态令牌
pub const UNKNOWN_STATE: &str = "UNKNOWN";

/// 说话人参考来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpeakerSource {
    /// 内置默认参考音频
    Default,
    /// 本次请求上传的临时文件，任务结束后由 worker 删除
    Uploaded(PathBuf),
}

/// 任务负载
///
/// 提交后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub text: String,
    pub language: String,
    pub speaker: SpeakerSource,
    pub normalize_text: bool,
    pub synthesis: SynthesisParams,
    pub postproc: PostprocParams,
}

/// 成功结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultData {
    pub filename: String,
    pub file_path: PathBuf,
}

/// 重投元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryInfo {
    pub reason: String,
    pub eta: DateTime<Utc>,
    pub retries_left: u32,
}

/// 任务记录
///
/// 只由 broker/worker 迁移状态；终态在保留窗口内可查询
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub payload: JobPayload,
    /// 已领取次数（at-least-once 下可能 > 1）
    pub attempts: u32,
    pub result: Option<JobResultData>,
    pub error: Option<String>,
    pub retry: Option<RetryInfo>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Started 状态的租约到期时间，过期视为 worker 失联
    pub lease_expires_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: JobState::Pending,
            payload,
            attempts: 0,
            result: None,
            error: None,
            retry: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            lease_expires_at: None,
        }
    }
}

/// Job Broker Port
pub trait JobBrokerPort: Send + Sync {
    /// 提交任务
    ///
    /// 非阻塞；返回前任务记录已持久化。入队失败返回 `QueueFull`
    /// 且不留下任务记录
    fn submit(&self, payload: JobPayload) -> Result<String, BrokerError>;

    /// 状态快照，绝不阻塞等待任务完成
    fn snapshot(&self, job_id: &str) -> Option<Job>;

    /// worker 领取任务：attempts+1、进入 Started、设置租约，
    /// 返回领取时的任务快照
    fn mark_started(&self, job_id: &str) -> Result<Job, BrokerError>;

    /// 写入成功终态（此写入即投递确认）
    fn complete_success(&self, job_id: &str, result: JobResultData) -> Result<(), BrokerError>;

    /// 写入失败终态
    fn complete_failure(&self, job_id: &str, error: String) -> Result<(), BrokerError>;

    /// 强制终止（硬超时）
    fn revoke(&self, job_id: &str, reason: String) -> Result<(), BrokerError>;

    /// worker 异常丢失任务时重投
    ///
    /// 次数未耗尽则进入 Retry 并重新入队（返回 true），
    /// 否则写入失败终态（返回 false）
    fn requeue_or_fail(&self, job_id: &str, reason: String) -> Result<bool, BrokerError>;
}
