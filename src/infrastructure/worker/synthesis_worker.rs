//! Synthesis Worker - 后台合成执行器
//!
//! 固定数量的 worker 任务共享队列。每个 worker：
//! - 首个任务到达时懒构建合成上下文（模型适配器 + 编排器），跨任务复用
//! - 严格串行：一个任务完整结束（含清理）才领取下一个
//! - 处理满 max_jobs_per_worker 个任务后回收上下文重建，约束内存碎片
//! - 软超时触发协作取消，硬超时强制中止并标记 Revoked
//! - 任务 panic 通过 join 错误捕获并交给 broker 重投（at-least-once）
//!
//! 终态写入在临时文件清理之前完成；清理本身幂等，重投安全

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::application::orchestrator::{SpeechSynthesizer, SynthesisError, SynthesisRequest};
use crate::application::ports::{
    ArtifactStorePort, JobBrokerPort, JobResultData, SpeakerSource, StoreError,
};

/// Worker 池配置
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// worker 数量（每个 worker 同时最多一个任务）
    pub workers: usize,
    /// 回收前处理的任务数
    pub max_jobs_per_worker: usize,
    /// 软超时：触发协作取消，任务以失败收场
    pub soft_time_limit: Duration,
    /// 硬超时：中止任务 future，标记 Revoked
    pub hard_time_limit: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_jobs_per_worker: 5,
            soft_time_limit: Duration::from_secs(540),
            hard_time_limit: Duration::from_secs(600),
        }
    }
}

/// 合成上下文工厂
///
/// worker 每次（重）建上下文时调用；生产环境在这里完成
/// 一次模型工件核对与后端客户端构建
pub type SynthesizerFactory = Arc<dyn Fn() -> SpeechSynthesizer + Send + Sync>;

/// 任务执行内部错误
#[derive(Debug, Error)]
enum JobError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Failed to store artifact: {0}")]
    Store(#[from] StoreError),
}

/// 合成 Worker 池
pub struct SynthesisWorkerPool {
    config: WorkerConfig,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    broker: Arc<dyn JobBrokerPort>,
    store: Arc<dyn ArtifactStorePort>,
    default_speaker: PathBuf,
    factory: SynthesizerFactory,
}

impl SynthesisWorkerPool {
    pub fn new(
        config: WorkerConfig,
        queue_receiver: mpsc::Receiver<String>,
        broker: Arc<dyn JobBrokerPort>,
        store: Arc<dyn ArtifactStorePort>,
        default_speaker: PathBuf,
        factory: SynthesizerFactory,
    ) -> Self {
        Self {
            config,
            queue: Arc::new(Mutex::new(queue_receiver)),
            broker,
            store,
            default_speaker,
            factory,
        }
    }

    /// 启动所有 worker
    pub fn spawn(self) -> Vec<tokio::task::JoinHandle<()>> {
        let workers = self.config.workers.max(1);
        tracing::info!(
            workers,
            max_jobs_per_worker = self.config.max_jobs_per_worker,
            soft_limit_secs = self.config.soft_time_limit.as_secs(),
            hard_limit_secs = self.config.hard_time_limit.as_secs(),
            "Starting synthesis worker pool"
        );

        (0..workers)
            .map(|worker_id| {
                let config = self.config.clone();
                let queue = Arc::clone(&self.queue);
                let broker = Arc::clone(&self.broker);
                let store = Arc::clone(&self.store);
                let default_speaker = self.default_speaker.clone();
                let factory = Arc::clone(&self.factory);
                tokio::spawn(worker_main(
                    worker_id,
                    config,
                    queue,
                    broker,
                    store,
                    default_speaker,
                    factory,
                ))
            })
            .collect()
    }
}

/// 单个 worker 的主循环（外层循环 = 上下文回收周期）
async fn worker_main(
    worker_id: usize,
    config: WorkerConfig,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    broker: Arc<dyn JobBrokerPort>,
    store: Arc<dyn ArtifactStorePort>,
    default_speaker: PathBuf,
    factory: SynthesizerFactory,
) {
    tracing::info!(worker_id, "Synthesis worker started");

    loop {
        let mut synthesizer: Option<Arc<SpeechSynthesizer>> = None;
        let mut processed = 0usize;

        while processed < config.max_jobs_per_worker.max(1) {
            let job_id = {
                let mut receiver = queue.lock().await;
                receiver.recv().await
            };
            let Some(job_id) = job_id else {
                tracing::info!(worker_id, "Job queue closed, worker stopping");
                return;
            };

            // 懒构建上下文：模型加载只发生在第一个任务到达时
            let synth = match &synthesizer {
                Some(existing) => Arc::clone(existing),
                None => {
                    tracing::info!(worker_id, "Initializing worker synthesis context");
                    let created = Arc::new((factory)());
                    synthesizer = Some(Arc::clone(&created));
                    created
                }
            };

            process_delivery(
                worker_id,
                &job_id,
                synth,
                &config,
                Arc::clone(&broker),
                Arc::clone(&store),
                &default_speaker,
            )
            .await;
            processed += 1;
        }

        tracing::info!(
            worker_id,
            jobs = processed,
            "Recycling worker synthesis context"
        );
    }
}

/// 处理一次投递：领取 -> 执行（限时）-> 终态写入 -> 清理
async fn process_delivery(
    worker_id: usize,
    job_id: &str,
    synthesizer: Arc<SpeechSynthesizer>,
    config: &WorkerConfig,
    broker: Arc<dyn JobBrokerPort>,
    store: Arc<dyn ArtifactStorePort>,
    default_speaker: &std::path::Path,
) {
    let job = match broker.mark_started(job_id) {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!(worker_id, job_id = %job_id, error = %e, "Skipping delivery");
            return;
        }
    };

    tracing::info!(
        worker_id,
        job_id = %job_id,
        attempt = job.attempts,
        language = %job.payload.language,
        text_len = job.payload.text.chars().count(),
        "Processing synthesis job"
    );

    let payload = job.payload;
    let speaker_audio = match &payload.speaker {
        SpeakerSource::Default => default_speaker.to_path_buf(),
        SpeakerSource::Uploaded(path) => path.clone(),
    };

    let request = SynthesisRequest {
        text: payload.text.clone(),
        language: payload.language.clone(),
        speaker_audio,
        normalize_text: payload.normalize_text,
        synthesis: payload.synthesis.clone(),
        postproc: payload.postproc.clone(),
    };

    let cancel = CancellationToken::new();
    let soft_guard = tokio::spawn({
        let cancel = cancel.clone();
        let soft = config.soft_time_limit;
        let job_id = job_id.to_string();
        async move {
            tokio::time::sleep(soft).await;
            tracing::warn!(job_id = %job_id, "Soft time limit reached, requesting cancellation");
            cancel.cancel();
        }
    });

    let mut job_task = tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            let output = synthesizer.synthesize(&request, &cancel).await?;
            let file_path = store.save_artifact(&output.filename, &output.data).await?;
            Ok::<JobResultData, JobError>(JobResultData {
                filename: output.filename,
                file_path,
            })
        }
    });

    tokio::select! {
        joined = &mut job_task => {
            soft_guard.abort();
            match joined {
                Ok(Ok(result)) => {
                    tracing::info!(
                        worker_id,
                        job_id = %job_id,
                        filename = %result.filename,
                        "Job succeeded"
                    );
                    if let Err(e) = broker.complete_success(job_id, result) {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to record success");
                    }
                }
                Ok(Err(JobError::Synthesis(SynthesisError::Cancelled))) => {
                    tracing::error!(worker_id, job_id = %job_id, "Job exceeded soft time limit");
                    if let Err(e) = broker.complete_failure(
                        job_id,
                        "soft time limit exceeded".to_string(),
                    ) {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to record failure");
                    }
                }
                Ok(Err(job_error)) => {
                    tracing::error!(worker_id, job_id = %job_id, error = %job_error, "Job failed");
                    if let Err(e) = broker.complete_failure(job_id, job_error.to_string()) {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to record failure");
                    }
                }
                Err(join_error) => {
                    // panic 或外部 abort：任务丢失，交给 broker 决定重投或判败
                    let reason = if join_error.is_panic() {
                        "worker panicked during synthesis".to_string()
                    } else {
                        "synthesis task aborted".to_string()
                    };
                    tracing::error!(worker_id, job_id = %job_id, reason = %reason, "Job lost");
                    match broker.requeue_or_fail(job_id, reason) {
                        Ok(true) => tracing::warn!(job_id = %job_id, "Job redelivered"),
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(job_id = %job_id, error = %e, "Failed to requeue job");
                        }
                    }
                }
            }
        }
        _ = tokio::time::sleep(config.hard_time_limit) => {
            soft_guard.abort();
            job_task.abort();
            tracing::error!(worker_id, job_id = %job_id, "Hard time limit exceeded, revoking job");
            if let Err(e) = broker.revoke(job_id, "hard time limit exceeded".to_string()) {
                tracing::error!(job_id = %job_id, error = %e, "Failed to revoke job");
            }
        }
    }

    // 上传的临时参考音频：无论成败都清理，删除容忍"已不存在"
    if let SpeakerSource::Uploaded(path) = &payload.speaker {
        store.remove_temp(path).await;
    }
}
