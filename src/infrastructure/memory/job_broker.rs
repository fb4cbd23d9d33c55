//! In-Memory Job Broker - 内存任务队列实现
//!
//! DashMap 任务表 + 有界 mpsc 队列。提交时先落表再入队，
//! 入队失败即回滚，调用方拿到 DispatchFailure 而不是悬空任务。
//!
//! 投递语义 at-least-once：终态写入即确认；Started 任务携带租约，
//! worker 失联（租约过期）或任务 panic 时按剩余次数重投或判失败。
//! 终态记录在保留窗口内可查询，过期由后台清扫器移除

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::application::ports::{
    BrokerError, Job, JobBrokerPort, JobPayload, JobResultData, JobState, RetryInfo,
};

/// 重投的延迟提示（写入 RetryInfo.eta）
const RETRY_ETA_SECS: i64 = 1;

/// 内存任务 Broker
pub struct InMemoryJobBroker {
    /// job_id -> Job
    jobs: DashMap<String, Job>,
    /// 任务队列发送端
    queue_sender: mpsc::Sender<String>,
    /// 单个任务的最大投递次数（首投 + 重投）
    max_deliveries: u32,
    /// Started 租约时长
    lease: chrono::Duration,
}

impl InMemoryJobBroker {
    pub fn new(queue_sender: mpsc::Sender<String>, max_deliveries: u32) -> Self {
        Self {
            jobs: DashMap::new(),
            queue_sender,
            max_deliveries: max_deliveries.max(1),
            lease: chrono::Duration::seconds(660),
        }
    }

    /// 指定 Started 租约时长（通常为硬超时 + 余量）
    pub fn with_lease(mut self, lease_secs: u64) -> Self {
        self.lease = chrono::Duration::seconds(lease_secs as i64);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 清扫一轮：移除过期终态任务，重投租约过期的 Started 任务
    ///
    /// 返回 (移除数, 重投数)
    pub fn sweep(&self, retention: Duration) -> (usize, usize) {
        let now = Utc::now();
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::hours(24));

        let mut expired: Vec<String> = Vec::new();
        let mut lost: Vec<String> = Vec::new();
        for entry in self.jobs.iter() {
            let job = entry.value();
            if job.state.is_terminal() {
                if let Some(finished) = job.finished_at {
                    if now - finished > retention {
                        expired.push(job.id.clone());
                    }
                }
            } else if job.state == JobState::Started {
                if let Some(lease) = job.lease_expires_at {
                    if now > lease {
                        lost.push(job.id.clone());
                    }
                }
            }
        }

        for job_id in &expired {
            self.jobs.remove(job_id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired terminal jobs removed");
        }

        let mut redelivered = 0;
        for job_id in &lost {
            match self.requeue_or_fail(job_id, "worker lease expired".to_string()) {
                Ok(true) => {
                    redelivered += 1;
                    tracing::warn!(job_id = %job_id, "Job lease expired, redelivered");
                }
                Ok(false) => {
                    tracing::error!(job_id = %job_id, "Job lease expired, retries exhausted");
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to redeliver lost job");
                }
            }
        }

        (expired.len(), redelivered)
    }

    /// 启动后台清扫任务
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        retention: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let (removed, redelivered) = broker.sweep(retention);
                if removed > 0 || redelivered > 0 {
                    tracing::debug!(removed, redelivered, "Broker sweep finished");
                }
            }
        })
    }

    fn finish(
        &self,
        job_id: &str,
        state: JobState,
        result: Option<JobResultData>,
        error: Option<String>,
    ) -> Result<(), BrokerError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| BrokerError::NotFound(job_id.to_string()))?;

        job.state = state;
        job.result = result;
        job.error = error;
        job.retry = None;
        job.finished_at = Some(Utc::now());
        job.lease_expires_at = None;

        tracing::info!(
            job_id = %job_id,
            state = job.state.as_str(),
            attempts = job.attempts,
            "Job reached terminal state"
        );
        Ok(())
    }
}

impl JobBrokerPort for InMemoryJobBroker {
    fn submit(&self, payload: JobPayload) -> Result<String, BrokerError> {
        let job = Job::new(payload);
        let job_id = job.id.clone();

        // 先持久化任务记录，再入队
        self.jobs.insert(job_id.clone(), job);

        if let Err(e) = self.queue_sender.try_send(job_id.clone()) {
            // 入队失败回滚记录，避免永远 Pending 的孤儿任务
            self.jobs.remove(&job_id);
            tracing::error!(job_id = %job_id, error = %e, "Failed to enqueue job");
            return Err(BrokerError::QueueFull);
        }

        tracing::debug!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    fn snapshot(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    fn mark_started(&self, job_id: &str) -> Result<Job, BrokerError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| BrokerError::NotFound(job_id.to_string()))?;

        if job.state.is_terminal() {
            // at-least-once 下的重复投递：已终态的任务不再领取
            return Err(BrokerError::InvalidState(format!(
                "job {} is already {}",
                job_id,
                job.state.as_str()
            )));
        }

        let now = Utc::now();
        job.state = JobState::Started;
        job.attempts += 1;
        job.retry = None;
        job.started_at = Some(now);
        job.lease_expires_at = Some(now + self.lease);

        tracing::debug!(
            job_id = %job_id,
            attempt = job.attempts,
            "Job started"
        );
        Ok(job.clone())
    }

    fn complete_success(&self, job_id: &str, result: JobResultData) -> Result<(), BrokerError> {
        self.finish(job_id, JobState::Success, Some(result), None)
    }

    fn complete_failure(&self, job_id: &str, error: String) -> Result<(), BrokerError> {
        self.finish(job_id, JobState::Failure, None, Some(error))
    }

    fn revoke(&self, job_id: &str, reason: String) -> Result<(), BrokerError> {
        self.finish(job_id, JobState::Revoked, None, Some(reason))
    }

    fn requeue_or_fail(&self, job_id: &str, reason: String) -> Result<bool, BrokerError> {
        let retries_left = {
            let mut job = self
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| BrokerError::NotFound(job_id.to_string()))?;

            if job.state.is_terminal() {
                // 已有终态，不再移动
                return Ok(false);
            }

            if job.attempts >= self.max_deliveries {
                None
            } else {
                let retries_left = self.max_deliveries - job.attempts;
                let eta: DateTime<Utc> = Utc::now() + chrono::Duration::seconds(RETRY_ETA_SECS);
                job.state = JobState::Retry;
                job.lease_expires_at = None;
                job.retry = Some(RetryInfo {
                    reason: reason.clone(),
                    eta,
                    retries_left,
                });
                Some(retries_left)
            }
        };

        match retries_left {
            None => {
                self.finish(
                    job_id,
                    JobState::Failure,
                    None,
                    Some(format!("{} (retries exhausted)", reason)),
                )?;
                Ok(false)
            }
            Some(retries_left) => {
                if self.queue_sender.try_send(job_id.to_string()).is_err() {
                    // 队列已满，重投失败按终态失败处理
                    self.finish(
                        job_id,
                        JobState::Failure,
                        None,
                        Some(format!("{} (requeue failed)", reason)),
                    )?;
                    return Ok(false);
                }
                tracing::warn!(
                    job_id = %job_id,
                    reason = %reason,
                    retries_left,
                    "Job redelivered"
                );
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SpeakerSource;
    use crate::domain::params::{PostprocParams, SynthesisParams};

    fn payload() -> JobPayload {
        JobPayload {
            text: "Test content".to_string(),
            language: "vi".to_string(),
            speaker: SpeakerSource::Default,
            normalize_text: true,
            synthesis: SynthesisParams::default(),
            postproc: PostprocParams::default(),
        }
    }

    fn broker(capacity: usize, max_deliveries: u32) -> (Arc<InMemoryJobBroker>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (InMemoryJobBroker::new(tx, max_deliveries).arc(), rx)
    }

    #[tokio::test]
    async fn test_submit_persists_then_enqueues() {
        let (broker, mut rx) = broker(8, 2);
        let job_id = broker.submit(payload()).unwrap();

        let job = broker.snapshot(&job_id).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(rx.try_recv().unwrap(), job_id);
    }

    #[tokio::test]
    async fn test_queue_full_rolls_back_record() {
        let (broker, _rx) = broker(1, 2);
        broker.submit(payload()).unwrap();

        let err = broker.submit(payload()).unwrap_err();
        assert!(matches!(err, BrokerError::QueueFull));
        // 失败的提交不留下任务记录
        assert_eq!(broker.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_snapshot_is_none() {
        let (broker, _rx) = broker(8, 2);
        assert!(broker.snapshot("no-such-job").is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_success() {
        let (broker, _rx) = broker(8, 2);
        let job_id = broker.submit(payload()).unwrap();

        let claimed = broker.mark_started(&job_id).unwrap();
        assert_eq!(claimed.state, JobState::Started);
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.lease_expires_at.is_some());

        broker
            .complete_success(
                &job_id,
                JobResultData {
                    filename: "out.wav".to_string(),
                    file_path: "/tmp/out.wav".into(),
                },
            )
            .unwrap();

        let job = broker.snapshot(&job_id).unwrap();
        assert_eq!(job.state, JobState::Success);
        assert!(job.finished_at.is_some());
        assert!(job.lease_expires_at.is_none());
        assert_eq!(job.result.unwrap().filename, "out.wav");
    }

    #[tokio::test]
    async fn test_requeue_until_exhausted() {
        let (broker, mut rx) = broker(8, 2);
        let job_id = broker.submit(payload()).unwrap();
        rx.try_recv().unwrap();

        // 第一次投递失败 -> 重投
        broker.mark_started(&job_id).unwrap();
        let requeued = broker.requeue_or_fail(&job_id, "worker crashed".to_string()).unwrap();
        assert!(requeued);
        assert_eq!(rx.try_recv().unwrap(), job_id);

        let job = broker.snapshot(&job_id).unwrap();
        assert_eq!(job.state, JobState::Retry);
        let retry = job.retry.unwrap();
        assert_eq!(retry.retries_left, 1);
        assert!(retry.reason.contains("crashed"));

        // 第二次投递失败 -> 次数耗尽，判终态失败
        broker.mark_started(&job_id).unwrap();
        let requeued = broker.requeue_or_fail(&job_id, "worker crashed".to_string()).unwrap();
        assert!(!requeued);

        let job = broker.snapshot(&job_id).unwrap();
        assert_eq!(job.state, JobState::Failure);
        assert!(job.error.unwrap().contains("retries exhausted"));
    }

    #[tokio::test]
    async fn test_requeue_after_terminal_is_noop() {
        let (broker, _rx) = broker(8, 3);
        let job_id = broker.submit(payload()).unwrap();
        broker.mark_started(&job_id).unwrap();
        broker.complete_failure(&job_id, "boom".to_string()).unwrap();

        let requeued = broker.requeue_or_fail(&job_id, "late signal".to_string()).unwrap();
        assert!(!requeued);
        assert_eq!(broker.snapshot(&job_id).unwrap().state, JobState::Failure);
    }

    #[tokio::test]
    async fn test_sweep_expires_old_terminal_jobs() {
        let (broker, _rx) = broker(8, 2);
        let job_id = broker.submit(payload()).unwrap();
        broker.mark_started(&job_id).unwrap();
        broker.complete_failure(&job_id, "boom".to_string()).unwrap();

        // 窗口内不清除
        let (removed, _) = broker.sweep(Duration::from_secs(3600));
        assert_eq!(removed, 0);

        // 把完成时间拨回过去，模拟过期
        broker.jobs.get_mut(&job_id).unwrap().finished_at =
            Some(Utc::now() - chrono::Duration::hours(25));
        let (removed, _) = broker.sweep(Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert!(broker.snapshot(&job_id).is_none());
    }

    #[tokio::test]
    async fn test_sweep_redelivers_expired_lease() {
        let (broker, mut rx) = broker(8, 2);
        let job_id = broker.submit(payload()).unwrap();
        rx.try_recv().unwrap();
        broker.mark_started(&job_id).unwrap();

        // 租约拨到过去，模拟 worker 失联
        broker.jobs.get_mut(&job_id).unwrap().lease_expires_at =
            Some(Utc::now() - chrono::Duration::seconds(1));

        let (_, redelivered) = broker.sweep(Duration::from_secs(3600));
        assert_eq!(redelivered, 1);
        assert_eq!(rx.try_recv().unwrap(), job_id);
        assert_eq!(broker.snapshot(&job_id).unwrap().state, JobState::Retry);
    }

    #[tokio::test]
    async fn test_revoke_records_reason() {
        let (broker, _rx) = broker(8, 2);
        let job_id = broker.submit(payload()).unwrap();
        broker.mark_started(&job_id).unwrap();
        broker
            .revoke(&job_id, "hard time limit exceeded".to_string())
            .unwrap();

        let job = broker.snapshot(&job_id).unwrap();
        assert_eq!(job.state, JobState::Revoked);
        assert!(job.error.unwrap().contains("hard time limit"));
    }
}
