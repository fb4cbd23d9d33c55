//! Worker Layer - Background Task Processing
//!
//! 实现 SynthesisWorkerPool，从队列消费任务并执行合成

mod synthesis_worker;

pub use synthesis_worker::{SynthesisWorkerPool, SynthesizerFactory, WorkerConfig};
