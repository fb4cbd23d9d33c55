//! Memory Layer - In-Memory State Management
//!
//! 实现 JobBroker：任务表、队列与保留窗口清扫

mod job_broker;

pub use job_broker::InMemoryJobBroker;
