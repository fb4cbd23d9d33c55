//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// API 访问配置
    #[serde(default)]
    pub api: ApiConfig,

    /// 模型配置
    #[serde(default)]
    pub model: ModelConfig,

    /// 合成配置
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Worker 配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL（状态/下载链接用）
    /// 未设置时使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取监听地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            let host = if self.host == "0.0.0.0" {
                "localhost"
            } else {
                &self.host
            };
            format!("http://{}:{}", host, self.port)
        })
    }
}

/// API 访问配置
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 合法 API Key 列表
    #[serde(default = "default_api_keys")]
    pub keys: Vec<String>,

    /// API Key 请求头名称
    #[serde(default = "default_key_header")]
    pub key_header: String,
}

/// 开发用默认 Key，生产环境必须覆盖
pub const DEFAULT_DEV_API_KEY: &str = "secret_development";

fn default_api_keys() -> Vec<String> {
    vec![DEFAULT_DEV_API_KEY.to_string()]
}

fn default_key_header() -> String {
    "X-API-Key".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            keys: default_api_keys(),
            key_header: default_key_header(),
        }
    }
}

/// 模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// 模型目录（与推理后端共享）
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,

    /// 权重文件名
    #[serde(default = "default_weights_file")]
    pub weights_file: String,

    /// 结构配置文件名
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// 词表文件名
    #[serde(default = "default_vocab_file")]
    pub vocab_file: String,

    /// 默认参考音频文件名（位于模型目录下）
    #[serde(default = "default_speaker_file")]
    pub default_speaker: String,

    /// 模型输出采样率
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 推理后端基础 URL
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// 推理请求超时时间（秒）
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("model")
}

fn default_weights_file() -> String {
    "model.pth".to_string()
}

fn default_config_file() -> String {
    "config.json".to_string()
}

fn default_vocab_file() -> String {
    "vocab.json".to_string()
}

fn default_speaker_file() -> String {
    "vi_sample.wav".to_string()
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_backend_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            weights_file: default_weights_file(),
            config_file: default_config_file(),
            vocab_file: default_vocab_file(),
            default_speaker: default_speaker_file(),
            sample_rate: default_sample_rate(),
            backend_url: default_backend_url(),
            backend_timeout_secs: default_backend_timeout(),
        }
    }
}

impl ModelConfig {
    /// 默认参考音频的完整路径
    pub fn default_speaker_path(&self) -> PathBuf {
        self.dir.join(&self.default_speaker)
    }
}

/// 合成配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// 输入文本最小字符数
    #[serde(default = "default_min_input_chars")]
    pub min_input_chars: usize,

    /// 参与合成的句子最小字符数
    #[serde(default = "default_min_segment_chars")]
    pub min_segment_chars: usize,

    /// 产物文件名前缀最大字符数
    #[serde(default = "default_max_filename_prefix")]
    pub max_filename_prefix_chars: usize,

    /// 请求未指定语言时的默认语言
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_min_input_chars() -> usize {
    3
}

fn default_min_segment_chars() -> usize {
    3
}

fn default_max_filename_prefix() -> usize {
    50
}

fn default_language() -> String {
    "vi".to_string()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            min_input_chars: default_min_input_chars(),
            min_segment_chars: default_min_segment_chars(),
            max_filename_prefix_chars: default_max_filename_prefix(),
            default_language: default_language(),
        }
    }
}

/// Worker 配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// worker 数量（每个同时最多一个任务）
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// 回收前处理的任务数
    #[serde(default = "default_max_jobs_per_worker")]
    pub max_jobs_per_worker: usize,

    /// 软超时（秒），触发协作取消
    #[serde(default = "default_soft_time_limit")]
    pub soft_time_limit_secs: u64,

    /// 硬超时（秒），强制中止
    #[serde(default = "default_hard_time_limit")]
    pub hard_time_limit_secs: u64,

    /// 单任务最大投递次数（首投 + 重投）
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    /// 任务队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_worker_count() -> usize {
    1
}

fn default_max_jobs_per_worker() -> usize {
    5
}

fn default_soft_time_limit() -> u64 {
    540
}

fn default_hard_time_limit() -> u64 {
    600
}

fn default_max_deliveries() -> u32 {
    2
}

fn default_queue_capacity() -> usize {
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            max_jobs_per_worker: default_max_jobs_per_worker(),
            soft_time_limit_secs: default_soft_time_limit(),
            hard_time_limit_secs: default_hard_time_limit(),
            max_deliveries: default_max_deliveries(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 产物输出目录（含上传的临时参考音频）
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 上传文件最大大小（字节）
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// 终态任务保留时长（秒）
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// 清扫间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

fn default_retention() -> u64 {
    86_400 // 24 小时
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_upload_size: default_max_upload_size(),
            retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
