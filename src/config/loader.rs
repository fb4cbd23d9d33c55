//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, DEFAULT_DEV_API_KEY};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VOXA_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VOXA_SERVER__PORT=8080`
/// - `VOXA_MODEL__DIR=/data/model`
/// - `VOXA_MODEL__BACKEND_URL=http://inference:8000`
/// - `VOXA_STORAGE__OUTPUT_DIR=/data/output`
/// - `VOXA_API__KEYS=key1,key2`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5000)?
        .set_default("api.keys", vec![DEFAULT_DEV_API_KEY])?
        .set_default("api.key_header", "X-API-Key")?
        .set_default("model.dir", "model")?
        .set_default("model.weights_file", "model.pth")?
        .set_default("model.config_file", "config.json")?
        .set_default("model.vocab_file", "vocab.json")?
        .set_default("model.default_speaker", "vi_sample.wav")?
        .set_default("model.sample_rate", 24_000)?
        .set_default("model.backend_url", "http://localhost:8000")?
        .set_default("model.backend_timeout_secs", 120)?
        .set_default("synthesis.min_input_chars", 3)?
        .set_default("synthesis.min_segment_chars", 3)?
        .set_default("synthesis.max_filename_prefix_chars", 50)?
        .set_default("synthesis.default_language", "vi")?
        .set_default("worker.count", 1)?
        .set_default("worker.max_jobs_per_worker", 5)?
        .set_default("worker.soft_time_limit_secs", 540)?
        .set_default("worker.hard_time_limit_secs", 600)?
        .set_default("worker.max_deliveries", 2)?
        .set_default("worker.queue_capacity", 1000)?
        .set_default("storage.output_dir", "output")?
        .set_default("storage.max_upload_size", 10 * 1024 * 1024)?
        .set_default("storage.retention_secs", 86_400)?
        .set_default("storage.sweep_interval_secs", 3600)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: VOXA_
    // 层级分隔符: __ (双下划线)
    // 例如: VOXA_MODEL__BACKEND_URL=http://inference:8000
    builder = builder.add_source(
        Environment::with_prefix("VOXA")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("api.keys"),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.model.backend_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Model backend URL cannot be empty".to_string(),
        ));
    }

    if config.model.sample_rate == 0 {
        return Err(ConfigError::ValidationError(
            "Model sample rate cannot be 0".to_string(),
        ));
    }

    if config.worker.count == 0 {
        return Err(ConfigError::ValidationError(
            "Worker count must be at least 1".to_string(),
        ));
    }

    if config.worker.hard_time_limit_secs <= config.worker.soft_time_limit_secs {
        return Err(ConfigError::ValidationError(
            "Hard time limit must be greater than soft time limit".to_string(),
        ));
    }

    if config.worker.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Queue capacity cannot be 0".to_string(),
        ));
    }

    if config.api.keys.is_empty() {
        return Err(ConfigError::ValidationError(
            "At least one API key must be configured".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("Model Dir: {:?}", config.model.dir);
    tracing::info!("Model Backend: {}", config.model.backend_url);
    tracing::info!("Model Sample Rate: {} Hz", config.model.sample_rate);
    tracing::info!("Output Dir: {:?}", config.storage.output_dir);
    tracing::info!("Job Retention: {}s", config.storage.retention_secs);
    tracing::info!(
        "Workers: {} (recycle after {} jobs)",
        config.worker.count,
        config.worker.max_jobs_per_worker
    );
    tracing::info!(
        "Time Limits: soft {}s / hard {}s",
        config.worker.soft_time_limit_secs,
        config.worker.hard_time_limit_secs
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");

    if config.api.keys.iter().any(|k| k == DEFAULT_DEV_API_KEY) {
        tracing::warn!(
            "Using the default development API key; set VOXA_API__KEYS for production"
        );
    }
}
