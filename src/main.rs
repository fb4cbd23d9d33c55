//! Voxa - 异步语音克隆 TTS 服务
//!
//! 启动流程：配置加载 -> 日志初始化 -> 目录准备 -> 队列与
//! Worker 池 -> HTTP 服务器（带优雅关闭）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use voxa::application::orchestrator::{SpeechSynthesizer, SynthesizerConfig};
use voxa::application::service::{TtsService, TtsServiceConfig};
use voxa::config::{load_config, print_config};
use voxa::infrastructure::adapters::model::{
    HttpModelBackend, HttpModelBackendConfig, ModelArtifacts, VoiceModelAdapter,
};
use voxa::infrastructure::adapters::storage::FileArtifactStore;
use voxa::infrastructure::http::{AppState, HttpServer, ServerConfig};
use voxa::infrastructure::memory::InMemoryJobBroker;
use voxa::infrastructure::worker::{SynthesisWorkerPool, SynthesizerFactory, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},voxa={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Voxa - 异步语音克隆 TTS 服务");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.output_dir).await?;
    tokio::fs::create_dir_all(&config.model.dir).await?;

    // 模型工件清单（worker 加载与前端就绪检查共用）
    let artifacts = ModelArtifacts::new(
        &config.model.dir,
        &config.model.weights_file,
        &config.model.config_file,
        &config.model.vocab_file,
    );
    let missing = artifacts.missing();
    if !missing.is_empty() {
        tracing::error!(
            missing = %missing.join(", "),
            dir = %config.model.dir.display(),
            "Voice model files are missing; synthesis requests will be rejected"
        );
    }
    let default_speaker = config.model.default_speaker_path();
    if !default_speaker.exists() {
        tracing::warn!(
            path = %default_speaker.display(),
            "Default speaker reference audio does not exist"
        );
    }

    // 推理后端客户端（跨 worker 上下文复用连接池）
    let backend = Arc::new(
        HttpModelBackend::new(HttpModelBackendConfig {
            base_url: config.model.backend_url.clone(),
            timeout_secs: config.model.backend_timeout_secs,
        })
        .map_err(|e| anyhow::anyhow!("Failed to build inference backend client: {}", e))?,
    );

    // 任务队列与 Broker
    let (task_tx, task_rx) = mpsc::channel(config.worker.queue_capacity);
    let broker = InMemoryJobBroker::new(task_tx, config.worker.max_deliveries)
        .with_lease(config.worker.hard_time_limit_secs + 60)
        .arc();
    let _sweeper = broker.spawn_sweeper(
        Duration::from_secs(config.storage.sweep_interval_secs),
        Duration::from_secs(config.storage.retention_secs),
    );

    // 产物存储
    let store = Arc::new(FileArtifactStore::new(&config.storage.output_dir).await?);

    // Worker 合成上下文工厂：每次（重）建时重新核对工件并构建适配器
    let synthesizer_factory: SynthesizerFactory = {
        let artifacts = artifacts.clone();
        let backend = backend.clone();
        let sample_rate = config.model.sample_rate;
        let min_segment_chars = config.synthesis.min_segment_chars;
        let max_filename_prefix_chars = config.synthesis.max_filename_prefix_chars;
        Arc::new(move || {
            let adapter = Arc::new(VoiceModelAdapter::load(artifacts.clone(), backend.clone()));
            SpeechSynthesizer::new(
                adapter,
                SynthesizerConfig {
                    sample_rate,
                    min_segment_chars,
                    max_filename_prefix_chars,
                },
            )
        })
    };

    // 启动 Worker 池
    let worker_config = WorkerConfig {
        workers: config.worker.count,
        max_jobs_per_worker: config.worker.max_jobs_per_worker,
        soft_time_limit: Duration::from_secs(config.worker.soft_time_limit_secs),
        hard_time_limit: Duration::from_secs(config.worker.hard_time_limit_secs),
    };
    SynthesisWorkerPool::new(
        worker_config,
        task_rx,
        broker.clone(),
        store.clone(),
        default_speaker,
        synthesizer_factory,
    )
    .spawn();

    // 应用服务与 HTTP 状态
    let service = TtsService::new(
        broker.clone(),
        store.clone(),
        Arc::new(artifacts),
        TtsServiceConfig {
            min_input_chars: config.synthesis.min_input_chars,
            default_language: config.synthesis.default_language.clone(),
        },
    );
    let state = AppState::new(
        service,
        store,
        config.api.keys.clone(),
        config.api.key_header.clone(),
        config.server.public_base_url(),
    );

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(
        &config.server.host,
        config.server.port,
        config.storage.max_upload_size as usize,
    );
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
