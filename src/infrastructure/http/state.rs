//! Application State

use std::sync::Arc;

use crate::application::ports::ArtifactStorePort;
use crate::application::service::TtsService;

/// 应用状态
///
/// 前端 handler 共享的只读依赖集合
pub struct AppState {
    /// TTS 应用服务
    pub service: TtsService,
    /// 产物存储（结果下载用）
    pub store: Arc<dyn ArtifactStorePort>,
    /// 合法 API Key 列表
    pub api_keys: Vec<String>,
    /// API Key 请求头名称
    pub key_header: String,
    /// 对外可见的 Base URL（拼接 status/result 链接）
    pub public_base_url: String,
}

impl AppState {
    pub fn new(
        service: TtsService,
        store: Arc<dyn ArtifactStorePort>,
        api_keys: Vec<String>,
        key_header: String,
        public_base_url: String,
    ) -> Self {
        Self {
            service,
            store,
            api_keys,
            key_header,
            public_base_url,
        }
    }
}
