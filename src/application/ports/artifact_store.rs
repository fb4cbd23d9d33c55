//! Artifact Store Port - 产物存储抽象
//!
//! 输出产物与上传的临时参考音频共用一个目录，
//! 产物按时间戳命名互不覆盖，临时文件带前缀便于识别

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Artifact Store Port
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// 存储根目录
    fn output_dir(&self) -> &Path;

    /// 写入产物，返回落盘路径
    ///
    /// 文件名由调用方保证唯一（时间戳 + 文本前缀）
    async fn save_artifact(&self, filename: &str, data: &[u8]) -> Result<PathBuf, StoreError>;

    /// 产物是否仍然存在
    async fn artifact_exists(&self, filename: &str) -> bool;

    /// 打开产物用于流式下载，返回文件句柄与字节数
    ///
    /// 产物被外部清理时返回 `NotFound`，与"尚未完成"可区分
    async fn open_artifact(&self, filename: &str) -> Result<(tokio::fs::File, u64), StoreError>;

    /// 保存上传的参考音频为临时文件，返回落盘路径
    async fn save_temp_speaker(
        &self,
        extension: &str,
        data: &[u8],
    ) -> Result<PathBuf, StoreError>;

    /// 删除临时文件
    ///
    /// 幂等：文件已不存在不算错误（at-least-once 重投后的重复清理）
    async fn remove_temp(&self, path: &Path);
}
