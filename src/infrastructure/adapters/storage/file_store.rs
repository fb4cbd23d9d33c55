//! File Artifact Store - 文件系统产物存储
//!
//! 产物与上传的临时参考音频同目录：产物按时间戳命名只增不改，
//! 临时文件带 `speaker_upload_` 前缀。崩溃遗留的孤儿临时文件
//! 是可接受的有界泄漏，不做主动回收

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::{ArtifactStorePort, StoreError};

/// 临时参考音频文件名前缀
const TEMP_SPEAKER_PREFIX: &str = "speaker_upload_";

/// 文件系统产物存储
pub struct FileArtifactStore {
    output_dir: PathBuf,
}

impl FileArtifactStore {
    /// 创建存储，确保目录存在
    pub async fn new(output_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { output_dir })
    }
}

#[async_trait]
impl ArtifactStorePort for FileArtifactStore {
    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn save_artifact(&self, filename: &str, data: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.output_dir.join(filename);
        fs::write(&path, data)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            bytes = data.len(),
            "Artifact saved"
        );
        Ok(path)
    }

    async fn artifact_exists(&self, filename: &str) -> bool {
        self.output_dir.join(filename).exists()
    }

    async fn open_artifact(&self, filename: &str) -> Result<(tokio::fs::File, u64), StoreError> {
        let path = self.output_dir.join(filename);
        if !path.exists() {
            return Err(StoreError::NotFound(filename.to_string()));
        }

        let file = fs::File::open(&path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
            .len();

        Ok((file, size))
    }

    async fn save_temp_speaker(
        &self,
        extension: &str,
        data: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let filename = format!("{}{}.{}", TEMP_SPEAKER_PREFIX, Uuid::new_v4(), extension);
        let path = self.output_dir.join(filename);
        fs::write(&path, data)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Temp speaker audio saved");
        Ok(path)
    }

    async fn remove_temp(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Temp speaker audio removed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // at-least-once 重投后可能已被上一次执行清理
                tracing::debug!(path = %path.display(), "Temp speaker audio already gone");
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove temp speaker audio"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_open_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).await.unwrap();

        let path = store.save_artifact("out.wav", b"audio-bytes").await.unwrap();
        assert!(path.exists());
        assert!(store.artifact_exists("out.wav").await);

        let (_file, size) = store.open_artifact("out.wav").await.unwrap();
        assert_eq!(size, 11);
    }

    #[tokio::test]
    async fn test_open_missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).await.unwrap();
        let err = store.open_artifact("gone.wav").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_temp_speaker_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).await.unwrap();

        let path = store.save_temp_speaker("wav", b"ref").await.unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(TEMP_SPEAKER_PREFIX));

        store.remove_temp(&path).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_temp_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).await.unwrap();
        let path = store.save_temp_speaker("wav", b"ref").await.unwrap();

        store.remove_temp(&path).await;
        // 第二次删除不应 panic 或报错
        store.remove_temp(&path).await;
    }

    #[tokio::test]
    async fn test_distinct_temp_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).await.unwrap();
        let a = store.save_temp_speaker("wav", b"a").await.unwrap();
        let b = store.save_temp_speaker("wav", b"b").await.unwrap();
        assert_ne!(a, b);
    }
}
