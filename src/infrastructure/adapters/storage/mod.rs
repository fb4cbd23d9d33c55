//! Storage Adapters - 产物存储实现

mod file_store;

pub use file_store::FileArtifactStore;
