//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod model;
pub mod storage;

pub use model::{
    FakeModelBackend, HttpModelBackend, HttpModelBackendConfig, ModelArtifacts, ModelBackend,
    VoiceModelAdapter,
};
pub use storage::FileArtifactStore;
