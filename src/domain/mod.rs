//! Domain Layer - 领域层
//!
//! 纯领域逻辑，不依赖任何基础设施：
//! - language: 支持语言表
//! - segmenter: 文本分句与 keep-length 启发式
//! - normalizer: 越南语文本规范化
//! - filename: 输出文件命名
//! - params: 合成参数与后处理参数的类型化解析
//! - postproc: 音频后处理链
//! - wav: WAV 容器编解码

pub mod filename;
pub mod language;
pub mod normalizer;
pub mod params;
pub mod postproc;
pub mod segmenter;
pub mod wav;

pub use filename::generate_safe_filename;
pub use language::{display_name, is_ideographic, is_supported, SUPPORTED_LANGUAGES};
pub use params::{FormParams, PostprocParams, SynthesisParams};
pub use postproc::AudioPostprocessor;
pub use segmenter::{keep_length, segment};
