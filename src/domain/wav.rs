//! WAV 容器编解码
//!
//! 产物统一为单声道 32-bit float WAV；解码用于
//! 读取推理后端返回的音频与测试校验

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

/// 编解码错误
#[derive(Debug, Error)]
pub enum WavError {
    #[error("Failed to encode WAV: {0}")]
    Encode(String),

    #[error("Failed to decode WAV: {0}")]
    Decode(String),
}

/// 单声道 f32 波形编码为 WAV 容器字节
pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        WavWriter::new(&mut cursor, spec).map_err(|e| WavError::Encode(e.to_string()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| WavError::Encode(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| WavError::Encode(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// 解码 WAV 容器为单声道 f32 波形
///
/// 多声道取均值混合；整型采样归一化到 [-1, 1]
pub fn decode(data: &[u8]) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader =
        WavReader::new(Cursor::new(data)).map_err(|e| WavError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| WavError::Decode(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| WavError::Decode(e.to_string()))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}
