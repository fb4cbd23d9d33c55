//! 音频后处理链
//!
//! 对拼接后的整段波形按固定顺序施加至多三个阶段：
//! 1. 静音裁剪（相对峰值的 dB 阈值）
//! 2. 平稳噪声抑制
//! 3. 动态链（压缩器 -> 峰值 EQ -> 限幅器），三者至少启用一个才执行
//!
//! 顺序不可配置：先裁剪避免对静音浪费降噪计算，
//! 先降噪避免压缩器抬升噪声，动态处理收尾。
//! 任一阶段输出为空即短路返回，空波形对下游无意义

use crate::domain::params::PostprocParams;

/// 裁剪分析帧长（采样数）
const TRIM_FRAME_LEN: usize = 2048;
/// 裁剪分析帧移（采样数）
const TRIM_HOP_LEN: usize = 512;
/// 降噪分析帧长（采样数）
const DENOISE_FRAME_LEN: usize = 1024;
/// 限幅器固定释放时间
const LIMITER_RELEASE_MS: f32 = 50.0;

/// 音频后处理器
///
/// 无跨调用状态，可在多个任务间复用
pub struct AudioPostprocessor {
    sample_rate: u32,
}

impl AudioPostprocessor {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 按固定顺序执行后处理链
    pub fn process(&self, samples: Vec<f32>, params: &PostprocParams) -> Vec<f32> {
        if samples.is_empty() {
            tracing::warn!("Postprocess: input waveform is empty, nothing to do");
            return samples;
        }

        let mut current = samples;

        if params.trim_silence {
            current = self.trim_silence(current, params.trim_top_db);
            if current.is_empty() {
                tracing::warn!("Postprocess: waveform became empty after trimming");
                return current;
            }
        }

        if params.reduce_noise {
            current = self.reduce_noise(current);
            if current.is_empty() {
                tracing::warn!("Postprocess: waveform became empty after noise reduction");
                return current;
            }
        }

        let dynamics_needed =
            params.apply_compressor || params.apply_eq || params.normalize_volume;
        if dynamics_needed {
            current = self.apply_dynamics(current, params);
            if current.is_empty() {
                tracing::warn!("Postprocess: waveform became empty after dynamics chain");
                return current;
            }
        }

        current
    }

    /// 裁掉首尾低于 `峰值 - top_db` 的静音
    ///
    /// 整段都低于阈值时返回空波形
    fn trim_silence(&self, samples: Vec<f32>, top_db: u32) -> Vec<f32> {
        if samples.is_empty() {
            tracing::warn!("Trim: input is empty, skipping");
            return samples;
        }

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak == 0.0 {
            return Vec::new();
        }
        let threshold = peak * 10f32.powf(-(top_db as f32) / 20.0);

        let frame_rms = |start: usize| -> f32 {
            let end = (start + TRIM_FRAME_LEN).min(samples.len());
            let frame = &samples[start..end];
            let sum: f32 = frame.iter().map(|s| s * s).sum();
            (sum / frame.len() as f32).sqrt()
        };

        let frame_count = samples.len().div_ceil(TRIM_HOP_LEN);
        let mut first_frame = None;
        let mut last_frame = 0;
        for i in 0..frame_count {
            if frame_rms(i * TRIM_HOP_LEN) > threshold {
                if first_frame.is_none() {
                    first_frame = Some(i);
                }
                last_frame = i;
            }
        }

        let Some(first) = first_frame else {
            tracing::debug!("Trim: whole waveform is below threshold");
            return Vec::new();
        };

        let start = first * TRIM_HOP_LEN;
        let end = (last_frame * TRIM_HOP_LEN + TRIM_FRAME_LEN).min(samples.len());
        let original_len = samples.len();
        let trimmed: Vec<f32> = samples[start..end].to_vec();
        tracing::debug!(
            original = original_len,
            trimmed = trimmed.len(),
            top_db,
            "Silence trimmed"
        );
        trimmed
    }

    /// 平稳噪声抑制
    ///
    /// 以最安静的十分之一帧估计噪声底，对接近噪声底的区间做
    /// 下行扩展（包络低于开启阈值时按平方律衰减）
    fn reduce_noise(&self, samples: Vec<f32>) -> Vec<f32> {
        if samples.is_empty() {
            tracing::warn!("Denoise: input is empty, skipping");
            return samples;
        }

        let mut frame_levels: Vec<f32> = samples
            .chunks(DENOISE_FRAME_LEN)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|s| s * s).sum();
                (sum / frame.len() as f32).sqrt()
            })
            .collect();
        frame_levels.sort_by(|a, b| a.total_cmp(b));

        let quietest = frame_levels.len().div_ceil(10);
        let noise_floor =
            frame_levels[..quietest].iter().sum::<f32>() / quietest as f32;
        if noise_floor <= f32::EPSILON {
            return samples;
        }

        // 开启阈值取噪声底的 4 倍，包络用 ~10ms 单极点平滑
        let gate_open = noise_floor * 4.0;
        let coeff = (-1.0 / (self.sample_rate as f32 * 0.010)).exp();
        let mut envelope = 0.0f32;
        let out = samples
            .iter()
            .map(|&s| {
                let level = s.abs();
                envelope = if level > envelope {
                    level
                } else {
                    coeff * envelope + (1.0 - coeff) * level
                };
                if envelope >= gate_open {
                    s
                } else {
                    let ratio = envelope / gate_open;
                    s * ratio * ratio
                }
            })
            .collect();

        tracing::debug!(noise_floor, "Stationary noise reduction applied");
        out
    }

    /// 动态链：压缩器 -> 峰值 EQ -> 限幅器
    ///
    /// EQ 增益恰为 0 dB 时无可闻效果，整级跳过
    fn apply_dynamics(&self, samples: Vec<f32>, params: &PostprocParams) -> Vec<f32> {
        if samples.is_empty() {
            tracing::warn!("Dynamics: input is empty, skipping");
            return samples;
        }

        let mut current = samples;

        if params.apply_compressor {
            current = self.compress(
                current,
                params.comp_threshold_db,
                params.comp_ratio,
                params.comp_attack_ms,
                params.comp_release_ms,
            );
        }

        if params.apply_eq && params.eq_peak_voice_gain_db != 0.0 {
            current = self.peak_eq(
                current,
                params.eq_peak_voice_hz,
                params.eq_peak_voice_q,
                params.eq_peak_voice_gain_db,
            );
        }

        if params.normalize_volume {
            current = self.limit(current, params.norm_target_limiter_db, LIMITER_RELEASE_MS);
        }

        current
    }

    /// 前馈压缩器（峰值包络检波）
    fn compress(
        &self,
        samples: Vec<f32>,
        threshold_db: f32,
        ratio: f32,
        attack_ms: f32,
        release_ms: f32,
    ) -> Vec<f32> {
        let ratio = ratio.max(1.0);
        let attack = time_coeff(self.sample_rate, attack_ms);
        let release = time_coeff(self.sample_rate, release_ms);

        let mut envelope = 0.0f32;
        samples
            .iter()
            .map(|&s| {
                let level = s.abs();
                let coeff = if level > envelope { attack } else { release };
                envelope = coeff * envelope + (1.0 - coeff) * level;

                let env_db = amp_to_db(envelope);
                if env_db <= threshold_db {
                    s
                } else {
                    let reduction_db = (env_db - threshold_db) * (1.0 - 1.0 / ratio);
                    s * db_to_amp(-reduction_db)
                }
            })
            .collect()
    }

    /// RBJ 峰值滤波器（直接 I 型）
    fn peak_eq(&self, samples: Vec<f32>, freq_hz: f32, q: f32, gain_db: f32) -> Vec<f32> {
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq_hz / self.sample_rate as f32;
        let alpha = w0.sin() / (2.0 * q.max(0.01));
        let cos_w0 = w0.cos();

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        let (mut x1, mut x2, mut y1, mut y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        samples
            .iter()
            .map(|&x| {
                let y = (b0 / a0) * x + (b1 / a0) * x1 + (b2 / a0) * x2
                    - (a1 / a0) * y1
                    - (a2 / a0) * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }

    /// 限幅器：瞬时起音，按释放时间回落
    fn limit(&self, samples: Vec<f32>, threshold_db: f32, release_ms: f32) -> Vec<f32> {
        let ceiling = db_to_amp(threshold_db);
        let release = time_coeff(self.sample_rate, release_ms);

        let mut envelope = 0.0f32;
        samples
            .iter()
            .map(|&s| {
                let level = s.abs();
                envelope = if level > envelope {
                    level
                } else {
                    release * envelope + (1.0 - release) * level
                };
                if envelope > ceiling {
                    s * (ceiling / envelope)
                } else {
                    s
                }
            })
            .collect()
    }
}

/// 毫秒时间常数 -> 单极点平滑系数
fn time_coeff(sample_rate: u32, ms: f32) -> f32 {
    if ms <= 0.0 {
        return 0.0;
    }
    (-1.0 / (sample_rate as f32 * ms / 1000.0)).exp()
}

fn amp_to_db(amp: f32) -> f32 {
    20.0 * amp.max(1e-10).log10()
}

fn db_to_amp(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
