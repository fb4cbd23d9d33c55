//! 合成与后处理参数
//!
//! 客户端以扁平表单键值对提交覆盖项，每个键独立做类型化解析；
//! 解析失败记录告警并回退默认值，绝不因单个参数写错而拒绝请求

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 扁平表单参数（键 -> 原始字符串值）
pub type FormParams = HashMap<String, String>;

/// 当前唯一支持的降噪方法
pub const DENOISE_METHOD_SPECTRAL_GATE: &str = "spectral_gate";

/// 逐句推理参数
///
/// 每次 `synthesize_segment` 调用都完整下发给模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub temperature: f32,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub speed: f32,
    pub enable_text_splitting: bool,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            length_penalty: 1.0,
            repetition_penalty: 10.0,
            top_k: 30,
            top_p: 0.85,
            speed: 1.0,
            enable_text_splitting: true,
        }
    }
}

impl SynthesisParams {
    /// 从表单参数构建，缺失或非法的键回退默认值
    pub fn from_form(form: &FormParams) -> Self {
        let d = Self::default();
        Self {
            temperature: parse_f32(form, "temperature", d.temperature),
            length_penalty: parse_f32(form, "length_penalty", d.length_penalty),
            repetition_penalty: parse_f32(form, "repetition_penalty", d.repetition_penalty),
            top_k: parse_u32(form, "top_k", d.top_k),
            top_p: parse_f32(form, "top_p", d.top_p),
            speed: parse_f32(form, "speed", d.speed),
            enable_text_splitting: parse_bool(form, "enable_text_splitting", d.enable_text_splitting),
        }
    }
}

/// 音频后处理参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostprocParams {
    pub trim_silence: bool,
    pub trim_top_db: u32,
    pub reduce_noise: bool,
    pub denoise_method: String,
    pub apply_compressor: bool,
    pub comp_threshold_db: f32,
    pub comp_ratio: f32,
    pub comp_attack_ms: f32,
    pub comp_release_ms: f32,
    pub apply_eq: bool,
    pub eq_peak_voice_hz: f32,
    pub eq_peak_voice_q: f32,
    pub eq_peak_voice_gain_db: f32,
    pub normalize_volume: bool,
    pub norm_target_limiter_db: f32,
}

impl Default for PostprocParams {
    fn default() -> Self {
        Self {
            trim_silence: false,
            trim_top_db: 20,
            reduce_noise: false,
            denoise_method: DENOISE_METHOD_SPECTRAL_GATE.to_string(),
            apply_compressor: false,
            comp_threshold_db: -16.0,
            comp_ratio: 4.0,
            comp_attack_ms: 5.0,
            comp_release_ms: 100.0,
            apply_eq: false,
            eq_peak_voice_hz: 1500.0,
            eq_peak_voice_q: 1.0,
            eq_peak_voice_gain_db: 1.5,
            normalize_volume: false,
            norm_target_limiter_db: -1.0,
        }
    }
}

impl PostprocParams {
    /// 从表单参数构建，缺失或非法的键回退默认值
    pub fn from_form(form: &FormParams) -> Self {
        let d = Self::default();
        Self {
            trim_silence: parse_bool(form, "trim_silence", d.trim_silence),
            trim_top_db: parse_u32(form, "trim_top_db", d.trim_top_db),
            reduce_noise: parse_bool(form, "reduce_noise", d.reduce_noise),
            denoise_method: parse_denoise_method(form, &d.denoise_method),
            apply_compressor: parse_bool(form, "apply_compressor", d.apply_compressor),
            comp_threshold_db: parse_f32(form, "comp_threshold_db", d.comp_threshold_db),
            comp_ratio: parse_f32(form, "comp_ratio", d.comp_ratio),
            comp_attack_ms: parse_f32(form, "comp_attack_ms", d.comp_attack_ms),
            comp_release_ms: parse_f32(form, "comp_release_ms", d.comp_release_ms),
            apply_eq: parse_bool(form, "apply_eq", d.apply_eq),
            eq_peak_voice_hz: parse_f32(form, "eq_peak_voice_hz", d.eq_peak_voice_hz),
            eq_peak_voice_q: parse_f32(form, "eq_peak_voice_q", d.eq_peak_voice_q),
            eq_peak_voice_gain_db: parse_f32(form, "eq_peak_voice_gain_db", d.eq_peak_voice_gain_db),
            normalize_volume: parse_bool(form, "normalize_volume", d.normalize_volume),
            norm_target_limiter_db: parse_f32(form, "norm_target_limiter_db", d.norm_target_limiter_db),
        }
    }
}

/// 解析浮点参数，非法值告警并回退默认
pub fn parse_f32(form: &FormParams, key: &str, default: f32) -> f32 {
    match form.get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "Invalid float parameter, using default");
            default
        }),
    }
}

/// 解析整型参数，非法值告警并回退默认
pub fn parse_u32(form: &FormParams, key: &str, default: u32) -> u32 {
    match form.get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "Invalid integer parameter, using default");
            default
        }),
    }
}

/// 解析布尔参数
///
/// 存在时按 `true/1/yes/on` 判定为真，其余一律为假；缺失回退默认
pub fn parse_bool(form: &FormParams, key: &str, default: bool) -> bool {
    match form.get(key) {
        None => default,
        Some(raw) => matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
    }
}

/// 解析降噪方法，未识别的值告警并回退默认
fn parse_denoise_method(form: &FormParams, default: &str) -> String {
    match form.get("denoise_method") {
        None => default.to_string(),
        Some(raw) if raw.trim() == DENOISE_METHOD_SPECTRAL_GATE => raw.trim().to_string(),
        Some(raw) => {
            tracing::warn!(value = %raw, default, "Unknown denoise method, using default");
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_synthesis_defaults() {
        let p = SynthesisParams::default();
        assert_eq!(p.temperature, 0.3);
        assert_eq!(p.repetition_penalty, 10.0);
        assert_eq!(p.top_k, 30);
        assert!(p.enable_text_splitting);
    }

    #[test]
    fn test_synthesis_overrides() {
        let p = SynthesisParams::from_form(&form(&[
            ("temperature", "0.7"),
            ("top_k", "50"),
            ("enable_text_splitting", "false"),
        ]));
        assert_eq!(p.temperature, 0.7);
        assert_eq!(p.top_k, 50);
        assert!(!p.enable_text_splitting);
        // 未覆盖的键保持默认
        assert_eq!(p.speed, 1.0);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let p = SynthesisParams::from_form(&form(&[
            ("temperature", "hot"),
            ("top_k", "many"),
        ]));
        assert_eq!(p.temperature, 0.3);
        assert_eq!(p.top_k, 30);
    }

    #[test]
    fn test_bool_accepted_spellings() {
        for v in ["true", "1", "yes", "on", "TRUE", "On"] {
            assert!(parse_bool(&form(&[("flag", v)]), "flag", false), "v={}", v);
        }
        for v in ["false", "0", "no", "off", "banana"] {
            assert!(!parse_bool(&form(&[("flag", v)]), "flag", true), "v={}", v);
        }
    }

    #[test]
    fn test_postproc_defaults() {
        let p = PostprocParams::default();
        assert!(!p.trim_silence);
        assert_eq!(p.trim_top_db, 20);
        assert_eq!(p.comp_threshold_db, -16.0);
        assert_eq!(p.eq_peak_voice_gain_db, 1.5);
        assert_eq!(p.denoise_method, DENOISE_METHOD_SPECTRAL_GATE);
    }

    #[test]
    fn test_postproc_overrides() {
        let p = PostprocParams::from_form(&form(&[
            ("trim_silence", "on"),
            ("trim_top_db", "30"),
            ("comp_ratio", "2.5"),
        ]));
        assert!(p.trim_silence);
        assert_eq!(p.trim_top_db, 30);
        assert_eq!(p.comp_ratio, 2.5);
    }

    #[test]
    fn test_unknown_denoise_method_falls_back() {
        let p = PostprocParams::from_form(&form(&[("denoise_method", "wiener")]));
        assert_eq!(p.denoise_method, DENOISE_METHOD_SPECTRAL_GATE);
    }

    #[test]
    fn test_payload_roundtrip() {
        // 参数随任务负载序列化，反序列化后必须等价
        let p = SynthesisParams::from_form(&form(&[("speed", "1.2")]));
        let json = serde_json::to_string(&p).unwrap();
        let back: SynthesisParams = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
