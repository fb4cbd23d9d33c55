//! 输出文件命名
//!
//! 产物文件名 = `<UTC 微秒时间戳>_<清洗后的文本前缀>.wav`
//! 时间戳部分保证同一文本的两次调用也不会撞名

use chrono::Utc;

/// 前缀最大字符数的默认值
pub const DEFAULT_MAX_PREFIX_CHARS: usize = 50;

/// 前缀清洗失败时的兜底名
const FALLBACK_PREFIX: &str = "synthesized_audio";

/// 根据输入文本生成唯一且文件系统安全的文件名
///
/// 前缀规则：换行折叠为空格、取前 `max_prefix_chars` 个字符、
/// 转小写、空格转下划线、仅保留 `[a-z0-9_]`、去掉首尾下划线；
/// 结果为空时使用兜底名
pub fn generate_safe_filename(text: &str, max_prefix_chars: usize) -> String {
    let cleaned = text.replace(['\n', '\r'], " ");
    let prefix: String = cleaned
        .trim()
        .chars()
        .take(max_prefix_chars)
        .collect::<String>()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
        .collect();

    let prefix = prefix.trim_matches('_');
    let prefix = if prefix.is_empty() { FALLBACK_PREFIX } else { prefix };

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    format!("{}_{}.wav", timestamp, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_and_charset() {
        let name = generate_safe_filename("Xin chào bạn!", DEFAULT_MAX_PREFIX_CHARS);
        assert!(name.ends_with(".wav"));
        assert!(name
            .trim_end_matches(".wav")
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_')));
    }

    #[test]
    fn test_prefix_from_text() {
        let name = generate_safe_filename("Hello World", DEFAULT_MAX_PREFIX_CHARS);
        assert!(name.ends_with("_hello_world.wav"));
    }

    #[test]
    fn test_distinct_names_for_identical_text() {
        let a = generate_safe_filename("same text", DEFAULT_MAX_PREFIX_CHARS);
        std::thread::sleep(std::time::Duration::from_micros(2));
        let b = generate_safe_filename("same text", DEFAULT_MAX_PREFIX_CHARS);
        // 时间戳精确到微秒，间隔非零的两次调用必然不同
        assert_ne!(a, b);
    }

    #[test]
    fn test_fallback_when_no_safe_chars() {
        let name = generate_safe_filename("!!! ???", DEFAULT_MAX_PREFIX_CHARS);
        assert!(name.contains(FALLBACK_PREFIX));
    }

    #[test]
    fn test_newlines_folded() {
        let name = generate_safe_filename("dòng một\ndòng hai", DEFAULT_MAX_PREFIX_CHARS);
        assert!(!name.contains('\n'));
    }

    #[test]
    fn test_prefix_truncated() {
        let long_text = "word ".repeat(40);
        let name = generate_safe_filename(&long_text, 10);
        // 时间戳固定 22 字符 + '_' + 前缀(<=10) + ".wav"
        let body = name.trim_end_matches(".wav");
        assert!(body[23..].chars().count() <= 10);
    }
}
