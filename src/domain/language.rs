//! 支持语言表
//!
//! 语言集合是固定的：模型只对这些语言训练过，
//! 其他语言码一律在校验阶段拒绝

/// 支持的语言（语言码 -> 显示名）
///
/// 语言码统一为小写
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("vi", "Vietnamese"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("pl", "Polish"),
    ("tr", "Turkish"),
    ("ru", "Russian"),
    ("nl", "Dutch"),
    ("cs", "Czech"),
    ("ar", "Arabic"),
    ("zh-cn", "Chinese (Simplified)"),
    ("ja", "Japanese"),
    ("hu", "Hungarian"),
    ("ko", "Korean"),
    ("hi", "Hindi"),
];

/// 语言码是否受支持（大小写不敏感）
pub fn is_supported(code: &str) -> bool {
    let code = code.to_lowercase();
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// 语言显示名
pub fn display_name(code: &str) -> Option<&'static str> {
    let code = code.to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// 是否使用表意文字分句（句号 `。`，无空格词边界）
///
/// 这些语言不做 keep-length 截断：词数启发式对其无意义
pub fn is_ideographic(code: &str) -> bool {
    matches!(code, "ja" | "zh-cn")
}

/// 所有受支持语言码的逗号分隔列表（用于错误提示）
pub fn supported_codes() -> String {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|(c, _)| *c)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_lookup() {
        assert!(is_supported("vi"));
        assert!(is_supported("VI"));
        assert!(is_supported("zh-cn"));
        assert!(!is_supported("xx"));
        assert!(!is_supported(""));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("vi"), Some("Vietnamese"));
        assert_eq!(display_name("xx"), None);
    }

    #[test]
    fn test_ideographic() {
        assert!(is_ideographic("ja"));
        assert!(is_ideographic("zh-cn"));
        assert!(!is_ideographic("vi"));
        assert!(!is_ideographic("en"));
    }

    #[test]
    fn test_supported_codes_contains_all() {
        let codes = supported_codes();
        assert!(codes.contains("vi"));
        assert!(codes.contains("zh-cn"));
        assert_eq!(codes.split(", ").count(), SUPPORTED_LANGUAGES.len());
    }
}
