//! 文本分句器
//!
//! 将输入文本切分为可独立合成的句子序列，并为每句计算
//! keep-length 采样数上限（模型对短句容易产生拖尾伪音，
//! 上限用于直接截断可疑的尾部，不重跑推理）
//!
//! 分句策略按语言分派：
//! - ja / zh-cn: 按 `。` 切分
//! - vi: 规则化句子切分（处理缩写与小数点）
//! - 其他: 按 `.` `!` `?` 切分，分隔符保留在句尾

use crate::domain::language;

/// 句末分隔符（通用策略）
#[inline]
fn is_sentence_delimiter(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

/// 对文本分句
///
/// 返回按原文顺序排列的、已 trim 的非空句子序列
pub fn segment(text: &str, lang_code: &str) -> Vec<String> {
    match lang_code {
        "ja" | "zh-cn" => split_ideographic(text),
        "vi" => split_vietnamese(text),
        _ => split_generic(text),
    }
}

/// 表意文字按句号 `。` 切分
fn split_ideographic(text: &str) -> Vec<String> {
    text.split('。')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 通用切分：分隔符之后断句，分隔符留在句尾
fn split_generic(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if is_sentence_delimiter(ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                segments.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }

    segments
}

/// 越南语常见缩写（后接句点不断句）
///
/// 比对时取句点前的词并转小写
const VI_ABBREVIATIONS: &[&str] = &[
    "tp", "ts", "ths", "gs", "pgs", "bs", "kts", "tr", "st", "q",
];

/// 越南语规则化句子切分
///
/// 在 `.` `!` `?` 及省略号后断句，但跳过：
/// - 小数点（两侧都是数字）
/// - 常见缩写后的句点
fn split_vietnamese(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut word = String::new();

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        current.push(ch);

        if ch.is_alphanumeric() {
            word.push(ch);
            i += 1;
            continue;
        }

        if is_sentence_delimiter(ch) || ch == '…' {
            // 吸收省略号的剩余句点
            while i + 1 < chars.len() && chars[i + 1] == '.' {
                current.push(chars[i + 1]);
                i += 1;
            }

            let prev_digit = word.chars().last().map(|c| c.is_ascii_digit()).unwrap_or(false);
            let next_digit = chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false);
            let decimal_point = ch == '.' && prev_digit && next_digit;
            let abbreviation =
                ch == '.' && VI_ABBREVIATIONS.contains(&word.to_lowercase().as_str());

            if !decimal_point && !abbreviation {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    segments.push(trimmed.to_string());
                }
                current.clear();
            }
        }

        word.clear();
        i += 1;
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }

    segments
}

/// 计算句子的 keep-length 采样数上限
///
/// 返回 `None` 表示不截断：表意文字语言、空句、以及 >=10 词的句子。
/// 其余按词数分三档，系数为经验值（采样率 24 kHz 下标定）
pub fn keep_length(segment: &str, lang_code: &str) -> Option<usize> {
    if language::is_ideographic(lang_code) {
        return None;
    }

    let word_count = segment.split_whitespace().count();
    if word_count == 0 || word_count >= 10 {
        return None;
    }

    let punct_count = segment
        .chars()
        .filter(|c| matches!(c, '.' | '!' | '?' | ','))
        .count();

    let cap = if word_count < 3 {
        18_000 * word_count + 1_500 * punct_count
    } else if word_count < 5 {
        15_000 * word_count + 2_000 * punct_count
    } else {
        13_000 * word_count + 2_000 * punct_count
    };

    Some(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_split_keeps_delimiters() {
        let segments = segment("Hello world. How are you? Fine!", "en");
        assert_eq!(segments, vec!["Hello world.", "How are you?", "Fine!"]);
    }

    #[test]
    fn test_generic_split_without_trailing_delimiter() {
        let segments = segment("First sentence. And a tail", "en");
        assert_eq!(segments, vec!["First sentence.", "And a tail"]);
    }

    #[test]
    fn test_generic_reconstruction_ignoring_whitespace() {
        // 拼接结果应能还原输入的非空白内容
        let input = "One. Two! Three? Four.";
        let joined: String = segment(input, "en").concat().split_whitespace().collect();
        let original: String = input.split_whitespace().collect();
        assert_eq!(joined, original);
    }

    #[test]
    fn test_ideographic_split() {
        let segments = segment("今日は良い天気です。散歩に行きましょう。", "ja");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "今日は良い天気です");
    }

    #[test]
    fn test_nonempty_for_text_with_terminator() {
        for lang in ["vi", "en", "ru", "ja", "zh-cn"] {
            let text = if lang == "ja" || lang == "zh-cn" {
                "テスト。"
            } else {
                "Test sentence."
            };
            assert!(!segment(text, lang).is_empty(), "lang={}", lang);
        }
    }

    #[test]
    fn test_vietnamese_basic_split() {
        let segments = segment("Xin chào bạn. Hôm nay trời đẹp quá!", "vi");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "Xin chào bạn.");
        assert_eq!(segments[1], "Hôm nay trời đẹp quá!");
    }

    #[test]
    fn test_vietnamese_decimal_point_not_split() {
        let segments = segment("Giá là 3.5 triệu đồng. Rẻ quá!", "vi");
        assert_eq!(segments.len(), 2);
        assert!(segments[0].contains("3.5"));
    }

    #[test]
    fn test_vietnamese_abbreviation_not_split() {
        let segments = segment("TP. Hồ Chí Minh rất đông. Tôi thích nơi này.", "vi");
        assert_eq!(segments.len(), 2);
        assert!(segments[0].starts_with("TP. Hồ Chí Minh"));
    }

    #[test]
    fn test_vietnamese_ellipsis_single_boundary() {
        let segments = segment("Thế là hết... Về nhà thôi.", "vi");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "Thế là hết...");
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(segment("", "en").is_empty());
        assert!(segment("   \n\t ", "vi").is_empty());
    }

    #[test]
    fn test_keep_length_bands() {
        // <3 词: 18000*w + 1500*p
        assert_eq!(keep_length("hi there.", "en"), Some(18_000 * 2 + 1_500));
        // <5 词: 15000*w + 2000*p
        assert_eq!(keep_length("one two three four.", "en"), Some(15_000 * 4 + 2_000));
        // <10 词: 13000*w + 2000*p
        assert_eq!(
            keep_length("a b c d e f g.", "en"),
            Some(13_000 * 7 + 2_000)
        );
    }

    #[test]
    fn test_keep_length_no_cap_sentinels() {
        // >=10 词不截断
        assert_eq!(keep_length("a b c d e f g h i j", "en"), None);
        // 表意文字不截断
        assert_eq!(keep_length("短い文。", "ja"), None);
        assert_eq!(keep_length("你好。", "zh-cn"), None);
        // 空句不截断
        assert_eq!(keep_length("", "en"), None);
    }

    #[test]
    fn test_keep_length_monotonic_within_bands() {
        // 同一档内词数增加，上限不减
        let w1 = keep_length("one", "en").unwrap();
        let w2 = keep_length("one two", "en").unwrap();
        assert!(w2 >= w1);

        let w3 = keep_length("one two three", "en").unwrap();
        let w4 = keep_length("one two three four", "en").unwrap();
        assert!(w4 >= w3);

        let w5 = keep_length("a b c d e", "en").unwrap();
        let w9 = keep_length("a b c d e f g h i", "en").unwrap();
        assert!(w9 >= w5);
    }

    #[test]
    fn test_keep_length_counts_commas() {
        let without = keep_length("one two", "en").unwrap();
        let with = keep_length("one, two", "en").unwrap();
        assert_eq!(with - without, 1_500);
    }
}
