//! 越南语文本规范化
//!
//! 在合成前对越南语输入做轻量清洗：网络缩写展开、
//! 标点修复、引号剔除、常见读法替换。
//! 规范化失败不阻塞合成，调用方回退到原文

use thiserror::Error;

/// 规范化错误
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Normalization produced empty text")]
    EmptyResult,
}

/// 网络缩写 -> 标准写法（仅全词、小写形式匹配）
const WORD_REPLACEMENTS: &[(&str, &str)] = &[
    ("ko", "không"),
    ("k", "không"),
    ("j", "gì"),
    ("dc", "được"),
    ("đc", "được"),
    ("vs", "với"),
    ("mk", "mình"),
];

/// 对越南语文本做规范化
///
/// 句末标点保持原样，分句器依赖它们
pub fn normalize_vietnamese(text: &str) -> Result<String, NormalizeError> {
    let mut result: String = text.chars().filter(|c| !c.is_control()).collect();

    for (from, to) in WORD_REPLACEMENTS {
        result = replace_word(&result, from, to);
    }

    let result = collapse_whitespace(&result)
        .replace("..", ".")
        .replace("!.", "!")
        .replace("?.", "?")
        .replace(" .", ".")
        .replace(" ,", ",")
        .replace(['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'], "")
        .replace("A.I", "Ây Ai")
        .replace("AI", "Ây Ai");

    let result = result.trim().to_string();
    if result.is_empty() {
        return Err(NormalizeError::EmptyResult);
    }
    Ok(result)
}

/// 全词替换（词 = 连续的字母数字序列）
fn replace_word(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            word.push(ch);
        } else {
            out.push_str(if word == from { to } else { &word });
            word.clear();
            out.push(ch);
        }
    }
    out.push_str(if word == from { to } else { &word });
    out
}

/// 连续空白折叠为单个空格
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
