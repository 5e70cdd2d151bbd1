//! 文本过滤器模块
//!
//! 判断一段文本是否值得送去翻译：过滤纯符号、URL、邮箱、
//! 代码样式文本与孤立的功能性词汇。

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::constants;

/// 文本过滤器
pub struct TextFilter {
    /// 功能性词汇集合
    functional_words: HashSet<String>,
    /// 缓存的正则表达式
    regex_cache: RegexCache,
}

/// 正则表达式缓存
#[derive(Default)]
struct RegexCache {
    url_regex: OnceLock<Regex>,
    email_regex: OnceLock<Regex>,
}

impl TextFilter {
    /// 创建新的文本过滤器
    pub fn new() -> Self {
        let functional_words = constants::FUNCTIONAL_WORDS
            .iter()
            .map(|&s| s.to_lowercase())
            .collect();

        Self {
            functional_words,
            regex_cache: RegexCache::default(),
        }
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str) -> bool {
        let trimmed = text.trim();

        // 基础长度检查
        if trimmed.chars().count() < constants::MIN_TEXT_LENGTH {
            return false;
        }

        // 必须包含任意书写系统的字母字符
        if !trimmed.chars().any(|c| c.is_alphabetic()) {
            return false;
        }

        // 纯数字/符号/空白
        if self.is_pure_symbols_or_numbers(trimmed) {
            return false;
        }

        if self.is_url(trimmed) {
            return false;
        }

        if self.is_email(trimmed) {
            return false;
        }

        if self.is_code_like(trimmed) {
            return false;
        }

        // 短小的功能性文本（"ok"、箭头符号等）不值得翻译
        if trimmed.chars().count() <= constants::MIN_TRANSLATION_LENGTH
            && self.is_functional_text(trimmed)
        {
            return false;
        }

        true
    }

    /// 检查是否为URL
    fn is_url(&self, text: &str) -> bool {
        if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("ftp://")
        {
            return true;
        }

        let url_regex = self.regex_cache.url_regex.get_or_init(|| {
            Regex::new(r"^(https?|ftp)://\S+$").unwrap_or_else(|_| Regex::new(r"^$").unwrap())
        });
        url_regex.is_match(text)
    }

    /// 检查是否为邮箱
    fn is_email(&self, text: &str) -> bool {
        if text.len() > 100 || !text.contains('@') || !text.contains('.') {
            return false;
        }

        let email_regex = self.regex_cache.email_regex.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .unwrap_or_else(|_| Regex::new(r"^$").unwrap())
        });
        email_regex.is_match(text)
    }

    /// 检查是否为代码模式
    fn is_code_like(&self, text: &str) -> bool {
        let special_chars = text
            .chars()
            .filter(|&c| {
                matches!(
                    c,
                    '{' | '}' | '[' | ']' | '(' | ')' | ';' | '=' | '<' | '>' | '/' | '\\'
                )
            })
            .count();

        special_chars as f32 > text.chars().count() as f32 * constants::SPECIAL_CHAR_THRESHOLD
    }

    /// 检查是否为纯符号或数字
    fn is_pure_symbols_or_numbers(&self, text: &str) -> bool {
        text.chars()
            .all(|c| c.is_numeric() || c.is_ascii_punctuation() || c.is_whitespace())
    }

    /// 检查是否为功能性文本
    fn is_functional_text(&self, text: &str) -> bool {
        self.functional_words.contains(&text.to_lowercase())
    }
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// 便利函数：检查文本是否应该翻译
pub fn should_translate(text: &str) -> bool {
    let filter = TextFilter::new();
    filter.should_translate(text)
}
