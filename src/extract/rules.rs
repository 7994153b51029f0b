//! 跳过规则
//!
//! 标签集合与 class/id 标记词都是数据，不写在遍历逻辑里，可以单独测试和替换。

use std::collections::HashSet;

use phf::phf_set;
use regex::Regex;

/// 整棵子树都不参与正文的标签
pub static DEFAULT_SKIP_TAGS: phf::Set<&'static str> = phf_set! {
    "script", "style", "noscript", "template",
    "nav", "header", "footer", "aside", "menu", "form",
    "iframe", "img", "picture", "video", "audio", "canvas", "svg", "object", "embed",
    "button", "input", "select", "textarea", "option", "dialog",
};

/// class/id 中出现这些完整词时跳过子树
pub const DEFAULT_SKIP_TOKENS: &[&str] = &[
    "nav", "navbar", "navigation", "menu", "breadcrumb", "breadcrumbs",
    "ad", "ads", "advert", "advertisement", "sponsor", "sponsored", "banner",
    "promo", "promotion", "newsletter", "subscribe",
    "social", "share", "sharing",
    "sidebar",
    "comment", "comments",
    "related", "recommended", "trending",
];

/// 预编译的跳过规则
#[derive(Debug, Clone)]
pub struct SkipRules {
    tags: HashSet<String>,
    pattern: Option<Regex>,
}

impl SkipRules {
    /// 自定义标签与标记词；标记词按大小写不敏感的完整词匹配
    pub fn new<T, K>(tags: T, tokens: K) -> Result<Self, regex::Error>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let alternatives: Vec<String> = tokens
            .into_iter()
            .map(|t| regex::escape(t.as_ref().trim()))
            .filter(|t| !t.is_empty())
            .collect();

        let pattern = if alternatives.is_empty() {
            None
        } else {
            // 非字母数字字符都视为分隔符，所以 "nav-primary" 命中 "nav"，"header" 不命中 "ad"
            Some(Regex::new(&format!(
                r"(?i)(?:^|[^a-z0-9])(?:{})(?:[^a-z0-9]|$)",
                alternatives.join("|")
            ))?)
        };

        Ok(Self { tags, pattern })
    }

    pub fn skips_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag.to_ascii_lowercase())
    }

    /// 对 class 与 id 拼接后的字符串做完整词匹配
    pub fn skips_marker(&self, class: &str, id: &str) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        if class.is_empty() && id.is_empty() {
            return false;
        }
        pattern.is_match(&format!("{} {}", class, id))
    }
}

impl Default for SkipRules {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_TAGS.iter(), DEFAULT_SKIP_TOKENS)
            .expect("default skip tokens should compile")
    }
}
