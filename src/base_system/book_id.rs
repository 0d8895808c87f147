//! 书籍/章节 ID 的解析与规范化。

use regex::Regex;
use std::sync::OnceLock;

static RE_URL: OnceLock<Regex> = OnceLock::new();
static RE_QS: OnceLock<Regex> = OnceLock::new();
static RE_PAGE: OnceLock<Regex> = OnceLock::new();

fn re_url() -> &'static Regex {
    RE_URL.get_or_init(|| Regex::new(r"https?://\S+").expect("compile RE_URL"))
}

fn re_qs() -> &'static Regex {
    RE_QS.get_or_init(|| Regex::new(r"(?i)(book_id|bookId)=([0-9]+)").expect("compile RE_QS"))
}

fn re_page() -> &'static Regex {
    RE_PAGE.get_or_init(|| Regex::new(r"/page/(\d+)").expect("compile RE_PAGE"))
}

/// 接受纯数字 ID，或粘贴进来的书籍主页/分享链接。
pub fn parse_book_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }

    let target = re_url()
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    re_qs()
        .captures(target)
        .and_then(|caps| caps.get(2))
        .or_else(|| re_page().captures(target).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str().to_string())
}

/// 章节链接（如 `/reader/7143...?enter=book`）的最后一段即章节 ID。
pub fn chapter_id_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let last = path.trim_end_matches('/').rsplit('/').next()?.trim();
    let base = path.trim_end_matches('/');
    if last.is_empty() || base.is_empty() || base.ends_with(':') {
        return None;
    }
    Some(last.to_string())
}
