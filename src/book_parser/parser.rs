//! 网页 HTML 解析：正文段落与书籍目录页。
//!
//! 页面结构比较固定，这里沿用正则 + 手动配平 `<div>` 的做法，不引入完整 DOM 解析。

use regex::Regex;
use std::sync::OnceLock;

use crate::base_system::book_id::chapter_id_from_href;
use crate::download::models::ChapterStub;

/// 正文容器必须同时带有的 class。
const READER_CLASSES: [&str; 2] = ["muye-reader-content", "noselect"];

static RE_DIV_OPEN: OnceLock<Regex> = OnceLock::new();
static RE_DIV_ANY: OnceLock<Regex> = OnceLock::new();
static RE_CLASS: OnceLock<Regex> = OnceLock::new();
static RE_PARA: OnceLock<Regex> = OnceLock::new();
static RE_TAG: OnceLock<Regex> = OnceLock::new();
static RE_H1: OnceLock<Regex> = OnceLock::new();
static RE_SPAN: OnceLock<Regex> = OnceLock::new();
static RE_ANCHOR: OnceLock<Regex> = OnceLock::new();
static RE_HREF: OnceLock<Regex> = OnceLock::new();

fn re_div_open() -> &'static Regex {
    RE_DIV_OPEN.get_or_init(|| Regex::new(r"(?is)<div\b([^>]*)>").expect("compile RE_DIV_OPEN"))
}

fn re_div_any() -> &'static Regex {
    RE_DIV_ANY.get_or_init(|| Regex::new(r"(?is)<(/?)div\b[^>]*?(/?)>").expect("compile RE_DIV_ANY"))
}

fn re_class() -> &'static Regex {
    RE_CLASS.get_or_init(|| {
        Regex::new(r#"(?is)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("compile RE_CLASS")
    })
}

fn re_para() -> &'static Regex {
    RE_PARA.get_or_init(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("compile RE_PARA"))
}

fn re_tag() -> &'static Regex {
    RE_TAG.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("compile RE_TAG"))
}

fn re_h1() -> &'static Regex {
    RE_H1.get_or_init(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>").expect("compile RE_H1"))
}

fn re_span() -> &'static Regex {
    RE_SPAN.get_or_init(|| Regex::new(r"(?is)<span\b([^>]*)>(.*?)</span>").expect("compile RE_SPAN"))
}

fn re_anchor() -> &'static Regex {
    RE_ANCHOR.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("compile RE_ANCHOR"))
}

fn re_href() -> &'static Regex {
    RE_HREF.get_or_init(|| {
        Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("compile RE_HREF")
    })
}

/// 书籍目录页解析结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPage {
    pub title: String,
    pub status: String,
    pub chapters: Vec<ChapterStub>,
}

pub struct ContentParser;

impl ContentParser {
    /// 提取阅读页正文容器中的所有段落文本（已去标签、反转义、去空白）。
    ///
    /// 返回 `None` 表示响应体根本不是 HTML；找不到正文容器时返回空列表。
    pub fn reader_paragraphs(html: &str) -> Option<Vec<String>> {
        if !html.contains('<') {
            return None;
        }
        let Some(container) =
            Self::find_containers(html, |classes| has_classes(classes, &READER_CLASSES))
                .into_iter()
                .next()
        else {
            return Some(Vec::new());
        };

        let paras = re_para()
            .captures_iter(container)
            .filter_map(|cap| cap.get(1))
            .map(|m| Self::inner_text(m.as_str()))
            .filter(|s| !s.is_empty())
            .collect();
        Some(paras)
    }

    /// 段落拼接为正文：每段后跟一个换行。
    pub fn join_paragraphs(paras: &[String]) -> String {
        let mut out = String::with_capacity(paras.iter().map(|p| p.len() + 1).sum());
        for p in paras {
            out.push_str(p);
            out.push('\n');
        }
        out
    }

    /// 解析书籍主页：书名取首个 `<h1>`，状态取 `span.info-label-yellow`，
    /// 章节取 `div.chapter` 下所有链接。
    pub fn parse_book_page(html: &str) -> BookPage {
        let title = re_h1()
            .captures(html)
            .and_then(|cap| cap.get(1))
            .map(|m| Self::inner_text(m.as_str()))
            .unwrap_or_default();

        let status = re_span()
            .captures_iter(html)
            .find(|cap| {
                cap.get(1)
                    .and_then(|attrs| class_attr(attrs.as_str()))
                    .map(|classes| has_classes(&classes, &["info-label-yellow"]))
                    .unwrap_or(false)
            })
            .and_then(|cap| cap.get(2))
            .map(|m| Self::inner_text(m.as_str()))
            .unwrap_or_default();

        let mut chapters = Vec::new();
        for block in Self::find_containers(html, |classes| has_classes(classes, &["chapter"])) {
            for cap in re_anchor().captures_iter(block) {
                let href = cap
                    .get(1)
                    .and_then(|attrs| attr_value(re_href(), attrs.as_str()))
                    .unwrap_or_default();
                let Some(id) = chapter_id_from_href(&href) else {
                    continue;
                };
                let title = cap
                    .get(2)
                    .map(|m| Self::inner_text(m.as_str()))
                    .unwrap_or_default();
                chapters.push(ChapterStub::new(id, title));
            }
        }

        BookPage {
            title,
            status,
            chapters,
        }
    }

    /// 找出 class 满足条件的 `<div>`，返回其内部 HTML（按 `<div>` 配平截取）。
    /// 已被外层命中的嵌套 `<div>` 不会重复返回。
    fn find_containers(html: &str, matches: impl Fn(&str) -> bool) -> Vec<&str> {
        let mut out = Vec::new();
        let mut consumed_to = 0;
        for cap in re_div_open().captures_iter(html) {
            let (Some(whole), Some(attrs)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            if whole.start() < consumed_to {
                continue;
            }
            let Some(classes) = class_attr(attrs.as_str()) else {
                continue;
            };
            if !matches(&classes) {
                continue;
            }
            let body_start = whole.end();
            let body_end = Self::matching_div_end(html, body_start);
            out.push(&html[body_start..body_end]);
            consumed_to = body_end;
        }
        out
    }

    /// 从 `start` 开始找与外层 `<div>` 配对的 `</div>` 位置；未闭合时取到文末。
    fn matching_div_end(html: &str, start: usize) -> usize {
        let mut depth = 1usize;
        for cap in re_div_any().captures_iter(&html[start..]) {
            let Some(tag) = cap.get(0) else {
                continue;
            };
            let closing = cap.get(1).is_some_and(|m| !m.as_str().is_empty());
            let self_closing = cap.get(2).is_some_and(|m| !m.as_str().is_empty());
            if closing {
                depth -= 1;
                if depth == 0 {
                    return start + tag.start();
                }
            } else if !self_closing {
                depth += 1;
            }
        }
        html.len()
    }

    fn inner_text(fragment: &str) -> String {
        let stripped = re_tag().replace_all(fragment, "");
        html_escape::decode_html_entities(&stripped).trim().to_string()
    }
}

fn class_attr(attrs: &str) -> Option<String> {
    attr_value(re_class(), attrs)
}

fn attr_value(re: &Regex, attrs: &str) -> Option<String> {
    let cap = re.captures(attrs)?;
    cap.get(1)
        .or_else(|| cap.get(2))
        .map(|m| m.as_str().to_string())
}

fn has_classes(classes: &str, wanted: &[&str]) -> bool {
    wanted
        .iter()
        .all(|w| classes.split_whitespace().any(|c| c == *w))
}

#[cfg(test)]
mod tests {
    use super::*;

    const READER: &str = r#"<!doctype html>
<html><body>
<div class="muye-reader">
  <div class="muye-reader-content noselect">
    <div class="muye-reader-box"><p>第一段 &amp; 引号&quot;</p></div>
    <p>  第二段<span>加粗</span>  </p>
    <p>   </p>
  </div>
  <p>容器外的段落</p>
</div>
</body></html>"#;

    #[test]
    fn paragraphs_come_only_from_the_reader_container() {
        let paras = ContentParser::reader_paragraphs(READER).unwrap();
        assert_eq!(paras, vec!["第一段 & 引号\"", "第二段加粗"]);
        assert_eq!(
            ContentParser::join_paragraphs(&paras),
            "第一段 & 引号\"\n第二段加粗\n"
        );
    }

    #[test]
    fn container_needs_both_classes() {
        let html = r#"<html><div class="muye-reader-content"><p>不算</p></div></html>"#;
        assert_eq!(ContentParser::reader_paragraphs(html), Some(Vec::new()));
    }

    #[test]
    fn non_html_body_is_rejected() {
        assert_eq!(ContentParser::reader_paragraphs(r#"{"code":-1}"#), None);
        assert_eq!(ContentParser::reader_paragraphs(""), None);
    }

    #[test]
    fn pre_tags_are_not_paragraphs() {
        let html = r#"<div class="noselect muye-reader-content"><pre>代码</pre><p>正文</p></div>"#;
        assert_eq!(
            ContentParser::reader_paragraphs(html).unwrap(),
            vec!["正文".to_string()]
        );
    }

    #[test]
    fn book_page_lists_chapters_in_page_order() {
        let html = r#"<html><body>
<h1>斗破<em>苍穹</em></h1>
<div class="info-label"><span class="info-label-yellow">已完结</span><span class="info-label-grey">玄幻</span></div>
<div class="page-directory-content">
  <div class="chapter">
    <div class="chapter-item"><a href="/reader/7001" class="chapter-item-title">第1章 陨落</a></div>
    <div class="chapter-item"><a href="/reader/7002?enter=book">第2章 斗气</a></div>
  </div>
  <div class="chapter">
    <div class="chapter-item"><a href="https://fanqienovel.com/reader/7003">番外</a></div>
    <div class="chapter-item"><a href="/">无效</a></div>
  </div>
</div>
<a href="/reader/9999">目录外</a>
</body></html>"#;
        let page = ContentParser::parse_book_page(html);
        assert_eq!(page.title, "斗破苍穹");
        assert_eq!(page.status, "已完结");
        assert_eq!(
            page.chapters,
            vec![
                ChapterStub::new("7001", "第1章 陨落"),
                ChapterStub::new("7002", "第2章 斗气"),
                ChapterStub::new("7003", "番外"),
            ]
        );
    }

    #[test]
    fn book_page_without_directory() {
        let page = ContentParser::parse_book_page("<html><h1>空</h1></html>");
        assert_eq!(page.title, "空");
        assert!(page.status.is_empty());
        assert!(page.chapters.is_empty());
    }
}
