//! 书籍主页抓取与搜索接口。

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::endpoints::{Endpoints, page_headers, random_user_agent};
use crate::book_parser::parser::{BookPage, ContentParser};
use crate::download::models::Book;

/// 搜索接口固定附带的查询参数。
const SEARCH_PARAMS: [(&str, &str); 6] = [
    ("aid", "1967"),
    ("channel", "0"),
    ("os_version", "0"),
    ("device_type", "0"),
    ("device_platform", "0"),
    ("iid", "466614321180296"),
];

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("小说ID {0} 不存在")]
    NotFound(String),
    #[error("请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("书籍 {0} 的目录为空")]
    NoChapters(String),
    #[error("搜索接口返回错误码 {0}")]
    SearchCode(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub cover: String,
    pub word_count: u64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Vec<SearchGroup>,
}

#[derive(Debug, Deserialize)]
struct SearchGroup {
    #[serde(default)]
    book_data: Vec<SearchBook>,
}

#[derive(Debug, Deserialize)]
struct SearchBook {
    #[serde(default)]
    book_id: String,
    #[serde(default)]
    book_name: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    cover: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    word_number: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
}

fn lenient_u64<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(de)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(de)?;
    Ok(match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

pub struct FanqieWebNetwork {
    client: Client,
    endpoints: Endpoints,
}

impl FanqieWebNetwork {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> reqwest::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, endpoints })
    }

    /// 抓取书籍主页，得到书名、连载状态与章节列表。
    pub fn get_book_page(&self, book_id: &str) -> Result<BookPage, ScrapeError> {
        let url = self.endpoints.book_page_url(book_id);
        debug!(target: "scrape", "获取书籍主页: {}", url);

        let resp = self
            .client
            .get(&url)
            .headers(page_headers(None))
            .send()?;
        if resp.status().as_u16() == 404 {
            error!(target: "scrape", "小说ID {} 不存在！", book_id);
            return Err(ScrapeError::NotFound(book_id.to_string()));
        }
        let html = resp.error_for_status()?.text()?;

        let page = ContentParser::parse_book_page(&html);
        if page.chapters.is_empty() {
            return Err(ScrapeError::NoChapters(book_id.to_string()));
        }
        info!(
            target: "scrape",
            "《{}》[{}] 共 {} 章",
            page.title,
            page.status,
            page.chapters.len()
        );
        Ok(page)
    }

    /// 抓取书籍主页并直接构建待下载的 [`Book`]。
    pub fn get_book(&self, book_id: &str) -> Result<Book, ScrapeError> {
        let page = self.get_book_page(book_id)?;
        Ok(Book::from_stubs(page.title, page.status, page.chapters))
    }

    pub fn search_books(&self, keyword: &str) -> Result<Vec<SearchHit>, ScrapeError> {
        let mut query: Vec<(&str, &str)> = vec![("query", keyword)];
        query.extend(SEARCH_PARAMS.iter().copied());

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));

        let resp: SearchResponse = self
            .client
            .get(self.endpoints.search_url())
            .query(&query)
            .headers(headers)
            .send()?
            .error_for_status()?
            .json()?;

        // 非 0 时 data 恒为空（多为风控拦截），不能当作“无结果”
        if resp.code != 0 {
            return Err(ScrapeError::SearchCode(resp.code));
        }

        Ok(resp
            .data
            .into_iter()
            .filter_map(|group| group.book_data.into_iter().next())
            .map(|b| SearchHit {
                book_id: b.book_id,
                title: b.book_name,
                author: b.author,
                cover: b.cover,
                word_count: b.word_number,
                status: b.status,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_payload_tolerates_loose_types() {
        let raw = r#"{"code":0,"data":[
            {"book_data":[{"book_id":"1","book_name":"甲","author":"A","cover":"c","word_number":"12000","status":1}]},
            {"book_data":[]},
            {"book_data":[{"book_id":"2","book_name":"乙","word_number":5}]}
        ]}"#;
        let resp: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.code, 0);
        let firsts: Vec<_> = resp
            .data
            .into_iter()
            .filter_map(|g| g.book_data.into_iter().next())
            .collect();
        assert_eq!(firsts.len(), 2);
        assert_eq!(firsts[0].word_number, 12000);
        assert_eq!(firsts[0].status, "1");
        assert_eq!(firsts[1].author, "");
        assert_eq!(firsts[1].word_number, 5);
    }
}
