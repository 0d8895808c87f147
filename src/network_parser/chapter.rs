//! 单章正文抓取：请求阅读页 → 提取段落 → 字体反混淆。

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue};
use tracing::debug;

use super::endpoints::{Endpoints, page_headers};
use super::token::{AuthError, TokenAuthority};
use crate::book_parser::glyph::{GlyphDecoder, PRIMARY_VARIANT};
use crate::book_parser::parser::ContentParser;
use crate::download::scheduler::ChapterSource;

/// 正文少于该字符数时，认为令牌被拒绝或被限流，而非真正的空章节。
pub const MIN_CONTENT_CHARS: usize = 100;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    HttpStatus,
    Malformed,
    AuthInvalid,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("请求失败: {0}")]
    Network(String),
    #[error("HTTP 错误: {0}")]
    HttpStatus(u16),
    #[error("页面解析失败: {0}")]
    Malformed(String),
    /// `cookie` 是这次请求带上的令牌，刷新时据此判断是否已被别人换掉。
    #[error("内容长度异常（{chars} 字），Cookie 可能已失效")]
    AuthInvalid { chars: usize, cookie: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network(_) => FetchErrorKind::Network,
            Self::HttpStatus(_) => FetchErrorKind::HttpStatus,
            Self::Malformed(_) => FetchErrorKind::Malformed,
            Self::AuthInvalid { .. } => FetchErrorKind::AuthInvalid,
        }
    }

    /// 给令牌失效错误补上请求所用的 Cookie，其他错误原样返回。
    pub fn with_cookie(self, used: &str) -> Self {
        match self {
            Self::AuthInvalid { chars, .. } => Self::AuthInvalid {
                chars,
                cookie: used.to_string(),
            },
            other => other,
        }
    }
}

pub struct ChapterFetcher {
    client: Client,
    endpoints: Endpoints,
    authority: Arc<TokenAuthority>,
}

impl ChapterFetcher {
    pub fn new(
        endpoints: Endpoints,
        authority: Arc<TokenAuthority>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoints,
            authority,
        })
    }

    pub fn authority(&self) -> &Arc<TokenAuthority> {
        &self.authority
    }

    /// 拉取并解码一章正文。
    pub fn fetch(&self, chapter_id: &str) -> Result<String, FetchError> {
        let url = self.endpoints.chapter_url(chapter_id);
        let cookie = self.authority.get_token();

        let resp = self
            .client
            .get(&url)
            .headers(page_headers(Some(&cookie)))
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = resp
            .bytes()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let html = std::str::from_utf8(&body)
            .map_err(|e| FetchError::Malformed(format!("响应不是有效的 UTF-8: {e}")))?;

        let content = extract_chapter_text(html).map_err(|e| e.with_cookie(&cookie))?;
        debug!(target: "fetch", chapter_id, chars = content.chars().count(), "章节正文获取成功");
        Ok(GlyphDecoder::decode(&content, PRIMARY_VARIANT))
    }
}

/// 从阅读页 HTML 中取出未解码的正文，并做长度校验。
///
/// 长度不足时返回的 `AuthInvalid` 不带 Cookie，由调用方补上。
pub fn extract_chapter_text(html: &str) -> Result<String, FetchError> {
    let paras = ContentParser::reader_paragraphs(html)
        .ok_or_else(|| FetchError::Malformed("响应不是 HTML 页面".to_string()))?;
    let content = ContentParser::join_paragraphs(&paras);
    let chars = content.chars().count();
    if chars < MIN_CONTENT_CHARS {
        return Err(FetchError::AuthInvalid {
            chars,
            cookie: String::new(),
        });
    }
    Ok(content)
}

impl ChapterSource for ChapterFetcher {
    fn fetch(&self, chapter_id: &str) -> Result<String, FetchError> {
        ChapterFetcher::fetch(self, chapter_id)
    }

    fn refresh_credentials(&self, rejected: &str) -> Result<(), AuthError> {
        self.authority.refresh_rejected(rejected).map(|_| ())
    }
}
