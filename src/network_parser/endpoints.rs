//! 上游接口地址、请求头与 Cookie 约定。

use rand::Rng;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, USER_AGENT};

pub const WEB_BASE: &str = "https://fanqienovel.com";
pub const SEARCH_BASE: &str = "https://api5-normal-lf.fqnovel.com";

/// Cookie 键名，令牌以 `novel_web_id=<数字>` 形式发送。
pub const COOKIE_KEY: &str = "novel_web_id";

/// 用于探测令牌是否可用的固定章节。
pub const PROBE_ITEM_ID: &str = "7143038691944959011";

pub const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/93.0.4577.63 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:91.0) Gecko/20100101 Firefox/91.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/93.0.4577.63 Safari/537.36 Edg/93.0.961.47",
];

pub fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    web_base: String,
    search_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(WEB_BASE, SEARCH_BASE)
    }
}

impl Endpoints {
    pub fn new(web_base: &str, search_base: &str) -> Self {
        Self {
            web_base: normalize_base(web_base),
            search_base: normalize_base(search_base),
        }
    }

    /// 网页与搜索都指向同一个地址（本地测试服务器用）。
    pub fn single(base: &str) -> Self {
        Self::new(base, base)
    }

    pub fn chapter_url(&self, chapter_id: &str) -> String {
        format!("{}/reader/{}", self.web_base, chapter_id)
    }

    pub fn book_page_url(&self, book_id: &str) -> String {
        format!("{}/page/{}", self.web_base, book_id)
    }

    pub fn token_probe_url(&self) -> String {
        format!(
            "{}/api/reader/full?itemId={}",
            self.web_base, PROBE_ITEM_ID
        )
    }

    pub fn search_url(&self) -> String {
        format!("{}/reading/bookapi/search/page/v/", self.search_base)
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

pub fn cookie_value(id: u64) -> String {
    format!("{COOKIE_KEY}={id}")
}

/// 日志里只露出 Cookie 末尾几位。
pub fn mask_cookie(cookie: &str) -> String {
    let Some((key, value)) = cookie.split_once('=') else {
        return "***".to_string();
    };
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{key}=***{tail}")
}

/// 每次请求都换一个 UA，降低被按请求头指纹识别的概率。
pub fn page_headers(cookie: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
    if let Some(cookie) = cookie.filter(|c| !c.is_empty())
        && let Ok(v) = HeaderValue::from_str(cookie)
    {
        headers.insert(COOKIE, v);
    }
    headers
}
