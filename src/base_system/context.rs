//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::book_parser::assembler::ChapterOrder;
use crate::download::models::{ConcurrencyPolicy, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_min_wait_time")]
    pub min_wait_time: u64,
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // 保存配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_cookie_file")]
    pub cookie_file: String,
    #[serde(default = "default_chapter_order")]
    pub chapter_order: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            min_wait_time: default_min_wait_time(),
            max_wait_time: default_max_wait_time(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            request_timeout: default_request_timeout(),
            save_path: String::new(),
            cookie_file: default_cookie_file(),
            chapter_order: default_chapter_order(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 9] = [
            FieldMeta {
                name: "max_workers",
                description: "最大并发线程数",
            },
            FieldMeta {
                name: "min_wait_time",
                description: "每章下载后的最小随机等待（毫秒）",
            },
            FieldMeta {
                name: "max_wait_time",
                description: "每章下载后的最大随机等待（毫秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "每章最多尝试次数（0 也会尝试一次）",
            },
            FieldMeta {
                name: "retry_delay",
                description: "非 Cookie 失效类错误的重试间隔（秒）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径，留空为当前目录",
            },
            FieldMeta {
                name: "cookie_file",
                description: "Cookie 缓存文件，相对路径基于数据目录",
            },
            FieldMeta {
                name: "chapter_order",
                description: "章节排序方式 (lexicographic/numeric)",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers 至少为 1".to_string());
        }
        if self.min_wait_time > self.max_wait_time {
            return Err(format!(
                "min_wait_time ({}) 不能大于 max_wait_time ({})",
                self.min_wait_time, self.max_wait_time
            ));
        }
        if self.request_timeout == 0 {
            return Err("request_timeout 至少为 1 秒".to_string());
        }
        self.chapter_order.parse::<ChapterOrder>()?;
        Ok(())
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay),
        }
    }

    pub fn concurrency_policy(&self) -> ConcurrencyPolicy {
        ConcurrencyPolicy {
            worker_count: self.max_workers,
            min_delay: Duration::from_millis(self.min_wait_time),
            max_delay: Duration::from_millis(self.max_wait_time),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    /// 校验过的配置不会走到回退分支。
    pub fn chapter_order(&self) -> ChapterOrder {
        self.chapter_order.parse().unwrap_or_default()
    }

    /// Cookie 文件位置：绝对路径原样使用，相对路径挂在数据目录下。
    pub fn cookie_path(&self, data_dir: &Path) -> PathBuf {
        let p = Path::new(&self.cookie_file);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            data_dir.join(p)
        }
    }

    /// 整书交接文件 `<save_path>/<书名>.json`。
    pub fn hand_off_path(&self, title: &str, save_dir: Option<&Path>) -> PathBuf {
        let dir = save_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_save_dir());
        dir.join(format!("{}.json", safe_fs_name(title, "_", 120)))
    }
}

pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            // Windows 文件名禁用字符换成全角
            ':' => '：',
            '"' => '＂',
            '<' => '＜',
            '>' => '＞',
            '/' => '／',
            '\\' => '＼',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = cleaned.to_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符中间截断
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

fn default_max_workers() -> usize {
    1
}

fn default_min_wait_time() -> u64 {
    50
}

fn default_max_wait_time() -> u64 {
    150
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cookie_file() -> String {
    "data/cookie.json".to_string()
}

fn default_chapter_order() -> String {
    ChapterOrder::default().as_str().to_string()
}
