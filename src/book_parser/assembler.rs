//! 把下载完成的书整理成有序的章节列表，交给后续的导出步骤。

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::download::models::{Book, Chapter};

/// 章节排序方式。
///
/// 默认按章节 ID 的字符串字典序，与站点接口的历史行为一致；
/// 位数不同的 ID（如 "9" 与 "10"）会因此排错，需要时可切换为数值序。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterOrder {
    #[default]
    Lexicographic,
    Numeric,
}

impl ChapterOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexicographic => "lexicographic",
            Self::Numeric => "numeric",
        }
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexicographic => a.cmp(b),
            // 非数字 ID 排在数字之后，彼此按字典序
            Self::Numeric => match (a.parse::<u128>(), b.parse::<u128>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            },
        }
    }
}

impl fmt::Display for ChapterOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChapterOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexicographic" | "lexical" | "string" => Ok(Self::Lexicographic),
            "numeric" | "number" => Ok(Self::Numeric),
            other => Err(format!("未知的章节排序方式: {other}")),
        }
    }
}

/// 导出用的整书结构，章节已排好序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledBook {
    pub title: String,
    pub status: String,
    pub chapters: Vec<Chapter>,
}

pub struct BookAssembler;

impl BookAssembler {
    /// 按章节 ID 排序。排序稳定；同 ID 的章节在 [`Book`] 中不可能出现。
    pub fn order(chapters: impl IntoIterator<Item = Chapter>, order: ChapterOrder) -> Vec<Chapter> {
        let mut list: Vec<Chapter> = chapters.into_iter().collect();
        list.sort_by(|a, b| order.compare(&a.id, &b.id));
        list
    }

    pub fn assemble(book: Book, order: ChapterOrder) -> AssembledBook {
        let title = book.title.clone();
        let status = book.status.clone();
        AssembledBook {
            title,
            status,
            chapters: Self::order(book.into_chapters(), order),
        }
    }
}
