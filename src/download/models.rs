//! 下载相关的数据模型定义。
//!
//! 包含章节占位（ChapterStub）、章节、书籍、重试/并发策略与进度事件。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;
use tracing::warn;

/// 尚未拉取正文的章节：只有 ID 与标题。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterStub {
    pub id: String,
    pub title: String,
}

impl ChapterStub {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(skip)]
    filled: bool,
}

impl Chapter {
    pub fn from_stub(stub: ChapterStub) -> Self {
        Self {
            id: stub.id,
            title: stub.title,
            content: String::new(),
            filled: false,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// 写入正文。每章只允许写入一次，重复写入返回 false 且不覆盖。
    pub fn fill(&mut self, content: String) -> bool {
        if self.filled {
            return false;
        }
        self.content = content;
        self.filled = true;
        true
    }
}

/// 书籍：章节以稳定的章节 ID 为键，避免同名章节互相覆盖。
///
/// `status`（连载/完结）只做透传，下载流程不解读它。
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub title: String,
    pub status: String,
    chapters: HashMap<String, Chapter>,
}

impl Book {
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: status.into(),
            chapters: HashMap::new(),
        }
    }

    /// 由抓取到的章节占位构建书籍。重复 ID 只保留第一次出现的条目。
    pub fn from_stubs(
        title: impl Into<String>,
        status: impl Into<String>,
        stubs: impl IntoIterator<Item = ChapterStub>,
    ) -> Self {
        let mut book = Self::new(title, status);
        for stub in stubs {
            book.insert_stub(stub);
        }
        book
    }

    pub fn insert_stub(&mut self, stub: ChapterStub) -> bool {
        match self.chapters.entry(stub.id.clone()) {
            Entry::Occupied(existing) => {
                warn!(
                    target: "download",
                    id = %stub.id,
                    kept = %existing.get().title,
                    dropped = %stub.title,
                    "重复的章节 ID，忽略后出现的条目"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Chapter::from_stub(stub));
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Chapter> {
        self.chapters.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Chapter> {
        self.chapters.get_mut(id)
    }

    pub fn stubs(&self) -> Vec<ChapterStub> {
        self.chapters
            .values()
            .map(|c| ChapterStub::new(c.id.clone(), c.title.clone()))
            .collect()
    }

    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.values()
    }

    pub fn into_chapters(self) -> Vec<Chapter> {
        self.chapters.into_values().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// 每章实际尝试次数；`max_retries = 0` 仍会尝试一次。
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyPolicy {
    pub worker_count: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ConcurrencyPolicy {
    pub fn workers(&self) -> usize {
        self.worker_count.max(1)
    }

    /// 抖动区间，上下界颠倒时自动交换。
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        if self.min_delay <= self.max_delay {
            (self.min_delay, self.max_delay)
        } else {
            (self.max_delay, self.min_delay)
        }
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            worker_count: 1,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Downloading,
    Error,
    Completed,
}

/// 进度事件，只负责向外广播，下载流程本身不保存。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total: usize,
    pub current: usize,
    pub chapter_title: String,
    pub status: ProgressStatus,
}
