//! 章节并发下载调度。
//!
//! 固定数量的工作线程共享一个有界任务队列和一个结果通道。每章按重试策略尝试，
//! 每个任务结束后再随机停顿一段时间，模拟人工阅读的节奏。
//!
//! 任一章节重试耗尽即中止整批：发出 error 进度并立即返回该章错误。
//! 其余线程不会被打断，只是做完手头这次尝试后不再领新任务，结果直接丢弃。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;
use rand::Rng;
use tracing::{debug, error, info, warn};

use super::models::{Book, ChapterStub, ConcurrencyPolicy, Progress, ProgressStatus, RetryPolicy};
use super::progress::ProgressHub;
use crate::network_parser::chapter::FetchError;
use crate::network_parser::token::AuthError;

/// 调度器只依赖这两个动作：取一章正文，以及在令牌被拒后刷新凭据。
pub trait ChapterSource: Send + Sync {
    fn fetch(&self, chapter_id: &str) -> Result<String, FetchError>;
    /// `rejected` 为被上游拒绝的那个 Cookie。
    fn refresh_credentials(&self, rejected: &str) -> Result<(), AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("下载章节 {title} ({id}) 失败: {source} (尝试次数: {attempts})")]
    Chapter {
        id: String,
        title: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("下载章节 {title} ({id}) 时刷新 Cookie 失败: {source}")]
    Auth {
        id: String,
        title: String,
        #[source]
        source: AuthError,
    },
}

impl DownloadError {
    pub fn chapter_id(&self) -> &str {
        match self {
            Self::Chapter { id, .. } | Self::Auth { id, .. } => id,
        }
    }

    pub fn chapter_title(&self) -> &str {
        match self {
            Self::Chapter { title, .. } | Self::Auth { title, .. } => title,
        }
    }
}

struct JobResult {
    stub: ChapterStub,
    outcome: Result<String, DownloadError>,
}

pub struct FetchScheduler {
    source: Arc<dyn ChapterSource>,
    progress: ProgressHub,
}

impl FetchScheduler {
    pub fn new(source: Arc<dyn ChapterSource>, progress: ProgressHub) -> Self {
        Self { source, progress }
    }

    pub fn progress(&self) -> &ProgressHub {
        &self.progress
    }

    /// 下载书中所有章节。成功时返回填好正文的书；失败时只返回首个耗尽重试的章节错误，
    /// 已下载的部分不会交给调用方。
    pub fn run(
        &self,
        mut book: Book,
        retry: RetryPolicy,
        concurrency: ConcurrencyPolicy,
    ) -> Result<Book, DownloadError> {
        let progress = &self.progress;
        let stubs = book.stubs();
        let total = stubs.len();
        let start = Instant::now();

        if total == 0 {
            progress.emit(Progress {
                total: 0,
                current: 0,
                chapter_title: String::new(),
                status: ProgressStatus::Completed,
            });
            return Ok(book);
        }

        let workers = concurrency.workers().min(total);
        info!(target: "download", "开始下载：{} ({} 章, {} 线程)", book.title, total, workers);

        let (job_tx, job_rx) = channel::bounded::<ChapterStub>(total);
        let (result_tx, result_rx) = channel::unbounded::<JobResult>();
        let cancel = Arc::new(AtomicBool::new(false));

        for stub in stubs {
            // 容量等于任务数，不会阻塞
            let _ = job_tx.send(stub);
        }
        drop(job_tx);

        for idx in 0..workers {
            let worker = Worker {
                source: Arc::clone(&self.source),
                retry,
                concurrency,
                jobs: job_rx.clone(),
                results: result_tx.clone(),
                cancel: Arc::clone(&cancel),
            };
            let spawned = thread::Builder::new()
                .name(format!("fetch-{idx}"))
                .spawn(move || worker.run());
            if let Err(e) = spawned {
                warn!(target: "download", "工作线程 {} 启动失败: {}", idx, e);
            }
        }
        drop(result_tx);
        drop(job_rx);

        let mut completed = 0usize;
        let mut last_title = String::new();
        for _ in 0..total {
            // 所有线程都退出（或一个都没起来）时通道断开
            let Ok(JobResult { stub, outcome }) = result_rx.recv() else {
                break;
            };
            match outcome {
                Ok(content) => {
                    completed += 1;
                    if let Some(ch) = book.get_mut(&stub.id) {
                        ch.fill(content);
                    }
                    debug!(target: "download", done = completed, total, "保存完成 {}", stub.title);
                    last_title = stub.title.clone();
                    progress.emit(Progress {
                        total,
                        current: completed,
                        chapter_title: stub.title,
                        status: ProgressStatus::Downloading,
                    });
                }
                Err(err) => {
                    cancel.store(true, Ordering::Relaxed);
                    error!(target: "download", "{}", err);
                    progress.emit(Progress {
                        total,
                        current: completed,
                        chapter_title: stub.title,
                        status: ProgressStatus::Error,
                    });
                    return Err(err);
                }
            }
        }

        if completed < total {
            // 只会在线程全部启动失败时出现
            cancel.store(true, Ordering::Relaxed);
            let missing = book
                .chapters()
                .find(|c| !c.is_filled())
                .map(|c| (c.id.clone(), c.title.clone()))
                .unwrap_or_default();
            let err = DownloadError::Chapter {
                id: missing.0,
                title: missing.1.clone(),
                attempts: 0,
                source: FetchError::Network("没有可用的下载线程".to_string()),
            };
            progress.emit(Progress {
                total,
                current: completed,
                chapter_title: missing.1,
                status: ProgressStatus::Error,
            });
            return Err(err);
        }

        progress.emit(Progress {
            total,
            current: total,
            chapter_title: last_title,
            status: ProgressStatus::Completed,
        });
        info!(
            target: "download",
            "下载完成：{} 共 {} 章，用时 {:.1}s",
            book.title,
            total,
            start.elapsed().as_secs_f32()
        );
        Ok(book)
    }
}

struct Worker {
    source: Arc<dyn ChapterSource>,
    retry: RetryPolicy,
    concurrency: ConcurrencyPolicy,
    jobs: channel::Receiver<ChapterStub>,
    results: channel::Sender<JobResult>,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return;
            }
            let Ok(stub) = self.jobs.recv() else {
                return;
            };

            let outcome = self.download(&stub);
            if self.results.send(JobResult { stub, outcome }).is_err() {
                // 调度方已中止并返回
                return;
            }
            self.pause();
        }
    }

    fn download(&self, stub: &ChapterStub) -> Result<String, DownloadError> {
        let attempts = self.retry.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.source.fetch(&stub.id) {
                Ok(content) => return Ok(content),
                Err(err) => err,
            };

            if attempt >= attempts {
                return Err(DownloadError::Chapter {
                    id: stub.id.clone(),
                    title: stub.title.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            debug!(target: "download", id = %stub.id, attempt, "章节下载失败，准备重试: {}", err);
            if let FetchError::AuthInvalid { cookie, .. } = &err {
                self.source
                    .refresh_credentials(cookie)
                    .map_err(|source| DownloadError::Auth {
                        id: stub.id.clone(),
                        title: stub.title.clone(),
                        source,
                    })?;
            } else {
                thread::sleep(self.retry.retry_delay);
            }
        }
    }

    /// 每个任务结束后的随机停顿，无论成败。
    fn pause(&self) {
        let (lo, hi) = self.concurrency.delay_bounds();
        let wait = if hi > lo {
            rand::rng().random_range(lo..=hi)
        } else {
            lo
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}
