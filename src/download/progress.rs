//! 进度事件广播与 CLI 进度条。
//!
//! 下载流程只负责发出 [`Progress`]，不关心谁在消费。订阅方可以注册观察者，
//! 也可以拿一个通道接收端；发送永不阻塞，接收端掉线后自动清理。

use std::sync::{Mutex, PoisonError};

use crossbeam_channel as channel;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::{Progress, ProgressStatus};

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &Progress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn on_progress(&self, progress: &Progress) {
        self(progress)
    }
}

#[derive(Default)]
pub struct ProgressHub {
    observers: Vec<Box<dyn ProgressObserver>>,
    channels: Mutex<Vec<channel::Sender<Progress>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// 新增一个无界通道订阅。
    pub fn subscribe(&self) -> channel::Receiver<Progress> {
        let (tx, rx) = channel::unbounded();
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn emit(&self, progress: Progress) {
        for obs in &self.observers {
            obs.on_progress(&progress);
        }
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|tx| tx.send(progress.clone()).is_ok());
    }
}

/// 终端进度条观察者。
pub struct CliProgressBar {
    bar: ProgressBar,
}

impl CliProgressBar {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        bar.set_style(style);
        bar.set_prefix("章节下载");
        Self { bar }
    }
}

impl Default for CliProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for CliProgressBar {
    fn on_progress(&self, progress: &Progress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.current as u64);
        match progress.status {
            ProgressStatus::Downloading => self.bar.set_message(progress.chapter_title.clone()),
            ProgressStatus::Error => self
                .bar
                .abandon_with_message(format!("下载出错: {}", progress.chapter_title)),
            ProgressStatus::Completed => self.bar.finish_and_clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(current: usize) -> Progress {
        Progress {
            total: 2,
            current,
            chapter_title: format!("第{current}章"),
            status: ProgressStatus::Downloading,
        }
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let hub = ProgressHub::new().with_observer(move |_: &Progress| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.emit(event(1));
        hub.emit(event(2));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(a.try_iter().map(|p| p.current).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(b.try_iter().count(), 2);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let hub = ProgressHub::new();
        let rx = hub.subscribe();
        drop(rx);
        hub.emit(event(1));
        assert!(hub.channels.lock().unwrap().is_empty());
    }
}
