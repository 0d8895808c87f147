//! 日志：控制台与 `logs/latest.log` 两路输出，按 target 分级过滤，Cookie 打码后才写出。
//!
//! 进程退出时（正常结束、Ctrl-C、panic）把本次日志压成 zip；
//! 启动时若上次遗留的 `latest.log` 过大，也先压掉再开新文件。

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use regex::Regex;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::error;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::network_parser::endpoints::{COOKIE_KEY, mask_cookie};

const LATEST: &str = "latest.log";
const ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// 本程序自己的日志 target，其余（reqwest、hyper 等）只放行 WARN 及以上。
pub const CRATE_TARGETS: [&str; 6] = [
    "auth",
    "fetch",
    "download",
    "scrape",
    "startup",
    "fanqie_fetch",
];

static RE_COOKIE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("日志订阅器初始化失败: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("日志文件读写失败: {0}")]
    Io(#[from] io::Error),
    #[error("日志打包失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("时间格式化失败: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Clone, Debug)]
pub struct LogOptions {
    pub debug: bool,
    pub use_color: bool,
    pub archive_on_exit: bool,
    /// 关闭后控制台输出全部丢弃，文件日志不受影响。
    pub console: bool,
    /// `logs/` 建在这个目录下。
    pub base_dir: PathBuf,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            debug: false,
            use_color: true,
            archive_on_exit: true,
            console: true,
            base_dir: PathBuf::from("."),
        }
    }
}

/// 本程序 target 用 `crate_level`，其他一律 WARN。
pub fn level_targets(crate_level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(LevelFilter::WARN)
        .with_targets(CRATE_TARGETS.map(|target| (target, crate_level)))
}

/// 把文本里所有完整的 Cookie 换成打码形式。
pub fn redact_cookies(text: &str) -> Cow<'_, str> {
    let re = RE_COOKIE.get_or_init(|| {
        Regex::new(&format!(r"{}=\d+", regex::escape(COOKIE_KEY))).expect("compile cookie regex")
    });
    re.replace_all(text, |caps: &regex::Captures| mask_cookie(&caps[0]))
}

/// 给任意 `MakeWriter` 套一层 Cookie 打码。
#[derive(Clone)]
pub struct Redacted<M>(pub M);

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for Redacted<M> {
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter(self.0.make_writer())
    }
}

/// fmt 层每条事件只调用一次写入，所以按整块处理即可。
pub struct RedactingWriter<W>(W);

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match std::str::from_utf8(buf) {
            Ok(text) => self.0.write_all(redact_cookies(text).as_bytes())?,
            Err(_) => self.0.write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// `logs/` 目录：当前日志 `latest.log` 与历史 zip。
pub struct LogArchive {
    dir: PathBuf,
}

impl LogArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest(&self) -> PathBuf {
        self.dir.join(LATEST)
    }

    /// `latest.log` 达到 `limit` 字节才打包。
    pub fn rotate_if_large(&self, limit: u64) -> Result<Option<PathBuf>, LogError> {
        match fs::metadata(self.latest()) {
            Ok(meta) if meta.len() >= limit => self.pack(),
            _ => Ok(None),
        }
    }

    /// 把 `latest.log` 压进 `fanqie-fetch-<时间>.zip` 并删除原文件。空文件直接删掉。
    pub fn pack(&self) -> Result<Option<PathBuf>, LogError> {
        let latest = self.latest();
        let len = match fs::metadata(&latest) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len == 0 {
            fs::remove_file(&latest)?;
            return Ok(None);
        }

        let stamp = OffsetDateTime::now_utc().format(format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))?;
        let target = self.vacant_zip(&stamp);

        let mut zip = zip::ZipWriter::new(File::create(&target)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(format!("fanqie-fetch-{stamp}.log"), options)?;
        io::copy(&mut File::open(&latest)?, &mut zip)?;
        zip.finish()?;

        fs::remove_file(&latest)?;
        Ok(Some(target))
    }

    /// 同一秒内多次打包时追加序号。
    fn vacant_zip(&self, stamp: &str) -> PathBuf {
        let mut path = self.dir.join(format!("fanqie-fetch-{stamp}.zip"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("fanqie-fetch-{stamp}-{n}.zip"));
            n += 1;
        }
        path
    }
}

/// 持有期间日志有效；drop 时刷盘并按需打包。
pub struct LogSystem {
    shutdown: Arc<Shutdown>,
}

impl LogSystem {
    pub fn init(options: LogOptions) -> Result<Self, LogError> {
        let archive = LogArchive::new(options.base_dir.join("logs"));
        fs::create_dir_all(archive.dir())?;
        archive.rotate_if_large(ROTATE_BYTES)?;

        let (file_writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(rolling::never(archive.dir(), LATEST));

        let console_level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        // 进度条占用 stderr，日志走 stdout
        let console_writer = if options.console {
            BoxMakeWriter::new(io::stdout)
        } else {
            BoxMakeWriter::new(io::sink)
        };

        let console_layer = fmt::layer()
            .with_target(false)
            .with_thread_names(true)
            .with_ansi(options.use_color)
            .with_writer(Redacted(console_writer))
            .with_filter(level_targets(console_level));

        let file_layer = fmt::layer()
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(Redacted(file_writer))
            .with_filter(level_targets(LevelFilter::DEBUG));

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        let shutdown = Arc::new(Shutdown {
            archive,
            guard: Mutex::new(Some(guard)),
            archive_on_exit: options.archive_on_exit,
            done: AtomicBool::new(false),
        });
        on_ctrl_c(Arc::clone(&shutdown));
        on_panic(Arc::clone(&shutdown));

        Ok(Self { shutdown })
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.shutdown.run();
    }
}

struct Shutdown {
    archive: LogArchive,
    guard: Mutex<Option<WorkerGuard>>,
    archive_on_exit: bool,
    done: AtomicBool,
}

impl Shutdown {
    fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        // 先停写线程，缓冲全部落盘后才能打包
        drop(self.guard.lock().unwrap_or_else(PoisonError::into_inner).take());

        if self.archive_on_exit
            && let Err(err) = self.archive.pack()
        {
            eprintln!("日志打包失败: {err}");
        }
    }
}

fn on_ctrl_c(shutdown: Arc<Shutdown>) {
    let _ = ctrlc::set_handler(move || {
        shutdown.run();
        std::process::exit(130);
    });
}

fn on_panic(shutdown: Arc<Shutdown>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        match info.location() {
            Some(at) => error!(target: "startup", "panic at {}:{}: {}", at.file(), at.line(), info),
            None => error!(target: "startup", "panic: {}", info),
        }
        shutdown.run();
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn cookies_are_masked_in_text() {
        let line = "换用 novel_web_id=6123456789012345678，旧值 novel_web_id=7000000000000000001";
        assert_eq!(
            redact_cookies(line),
            "换用 novel_web_id=***5678，旧值 novel_web_id=***0001"
        );
        assert!(matches!(redact_cookies("没有 Cookie"), Cow::Borrowed(_)));
        // 已经打码的不再处理
        assert_eq!(redact_cookies("novel_web_id=***5678"), "novel_web_id=***5678");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn events_pass_through_redaction() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(Redacted(move || sink.clone()))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "auth", cookie = "novel_web_id=6123456789012345678", "请求阅读页");
        });

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("novel_web_id=***5678"), "{text}");
        assert!(!text.contains("6123456789012345678"));
    }

    #[test]
    fn dependency_noise_is_held_to_warnings() {
        let targets = level_targets(LevelFilter::INFO);
        assert!(targets.would_enable("download", &Level::INFO));
        assert!(!targets.would_enable("download", &Level::DEBUG));
        assert!(targets.would_enable("fanqie_fetch::download::scheduler", &Level::INFO));
        assert!(targets.would_enable("reqwest::connect", &Level::WARN));
        assert!(!targets.would_enable("reqwest::connect", &Level::INFO));

        let verbose = level_targets(LevelFilter::DEBUG);
        assert!(verbose.would_enable("auth", &Level::DEBUG));
        assert!(!verbose.would_enable("hyper_util::client", &Level::DEBUG));
    }

    #[test]
    fn pack_zips_and_removes_latest() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LogArchive::new(dir.path());
        fs::write(archive.latest(), "INFO 开始下载\n").unwrap();

        let zipped = archive.pack().unwrap().unwrap();
        assert!(zipped.exists());
        assert!(!archive.latest().exists());

        let mut zip = zip::ZipArchive::new(File::open(&zipped).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        let mut text = String::new();
        io::Read::read_to_string(&mut entry, &mut text).unwrap();
        assert_eq!(text, "INFO 开始下载\n");
    }

    #[test]
    fn repeated_packs_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LogArchive::new(dir.path());
        fs::write(archive.latest(), "第一次\n").unwrap();
        let first = archive.pack().unwrap().unwrap();
        fs::write(archive.latest(), "第二次\n").unwrap();
        let second = archive.pack().unwrap().unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn empty_or_missing_log_is_not_packed() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LogArchive::new(dir.path());
        assert!(archive.pack().unwrap().is_none());

        fs::write(archive.latest(), "").unwrap();
        assert!(archive.pack().unwrap().is_none());
        assert!(!archive.latest().exists());
    }

    #[test]
    fn only_oversized_log_is_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LogArchive::new(dir.path());
        fs::write(archive.latest(), "x".repeat(16)).unwrap();

        assert!(archive.rotate_if_large(1024).unwrap().is_none());
        assert!(archive.latest().exists());
        assert!(archive.rotate_if_large(16).unwrap().is_some());
        assert!(!archive.latest().exists());
    }
}
