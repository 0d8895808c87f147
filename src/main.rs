//! fanqie-fetch：番茄小说章节抓取命令行。
//!
//! 流程：加载配置 → 载入/刷新 Cookie → 抓取书页目录 → 并发下载章节 → 排序 → 写出 JSON 交接文件。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use fanqie_fetch::base_system::book_id::parse_book_id;
use fanqie_fetch::base_system::config::{load_or_create_in, write_atomic};
use fanqie_fetch::base_system::context::Config;
use fanqie_fetch::base_system::logging::{LogOptions, LogSystem};
use fanqie_fetch::book_parser::assembler::BookAssembler;
use fanqie_fetch::download::progress::{CliProgressBar, ProgressHub};
use fanqie_fetch::download::scheduler::FetchScheduler;
use fanqie_fetch::network_parser::chapter::ChapterFetcher;
use fanqie_fetch::network_parser::endpoints::{Endpoints, mask_cookie};
use fanqie_fetch::network_parser::network::FanqieWebNetwork;
use fanqie_fetch::network_parser::token::{TokenAuthority, TokenState};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "fanqie-fetch", version = VERSION)]
#[command(about = "番茄小说章节抓取工具")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（存放 config.yml、logs 与 Cookie 缓存）
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// 不在控制台输出日志与进度条
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 下载整本书并写出 JSON 交接文件
    Download {
        /// 书籍 ID 或书籍主页链接
        book: String,
        /// 输出目录，默认使用配置中的 save_path
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// 按关键词搜索书籍
    Search { keyword: String },
    /// 查看 Cookie 状态
    Token {
        /// 强制重新生成 Cookie
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let _log = init_logging(cli.debug, cli.quiet, &data_dir)?;
    info!(target: "startup", "fanqie-fetch v{}", VERSION);

    let config: Config =
        load_or_create_in(&data_dir).with_context(|| format!("加载配置失败: {}", data_dir.display()))?;
    let endpoints = Endpoints::default();

    match cli.command {
        Command::Download { book, output } => {
            download(&config, &endpoints, &data_dir, &book, output.as_deref(), cli.quiet)
        }
        Command::Search { keyword } => search(&config, &endpoints, &keyword),
        Command::Token { refresh } => token(&config, &endpoints, &data_dir, refresh),
    }
}

fn init_logging(debug: bool, quiet: bool, base_dir: &Path) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: !quiet,
        base_dir: base_dir.to_path_buf(),
    };
    LogSystem::init(opts).map_err(|e| anyhow!(e))
}

fn authority(config: &Config, endpoints: &Endpoints, data_dir: &Path) -> Result<Arc<TokenAuthority>> {
    let cookie_path = config.cookie_path(data_dir);
    let authority = TokenAuthority::for_site(endpoints, config.request_timeout(), cookie_path)
        .context("初始化 Cookie 校验客户端失败")?;
    Ok(Arc::new(authority))
}

fn download(
    config: &Config,
    endpoints: &Endpoints,
    data_dir: &Path,
    input: &str,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let Some(book_id) = parse_book_id(input) else {
        bail!("无法识别的书籍 ID 或链接: {}", input);
    };

    let network = FanqieWebNetwork::new(endpoints.clone(), config.request_timeout())
        .context("初始化网络客户端失败")?;
    let book = network
        .get_book(&book_id)
        .with_context(|| format!("获取书籍目录失败: book_id={}", book_id))?;

    let fetcher = ChapterFetcher::new(
        endpoints.clone(),
        authority(config, endpoints, data_dir)?,
        config.request_timeout(),
    )
    .context("初始化章节客户端失败")?;

    let hub = if quiet {
        ProgressHub::new()
    } else {
        ProgressHub::new().with_observer(CliProgressBar::new())
    };
    let scheduler = FetchScheduler::new(Arc::new(fetcher), hub);
    let book = scheduler
        .run(book, config.retry_policy(), config.concurrency_policy())
        .with_context(|| format!("下载失败: book_id={}", book_id))?;

    let assembled = BookAssembler::assemble(book, config.chapter_order());
    let path = config.hand_off_path(&assembled.title, output);
    let json = serde_json::to_vec_pretty(&assembled).context("序列化书籍失败")?;
    write_atomic(&path, &json).with_context(|| format!("写入文件失败: {}", path.display()))?;

    info!(
        target: "download",
        "《{}》共 {} 章，已保存到 {}",
        assembled.title,
        assembled.chapters.len(),
        path.display()
    );
    Ok(())
}

fn search(config: &Config, endpoints: &Endpoints, keyword: &str) -> Result<()> {
    let network = FanqieWebNetwork::new(endpoints.clone(), config.request_timeout())
        .context("初始化网络客户端失败")?;
    let hits = network
        .search_books(keyword)
        .with_context(|| format!("搜索失败: {}", keyword))?;

    if hits.is_empty() {
        println!("未搜索到结果");
        return Ok(());
    }

    println!("===== 搜索结果 =====");
    for (idx, b) in hits.iter().enumerate() {
        println!(
            "{}. 书名: {} | ID: {} | 作者: {} | 字数: {}",
            idx + 1,
            b.title,
            b.book_id,
            b.author,
            b.word_count
        );
    }
    Ok(())
}

fn token(config: &Config, endpoints: &Endpoints, data_dir: &Path, refresh: bool) -> Result<()> {
    let authority = authority(config, endpoints, data_dir)?;

    let value = if refresh {
        authority.refresh().context("刷新 Cookie 失败")?
    } else {
        match authority.state() {
            TokenState::Valid => authority.get_token(),
            state => {
                warn!(target: "auth", "当前 Cookie 状态: {:?}，尝试刷新", state);
                authority.get_token()
            }
        }
    };

    if value.is_empty() {
        bail!("没有可用的 Cookie");
    }
    let issued = authority
        .snapshot()
        .map(|t| t.issued_at.to_string())
        .unwrap_or_default();
    println!("{} (生成于 {})", mask_cookie(&value), issued);
    Ok(())
}
