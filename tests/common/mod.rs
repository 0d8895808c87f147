//! 本地桩站点：在后台线程里跑一个 tiny_http 服务，按测试给出的处理函数应答。

#![allow(dead_code)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// 一次请求里测试关心的部分。
#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub query: String,
    pub cookie: Option<String>,
}

pub struct StubSite {
    pub base: String,
    shutdown: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StubSite {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&Hit) -> (u16, Vec<u8>) + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base = format!("http://{}", server.server_addr());
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(20)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
                let hit = Hit {
                    path: path.to_string(),
                    query: query.to_string(),
                    cookie: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Cookie"))
                        .map(|h| h.value.as_str().to_string()),
                };

                let (status, body) = handler(&hit);
                let _ = request.respond(tiny_http::Response::from_data(body).with_status_code(status));
            }
        });

        Self {
            base,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for StubSite {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn html(status: u16, body: impl Into<String>) -> (u16, Vec<u8>) {
    (status, body.into().into_bytes())
}

/// 阅读页：正文容器里每段一个 `<p>`。
pub fn reader_page(paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
    format!(
        r#"<!doctype html><html><body><div class="muye-reader"><div class="muye-reader-content noselect">{body}</div></div></body></html>"#
    )
}

/// 足够长、且以一个混淆字符（解码为 `D`）开头的正文段落。
pub fn long_paragraph(tag: &str) -> String {
    format!("\u{E3E8}{tag}{}", "这是一段足够长的章节正文。".repeat(10))
}
