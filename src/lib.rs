//! 番茄小说章节抓取。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/ID 解析等基础设施
//! - `network_parser`：站点地址、Cookie 令牌、章节与书页抓取、搜索
//! - `download`：数据模型、并发下载调度与进度广播
//! - `book_parser`：HTML 解析、字体反混淆与整书整理

pub mod base_system;
pub mod book_parser;
pub mod download;
pub mod network_parser;
