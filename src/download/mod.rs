//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`     — 数据模型（Book / Chapter / 重试与并发策略 / Progress）
//! - `progress`   — 进度广播与 CLI 进度条
//! - `scheduler`  — 章节并发下载、重试与中止

pub mod models;
pub mod progress;
pub mod scheduler;
