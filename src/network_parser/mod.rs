//! 与番茄站点交互的网络层。

pub mod chapter;
pub mod endpoints;
pub mod network;
pub mod token;
