//! 解析模块入口。
//!
//! 负责把页面 HTML 还原为正文：段落提取、私有区字形解码，以及下载完成后的章节排序。

pub mod assembler;
pub mod glyph;
mod glyph_tables;
pub mod parser;
