//! 正文字体反混淆。
//!
//! 站点把正文里的常用字替换成私有区（PUA）码位，再用自定义字体渲染成真实字形。
//! 这里按字体变体的映射表把码位还原成真实字符；不认识的字符一律原样透传，
//! 所以解码永远不会失败。

use super::glyph_tables::{UNMAPPED, VARIANT_0, VARIANT_1};

/// 站点正文使用的字体变体。
pub const PRIMARY_VARIANT: usize = 0;

struct FontVariant {
    start: u32,
    end: u32,
    table: &'static [char],
}

static VARIANTS: [FontVariant; 2] = [
    FontVariant {
        start: 58344,
        end: 58715,
        table: &VARIANT_0,
    },
    FontVariant {
        start: 58345,
        end: 58716,
        table: &VARIANT_1,
    },
];

pub struct GlyphDecoder;

impl GlyphDecoder {
    /// 已知变体数量；`variant >= variant_count()` 时解码即恒等变换。
    pub fn variant_count() -> usize {
        VARIANTS.len()
    }

    /// 单个字符的映射结果；`None` 表示该字符应原样保留。
    pub fn maps(ch: char, variant: usize) -> Option<char> {
        let font = VARIANTS.get(variant)?;
        let cp = ch as u32;
        if cp < font.start || cp > font.end {
            return None;
        }
        let offset = (cp - font.start) as usize;
        match font.table.get(offset) {
            Some(&mapped) if mapped != UNMAPPED => Some(mapped),
            _ => None,
        }
    }

    /// 逐字符还原文本，输出与输入按字符一一对应、顺序不变。
    pub fn decode(text: &str, variant: usize) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            out.push(Self::maps(ch, variant).unwrap_or(ch));
        }
        out
    }
}
