//! Format Module
//!
//! Excel Number Format Stringの分類と組み込み書式の対応表を提供します。

mod builtin;
mod category;

pub(crate) use builtin::builtin_format;
pub use category::FormatCategory;
pub(crate) use category::classify;
