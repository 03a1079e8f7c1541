//! Styles Parser Module
//!
//! `xl/styles.xml`からスタイルごとの書式カテゴリテーブルを構築するモジュール。

use std::collections::HashMap;

use crate::error::XlsxStreamError;
use crate::format::{builtin_format, classify, FormatCategory};

use super::events::{PartHandler, StartTag};

/// スタイルインデックス（`cellXfs`内の位置）から書式カテゴリへの対応表
///
/// スタイルパーツが存在しない場合は空になり、すべてのセルが`General`として扱われます。
///
/// `<numFmt>`で定義されていない組み込みID（14や22など）も、組み込み書式の
/// フォーマット文字列から分類します。そのためこれらのスタイルのセルは
/// シリアル値のままではなく日付として解決されます。
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FormatCategoryTable {
    categories: Vec<FormatCategory>,
}

impl FormatCategoryTable {
    /// スタイルインデックスの書式カテゴリを取得（範囲外は`General`）
    pub fn category(&self, style: u32) -> FormatCategory {
        self.categories
            .get(style as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// `cellXfs`の`numFmtId`の並びからテーブルを構築
    #[cfg(test)]
    pub fn from_format_ids(ids: &[Option<u32>]) -> Self {
        StylesHandler {
            xf_format_ids: ids.to_vec(),
            ..StylesHandler::default()
        }
        .finish()
    }
}

/// `styles.xml`のイベントハンドラー
///
/// `<numFmts>`のカスタム書式と`<cellXfs>`の`numFmtId`を集め、
/// 最後に`finish()`でカテゴリテーブルに変換します。
#[derive(Debug, Default)]
pub(crate) struct StylesHandler {
    /// numFmtId -> formatCode
    custom_formats: HashMap<u32, String>,
    /// cellXfsの各xfのnumFmtId（属性がない場合は`None`）
    xf_format_ids: Vec<Option<u32>>,
    in_num_fmts: bool,
    in_cell_xfs: bool,
}

impl StylesHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// カテゴリテーブルを構築
    ///
    /// カスタム書式、組み込み書式の順でフォーマット文字列を探し、分類します。
    /// どちらにも見つからないIDは`General`になります。
    pub fn finish(self) -> FormatCategoryTable {
        let custom_formats = self.custom_formats;
        let categories = self
            .xf_format_ids
            .into_iter()
            .map(|id| match id {
                Some(id) => custom_formats
                    .get(&id)
                    .map(String::as_str)
                    .or_else(|| builtin_format(id))
                    .map(classify)
                    .unwrap_or_default(),
                None => FormatCategory::General,
            })
            .collect();

        FormatCategoryTable { categories }
    }
}

impl PartHandler for StylesHandler {
    fn start(&mut self, tag: &StartTag) -> Result<(), XlsxStreamError> {
        if tag.is("numFmts") {
            self.in_num_fmts = true;
        } else if tag.is("cellXfs") {
            self.in_cell_xfs = true;
        } else if tag.is("numFmt") && self.in_num_fmts {
            let id = tag.attribute("numFmtId").and_then(|v| v.trim().parse::<u32>().ok());
            let code = tag.attribute("formatCode");
            if let (Some(id), Some(code)) = (id, code) {
                self.custom_formats.insert(id, code.to_string());
            }
        } else if tag.is("xf") && self.in_cell_xfs {
            // numFmtIdがなくてもインデックスの位置は維持する
            let id = tag.attribute("numFmtId").and_then(|v| v.trim().parse::<u32>().ok());
            self.xf_format_ids.push(id);
        }
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), XlsxStreamError> {
        match name {
            "numfmts" => self.in_num_fmts = false,
            "cellxfs" => self.in_cell_xfs = false,
            _ => {}
        }
        Ok(())
    }
}
