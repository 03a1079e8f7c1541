//! Shared Strings Parser Module
//!
//! `xl/sharedStrings.xml`から共有文字列テーブルを構築するモジュール。

use crate::error::XlsxStreamError;

use super::events::{PartHandler, StartTag};

/// `uniqueCount`から確保する容量の上限
const MAX_CAPACITY_HINT: usize = 1 << 16;

/// 共有文字列テーブル
///
/// インデックスはパーツ内での`<si>`の出現順（0始まり）です。
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SharedStringTable {
    strings: Vec<String>,
}

impl SharedStringTable {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[cfg(test)]
    pub fn from_strings(strings: &[&str]) -> Self {
        Self {
            strings: strings.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `sharedStrings.xml`のイベントハンドラー
///
/// リッチテキスト（`<r>`）の各`<t>`は連結し、ふりがな（`<rPh>`）の内容は除外します。
#[derive(Debug, Default)]
pub(crate) struct SharedStringsHandler {
    strings: Vec<String>,
    current: String,
    in_item: bool,
    in_text: bool,
    in_phonetic: bool,
}

impl SharedStringsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> SharedStringTable {
        SharedStringTable {
            strings: self.strings,
        }
    }
}

impl PartHandler for SharedStringsHandler {
    fn start(&mut self, tag: &StartTag) -> Result<(), XlsxStreamError> {
        if tag.is("sst") {
            if let Some(count) = tag.attribute("uniqueCount").and_then(|v| v.parse::<usize>().ok()) {
                self.strings.reserve(count.min(MAX_CAPACITY_HINT));
            }
        } else if tag.is("si") {
            self.in_item = true;
            self.current.clear();
        } else if tag.is("rPh") {
            self.in_phonetic = true;
        } else if tag.is("t") && self.in_item && !self.in_phonetic {
            self.in_text = true;
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), XlsxStreamError> {
        if self.in_text {
            self.current.push_str(text);
        }
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), XlsxStreamError> {
        match name {
            "t" => self.in_text = false,
            "rph" => self.in_phonetic = false,
            "si" if self.in_item => {
                self.in_item = false;
                self.strings.push(std::mem::take(&mut self.current));
            }
            _ => {}
        }
        Ok(())
    }
}
