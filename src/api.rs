//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use serde::Serialize;

/// 日付・時刻セルの出力モード
///
/// 日付書式（`Date`）または日時書式（`DateTime`）が適用された数値セルを
/// どの形で返すかを指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DateMode {
    /// 文字列として返す（デフォルト）
    ///
    /// - 日付: `2025-01-02`
    /// - 日時: `2025-01-02 13:45:00`
    #[default]
    Text,

    /// `chrono::NaiveDateTime`として返す
    ///
    /// 日付書式のセルは時刻部分が切り捨てられ、`00:00:00`になります。
    Timestamp,
}

/// ワークシートの表示状態
///
/// `xl/workbook.xml`の`<sheet state="...">`属性に対応します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum SheetState {
    /// 表示（デフォルト）
    #[default]
    Visible,

    /// 非表示（ユーザーが再表示可能）
    Hidden,

    /// 完全非表示（VBAからのみ再表示可能）
    VeryHidden,
}

impl SheetState {
    /// `state`属性の値から変換（大文字小文字は区別しない）
    pub(crate) fn from_attribute(value: &str) -> Self {
        if value.eq_ignore_ascii_case("hidden") {
            SheetState::Hidden
        } else if value.eq_ignore_ascii_case("veryHidden") {
            SheetState::VeryHidden
        } else {
            SheetState::Visible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_mode_default() {
        assert_eq!(DateMode::default(), DateMode::Text);
    }

    #[test]
    fn test_sheet_state_from_attribute() {
        assert_eq!(SheetState::from_attribute("visible"), SheetState::Visible);
        assert_eq!(SheetState::from_attribute("hidden"), SheetState::Hidden);
        assert_eq!(SheetState::from_attribute("veryHidden"), SheetState::VeryHidden);
        assert_eq!(SheetState::from_attribute("VERYHIDDEN"), SheetState::VeryHidden);
        assert_eq!(SheetState::from_attribute("unknown"), SheetState::Visible);
    }
}
