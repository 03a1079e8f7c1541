//! Format Category Module
//!
//! Number Format Stringから数値表示カテゴリを判定します。

use serde::Serialize;

/// 数値の表示カテゴリ
///
/// スタイル（`cellXfs`のインデックス）ごとに1つ割り当てられ、数値セルの解決方法を決めます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[non_exhaustive]
pub enum FormatCategory {
    /// 数値をそのまま返す
    #[default]
    General,
    /// 数値を100倍して返す
    Percent,
    /// シリアル値を日付に変換する
    Date,
    /// シリアル値を日時に変換する
    DateTime,
}

impl FormatCategory {
    /// 日付または日時かどうか
    pub fn is_temporal(self) -> bool {
        matches!(self, FormatCategory::Date | FormatCategory::DateTime)
    }
}

/// フォーマット文字列を分類する
///
/// `[Red]`や`[$-409]`のような角括弧のセクションを取り除いた後、
/// 大文字小文字を区別せずに次の順で判定します。
///
/// 1. `h`または`s`を含む -> `DateTime`
/// 2. `yy`、`m`、`d`のいずれかを含む -> `Date`
/// 3. `%`を含む -> `Percent`
/// 4. それ以外 -> `General`
pub(crate) fn classify(format_code: &str) -> FormatCategory {
    let stripped = strip_bracketed(format_code).to_ascii_lowercase();

    if stripped.contains('h') || stripped.contains('s') {
        FormatCategory::DateTime
    } else if stripped.contains("yy") || stripped.contains('m') || stripped.contains('d') {
        FormatCategory::Date
    } else if stripped.contains('%') {
        FormatCategory::Percent
    } else {
        FormatCategory::General
    }
}

/// 角括弧で囲まれた部分を（最短一致で）取り除く
///
/// 閉じ括弧のない`[`以降はそのまま残します。
fn strip_bracketed(format_code: &str) -> String {
    let mut result = String::with_capacity(format_code.len());
    let mut rest = format_code;

    while let Some(open) = rest.find('[') {
        match rest[open..].find(']') {
            Some(close) => {
                result.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    result.push_str(rest);
    result
}
