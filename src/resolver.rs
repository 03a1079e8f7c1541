//! Cell Value Resolver Module
//!
//! 解析中のセル（型、スタイル、テキスト）を、共有文字列テーブル・書式カテゴリテーブル・
//! 日付エポックを使って型付きの値に変換するモジュール。
//!
//! 解決できない値（範囲外の共有文字列インデックス、数値として読めないテキストなど）は
//! エラーにせず、元のテキストをそのまま返します。

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::warn;

use crate::api::DateMode;
use crate::format::FormatCategory;
use crate::parser::WorkbookMetadata;
use crate::types::{CellType, CellValue, RawCell};

/// 日付のテキスト形式
const DATE_FORMAT: &str = "%Y-%m-%d";
/// 日時のテキスト形式
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 1970-01-01から数えた、各エポックの基準日（日数）
const BASE_1904: f64 = 24107.0;
const BASE_1900: f64 = 25569.0;
/// シリアル値60未満に使う基準日（1900年うるう年バグの再現）
const BASE_1900_BEFORE_LEAP_BUG: f64 = 25568.0;

/// `chrono::Duration::seconds`に渡せる範囲より十分小さい上限
const MAX_OFFSET_SECONDS: f64 = 1.0e14;

/// セル値のリゾルバー
///
/// ワークブックのメタデータを共有し、1つのワークシートストリームの中で使われます。
#[derive(Debug, Clone)]
pub(crate) struct CellResolver {
    metadata: Arc<WorkbookMetadata>,
    date_mode: DateMode,
}

impl CellResolver {
    pub fn new(metadata: Arc<WorkbookMetadata>, date_mode: DateMode) -> Self {
        Self {
            metadata,
            date_mode,
        }
    }

    /// セルの値を解決
    ///
    /// # 引数
    ///
    /// * `cell` - `<c>`要素から集めた型・スタイル・テキスト
    ///
    /// # 戻り値
    ///
    /// 解決済みの値。文字列として解決されるセルでテキストが空の場合は
    /// 空文字列（行には含めない）になります。論理値と数値は空でも値を持ちます。
    pub fn resolve(&self, cell: &RawCell) -> CellValue {
        let text = cell.text.as_str();

        // 型の宣言がなく数値として読めるテキストは数値として扱う
        let cell_type = match cell.cell_type {
            CellType::Undeclared if is_numeric(text) => CellType::Numeric,
            other => other,
        };

        match cell_type {
            CellType::Boolean => CellValue::Bool(!text.is_empty() && text != "0"),
            CellType::Numeric => self.resolve_number(text, cell.style),
            _ if text.is_empty() => CellValue::String(String::new()),
            CellType::SharedString => self.resolve_shared_string(text),
            CellType::Undeclared | CellType::InlineString | CellType::Other => {
                CellValue::String(text.to_string())
            }
        }
    }

    fn resolve_shared_string(&self, text: &str) -> CellValue {
        let resolved = text
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| self.metadata.shared_string(index));

        match resolved {
            Some(s) => CellValue::String(s.to_string()),
            None => {
                warn!(
                    "shared string index '{}' is out of range ({} strings), keeping raw value",
                    text,
                    self.metadata.shared_string_count()
                );
                CellValue::String(text.to_string())
            }
        }
    }

    fn resolve_number(&self, text: &str, style: Option<u32>) -> CellValue {
        let text = text.trim();
        // `t="n"`で値が空のセルは0として扱う
        let parsed = if text.is_empty() { Ok(0.0) } else { text.parse::<f64>() };
        let value = match parsed {
            Ok(value) if value.is_finite() => value,
            _ => {
                warn!("numeric cell value '{}' cannot be parsed, keeping raw value", text);
                return CellValue::String(text.to_string());
            }
        };

        let category = style
            .map(|s| self.metadata.format_category(s))
            .unwrap_or_default();

        match category {
            FormatCategory::Percent => CellValue::Number(value * 100.0),
            category if category.is_temporal() => {
                match serial_to_datetime(value, self.metadata.is_1904()) {
                    Some(datetime) => self.date_value(datetime, category),
                    None => {
                        warn!("serial date {} is out of range, keeping the number", value);
                        CellValue::Number(value)
                    }
                }
            }
            _ => CellValue::Number(value),
        }
    }

    fn date_value(&self, datetime: NaiveDateTime, category: FormatCategory) -> CellValue {
        let is_date = category == FormatCategory::Date;
        match self.date_mode {
            DateMode::Timestamp if is_date => {
                CellValue::DateTime(datetime.date().and_hms_opt(0, 0, 0).unwrap_or(datetime))
            }
            DateMode::Timestamp => CellValue::DateTime(datetime),
            DateMode::Text => {
                let format = if is_date { DATE_FORMAT } else { DATE_TIME_FORMAT };
                CellValue::String(datetime.format(format).to_string())
            }
        }
    }
}

/// シリアル値を日時に変換
///
/// # 引数
///
/// * `serial` - シリアル値（日数。小数部は時刻）
/// * `is_1904` - 1904年エポックを使用するかどうか
///
/// # 戻り値
///
/// * `Some(NaiveDateTime)` - 変換結果
/// * `None` - 表現できない範囲の場合
///
/// # エポックシステム
///
/// - 0より大きい値: エポックからの日数
///   - 1904年システム: 1970-01-01の24107日前が基準
///   - 1900年システム: 60以上は25569日前、60未満は25568日前が基準
///     （1900年を閏年とするExcelのバグにより、59と60はどちらも1900-02-28になる）
/// - 0以下の値: 時刻のみ。時・分・秒を順に丸めて求め、基準日
///   （1900年システムは1899-12-31、1904年システムは1904-01-01）の0時に加算する
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }

    if serial <= 0.0 {
        let hours = (serial * 24.0).round();
        let minutes = (serial * 1440.0).round() - (hours * 60.0).round();
        let seconds = (serial * 86400.0).round() - (hours * 3600.0).round() - (minutes * 60.0).round();
        let offset = hours * 3600.0 + minutes * 60.0 + seconds;

        let reference = if is_1904 {
            NaiveDate::from_ymd_opt(1904, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(1899, 12, 31)?
        };
        return add_seconds(reference.and_hms_opt(0, 0, 0)?, offset);
    }

    let base = if is_1904 {
        BASE_1904
    } else if serial >= 60.0 {
        BASE_1900
    } else {
        BASE_1900_BEFORE_LEAP_BUG
    };

    let unix_epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?.and_hms_opt(0, 0, 0)?;
    add_seconds(unix_epoch, ((serial - base) * 86400.0).round())
}

fn add_seconds(start: NaiveDateTime, seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() || seconds.abs() > MAX_OFFSET_SECONDS {
        return None;
    }
    start.checked_add_signed(Duration::seconds(seconds as i64))
}

/// 数値として読めるテキストかどうか
///
/// 前後の空白、符号、小数点、指数表記を許可します。
/// `inf`、`NaN`、16進数などは数値として扱いません。
pub(crate) fn is_numeric(text: &str) -> bool {
    let bytes = text.trim().as_bytes();
    let mut pos = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut digits = pos - int_start;

    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        digits += pos - frac_start;
    }

    if digits == 0 {
        return false;
    }

    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+') | Some(b'-')) {
            pos += 1;
        }
        let exp_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == exp_start {
            return false;
        }
    }

    pos == bytes.len()
}
