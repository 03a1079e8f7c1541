//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::fmt;

use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::api::SheetState;

/// 解決済みのセル値
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// 文字列（共有文字列、インライン文字列、テキスト形式の日付、未解決の生の値）
    String(String),

    /// 数値（f64）。パーセント書式の場合は100倍済み
    Number(f64),

    /// 論理値
    Bool(bool),

    /// 日付・日時（`DateMode::Timestamp`の場合のみ）
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// 空文字列かどうかを判定
    ///
    /// 空文字列に解決されたセルは行のセルマップに含まれません。
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::String(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// ワークシートから読み込んだ1行
///
/// セルは列ラベル（`A`, `AB`など）をキーとし、ドキュメント内の出現順を保持します。
/// 値を持たない行は空のセルマップとして返されます（「行がもうない」とは区別されます）。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    index: u32,
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }

    /// セルを追加する。同じ列が既に存在する場合は値を置き換える（位置は維持）
    pub(crate) fn insert(&mut self, column: String, value: CellValue) {
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    /// 行番号（1始まり、ソースで宣言された値）
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 列ラベルでセルを取得
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, value)| value)
    }

    /// セルを出現順に列挙
    pub fn cells(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// セル一覧を順序付きマップとしてシリアライズするためのラッパー
struct OrderedCells<'a>(&'a [(String, CellValue)]);

impl Serialize for OrderedCells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Row", 2)?;
        state.serialize_field("index", &self.index)?;
        state.serialize_field("cells", &OrderedCells(&self.cells))?;
        state.end()
    }
}

/// ワークシートの情報
///
/// ワークブックを開いた時点で作成され、以降は変更されません。
/// 並び順は`xl/workbook.xml`での出現順です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetDescriptor {
    pub(crate) sheet_id: String,
    pub(crate) part_path: String,
    pub(crate) name: String,
    pub(crate) state: SheetState,
}

impl WorksheetDescriptor {
    /// `sheetId`属性の値
    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    /// アーカイブ内のパーツのパス（例: `xl/worksheets/sheet1.xml`）
    pub fn part_path(&self) -> &str {
        &self.part_path
    }

    /// シート名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 表示状態
    pub fn state(&self) -> SheetState {
        self.state
    }
}

/// セルの`t`属性で宣言された型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellType {
    /// `t`属性なし
    Undeclared,
    /// `s`: 共有文字列テーブルのインデックス
    SharedString,
    /// `b`: 論理値
    Boolean,
    /// `n`: 数値
    Numeric,
    /// `inlineStr`: `<is>`要素内のインライン文字列
    InlineString,
    /// その他（`str`, `e`, `d`など）。値はそのまま返す
    Other,
}

impl CellType {
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            None => CellType::Undeclared,
            Some("s") => CellType::SharedString,
            Some("b") => CellType::Boolean,
            Some("n") => CellType::Numeric,
            Some("inlineStr") => CellType::InlineString,
            Some(_) => CellType::Other,
        }
    }
}

/// 解析中のセル（`<c>`要素の内側にいる間だけ存在する）
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawCell {
    pub column: String,
    pub cell_type: CellType,
    pub style: Option<u32>,
    pub text: String,
}

impl RawCell {
    pub fn new(column: String, cell_type: CellType, style: Option<u32>) -> Self {
        Self {
            column,
            cell_type,
            style,
            text: String::new(),
        }
    }
}

/// セル参照から列ラベルを取り出す（`AB12` -> `AB`）
///
/// 末尾の数字だけを取り除きます。
pub(crate) fn column_label(cell_ref: &str) -> &str {
    cell_ref.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// 列ラベルを列インデックスに変換（`A` -> 0, `Z` -> 25, `AA` -> 26）
pub(crate) fn column_index(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }

    let mut index: u32 = 0;
    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// 列インデックスを列ラベルに変換（0 -> `A`, 25 -> `Z`, 26 -> `AA`）
pub(crate) fn column_letters(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}
