//! Worksheet Row Stream Module
//!
//! ワークシートのXMLイベントを状態機械で処理し、呼び出し側が要求したときだけ
//! 1行ずつ組み立てて返すモジュール。
//!
//! 状態遷移: `Idle -> InRow -> (InCell -> InValue -> InCell)* -> InRow -> Idle`、
//! `</sheetData>`で`Ended`（終端）になります。

use std::collections::BTreeMap;
use std::io::Read;

use log::trace;

use crate::error::XlsxStreamError;
use crate::resolver::CellResolver;
use crate::types::{column_index, column_label, column_letters, CellType, RawCell, Row};

use super::events::{PartHandler, PartTokenizer, StartTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// 行の外側
    Idle,
    /// `<row>`の内側
    InRow,
    /// `<c>`の内側
    InCell,
    /// 値要素（`<v>`、インライン文字列の`<t>`）の内側
    InValue,
    /// `</sheetData>`を読み終えた
    Ended,
}

/// 配信待ちの行バッファ（行番号の昇順）
///
/// 行番号が飛んでいる区間は範囲としてだけ保持し、取り出すときに空行を生成します。
#[derive(Debug, Default)]
struct RowQueue {
    rows: BTreeMap<u32, Row>,
    /// 開始行番号 -> 終了行番号（終了は含まない）
    gaps: BTreeMap<u32, u32>,
}

impl RowQueue {
    /// `[start, end)`の空行を追加
    fn push_gap(&mut self, start: u32, end: u32) {
        if start < end {
            self.gaps.insert(start, end);
        }
    }

    /// 行を追加。同じ行番号の空行や既存の行は置き換える
    fn push(&mut self, row: Row) {
        let index = row.index();

        let containing = self
            .gaps
            .range(..=index)
            .next_back()
            .filter(|&(_, &end)| index < end)
            .map(|(&start, &end)| (start, end));
        if let Some((start, end)) = containing {
            self.gaps.remove(&start);
            self.push_gap(start, index);
            self.push_gap(index + 1, end);
        }

        self.rows.insert(index, row);
    }

    /// 最も小さい行番号の行を取り出す
    fn pop(&mut self) -> Option<Row> {
        let next_gap = self.gaps.keys().next().copied();
        let next_row = self.rows.keys().next().copied();

        match (next_gap, next_row) {
            (Some(gap), row) if row.map_or(true, |row| gap < row) => {
                let end = self.gaps.remove(&gap)?;
                self.push_gap(gap + 1, end);
                Some(Row::new(gap))
            }
            _ => self.rows.pop_first().map(|(_, row)| row),
        }
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.gaps.is_empty()
    }
}

/// ワークシートのイベントから行を組み立てる状態機械
struct RowAssembler {
    resolver: CellResolver,
    state: StreamState,
    queue: RowQueue,
    row: Option<Row>,
    cell: Option<RawCell>,
    /// これまでに見た最大の行番号
    last_row: u32,
    /// `r`属性のないセルに割り当てる列インデックス
    next_column: u32,
    in_phonetic: bool,
}

impl RowAssembler {
    fn new(resolver: CellResolver) -> Self {
        Self {
            resolver,
            state: StreamState::Idle,
            queue: RowQueue::default(),
            row: None,
            cell: None,
            last_row: 0,
            next_column: 0,
            in_phonetic: false,
        }
    }

    fn start_row(&mut self, tag: &StartTag) {
        let index = tag
            .attribute("r")
            .and_then(|r| r.trim().parse::<u32>().ok())
            .filter(|&r| r > 0)
            .unwrap_or_else(|| self.last_row.saturating_add(1));

        if index > self.last_row.saturating_add(1) {
            trace!("rows {}..{} are missing, filling with empty rows", self.last_row + 1, index);
            self.queue.push_gap(self.last_row + 1, index);
        }
        self.last_row = self.last_row.max(index);

        self.row = Some(Row::new(index));
        self.next_column = 0;
        self.state = StreamState::InRow;
    }

    fn start_cell(&mut self, tag: &StartTag) {
        let column = match tag.attribute("r").map(column_label) {
            Some(label) if !label.is_empty() => label.to_ascii_uppercase(),
            _ => column_letters(self.next_column),
        };
        self.next_column = column_index(&column)
            .map_or(self.next_column.saturating_add(1), |i| i.saturating_add(1));

        let cell_type = CellType::from_attribute(tag.attribute("t"));
        let style = tag.attribute("s").and_then(|s| s.trim().parse::<u32>().ok());

        self.cell = Some(RawCell::new(column, cell_type, style));
        self.in_phonetic = false;
        self.state = StreamState::InCell;
    }

    fn finish_cell(&mut self) {
        if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
            let value = self.resolver.resolve(&cell);
            // 空文字列のセルは行に含めない
            if !value.is_empty() {
                row.insert(cell.column, value);
            }
        }
        self.state = StreamState::InRow;
    }

    fn finish_row(&mut self) {
        if let Some(row) = self.row.take() {
            self.queue.push(row);
        }
        self.state = StreamState::Idle;
    }
}

impl PartHandler for RowAssembler {
    fn start(&mut self, tag: &StartTag) -> Result<(), XlsxStreamError> {
        match self.state {
            StreamState::Ended => {}
            StreamState::Idle if tag.is("row") => self.start_row(tag),
            StreamState::InRow if tag.is("c") => self.start_cell(tag),
            StreamState::InCell if tag.is("v") => self.state = StreamState::InValue,
            StreamState::InCell if tag.is("rPh") => self.in_phonetic = true,
            StreamState::InCell if tag.is("t") => {
                let inline = self
                    .cell
                    .as_ref()
                    .map_or(false, |c| c.cell_type == CellType::InlineString);
                if inline && !self.in_phonetic {
                    self.state = StreamState::InValue;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), XlsxStreamError> {
        if self.state == StreamState::InValue {
            if let Some(cell) = self.cell.as_mut() {
                cell.text.push_str(text);
            }
        }
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), XlsxStreamError> {
        match (self.state, name) {
            (StreamState::Ended, _) => {}
            (StreamState::InValue, "v" | "t") => self.state = StreamState::InCell,
            (StreamState::InCell, "rph") => self.in_phonetic = false,
            (StreamState::InCell | StreamState::InValue, "c") => self.finish_cell(),
            (StreamState::InRow, "row") => self.finish_row(),
            (_, "sheetdata") => self.state = StreamState::Ended,
            _ => {}
        }
        Ok(())
    }
}

/// 1つのワークシートの行ストリーム
///
/// パーツのバイトストリームを所有し、`next_row()`が呼ばれたときだけ
/// 必要な分を読み込みます。
pub(crate) struct WorksheetStream<S> {
    tokenizer: PartTokenizer<S>,
    assembler: RowAssembler,
}

impl<S: Read> WorksheetStream<S> {
    /// # 引数
    ///
    /// * `part` - ワークシートのパーツ名（エラーメッセージ用）
    /// * `source` - パーツの展開済みバイトストリーム
    /// * `resolver` - セル値の解決に使うリゾルバー
    /// * `block_size` - 1回の読み込みで取得するバイト数
    pub fn new(part: &str, source: S, resolver: CellResolver, block_size: usize) -> Self {
        Self {
            tokenizer: PartTokenizer::new(part, source, block_size),
            assembler: RowAssembler::new(resolver),
        }
    }

    /// 次の行を取得
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(Row))` - 次の行（値のない行は空の行）
    /// * `Ok(None)` - これ以上行がない場合
    /// * `Err(XlsxStreamError)` - 読み込みエラーまたはXMLエラー（ストリームは以降使用不可）
    pub fn next_row(&mut self) -> Result<Option<Row>, XlsxStreamError> {
        loop {
            if let Some(row) = self.assembler.queue.pop() {
                return Ok(Some(row));
            }
            if self.assembler.state == StreamState::Ended {
                return Ok(None);
            }
            if !self.tokenizer.next_event(&mut self.assembler)? {
                self.assembler.state = StreamState::Ended;
            }
        }
    }

    /// 配信待ちの行がなく、ワークシートを最後まで読み終えたかどうか
    pub fn is_finished(&self) -> bool {
        self.assembler.state == StreamState::Ended && self.assembler.queue.is_empty()
    }

    pub fn into_inner(self) -> S {
        self.tokenizer.into_inner()
    }
}
