//! Reader Module
//!
//! ドキュメントのハンドル`XlsxStreamReader`を提供するモジュール。
//!
//! ドキュメントを開いた時点でワークブックを解決し、その後はワークシートを1つずつ開いて
//! 行を順に読み込みます。同時に開けるワークシートは1つだけで、別のワークシートを開くと
//! 前のワークシートのパーツとトークナイザーは先に解放されます。

use std::fs::File;
use std::io::{Read, Seek};
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::archive::{PackageArchive, PartStream};
use crate::builder::{ReaderBuilder, ReaderConfig};
use crate::error::XlsxStreamError;
use crate::parser::{resolve_workbook, WorkbookMetadata, WorksheetStream};
use crate::resolver::CellResolver;
use crate::types::{Row, WorksheetDescriptor};

/// 開いているワークシート
struct ActiveWorksheet<R> {
    index: usize,
    stream: WorksheetStream<PartStream<R>>,
}

/// XLSXファイルのストリーミングリーダー
///
/// ワークブック全体をメモリに展開せず、ワークシートの行を要求に応じて1行ずつ返します。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxstream::XlsxStreamReader;
///
/// # fn main() -> Result<(), xlsxstream::XlsxStreamError> {
/// let mut reader = XlsxStreamReader::open("book.xlsx")?;
///
/// for (index, sheet) in reader.worksheets().to_vec().iter().enumerate() {
///     println!("sheet {}: {}", index, sheet.name());
/// }
///
/// reader.open_worksheet(0)?;
/// while let Some(row) = reader.read_row()? {
///     for (column, value) in row.cells() {
///         println!("{}{} = {}", column, row.index(), value);
///     }
/// }
///
/// reader.close();
/// # Ok(())
/// # }
/// ```
pub struct XlsxStreamReader<R: Read + Seek = File> {
    config: ReaderConfig,
    /// `None`の場合はドキュメントが閉じられている
    archive: Option<PackageArchive<R>>,
    metadata: Arc<WorkbookMetadata>,
    worksheet: Option<ActiveWorksheet<R>>,
}

impl XlsxStreamReader<File> {
    /// デフォルト設定でファイルを開く
    ///
    /// # 引数
    ///
    /// * `path` - XLSXファイルのパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxStreamReader)` - ワークブックの解決に成功した場合
    /// * `Err(XlsxStreamError)` - ファイルを開けない、またはパッケージが不正な場合
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XlsxStreamError> {
        ReaderBuilder::new().open(path)
    }
}

impl<R: Read + Seek> XlsxStreamReader<R> {
    /// デフォルト設定で任意のリーダーから開く
    pub fn from_reader(reader: R) -> Result<Self, XlsxStreamError> {
        ReaderBuilder::new().from_reader(reader)
    }

    pub(crate) fn with_config(reader: R, config: ReaderConfig) -> Result<Self, XlsxStreamError> {
        let mut archive = PackageArchive::new(reader, &config.security)?;
        let metadata = resolve_workbook(&mut archive, config.block_size)?;

        Ok(Self {
            config,
            archive: Some(archive),
            metadata: Arc::new(metadata),
            worksheet: None,
        })
    }

    /// ワークシート一覧（`workbook.xml`での出現順）
    pub fn worksheets(&self) -> &[WorksheetDescriptor] {
        self.metadata.worksheets()
    }

    /// 1904年エポックを使用するかどうか
    pub fn is_1904(&self) -> bool {
        self.metadata.is_1904()
    }

    /// 読み取り専用のメタデータ
    ///
    /// ワークシートの行ストリームとは独立しており、他のスレッドと共有できます。
    pub fn metadata(&self) -> Arc<WorkbookMetadata> {
        Arc::clone(&self.metadata)
    }

    /// ドキュメントが閉じられているかどうか
    pub fn is_closed(&self) -> bool {
        self.archive.is_none()
    }

    /// 現在開いているワークシートのインデックス
    pub fn active_worksheet(&self) -> Option<usize> {
        self.worksheet.as_ref().map(|w| w.index)
    }

    /// 名前でワークシートを探す
    ///
    /// 前後の空白を除き、大文字小文字を区別せずに比較します。
    ///
    /// # 戻り値
    ///
    /// * `Some(usize)` - 最初に一致したワークシートのインデックス
    /// * `None` - 見つからない場合、またはドキュメントが閉じられている場合
    pub fn find_worksheet_by_name(&self, name: &str) -> Option<usize> {
        if self.is_closed() {
            return None;
        }

        let wanted = name.trim().to_lowercase();
        self.metadata
            .worksheets()
            .iter()
            .position(|sheet| sheet.name().trim().to_lowercase() == wanted)
    }

    /// ワークシートを開く
    ///
    /// 範囲外のインデックスはエラーにせず`Ok(false)`を返します（開いているワークシートはそのまま）。
    /// それ以外の場合は、開いているワークシートを先に閉じてから新しいワークシートを開きます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(true)` - ワークシートを開いた場合
    /// * `Ok(false)` - インデックスが範囲外、またはパーツを開けなかった場合
    /// * `Err(XlsxStreamError::DocumentClosed)` - ドキュメントが閉じられている場合
    pub fn open_worksheet(&mut self, index: usize) -> Result<bool, XlsxStreamError> {
        if self.is_closed() {
            return Err(XlsxStreamError::DocumentClosed);
        }

        let descriptor = match self.metadata.worksheets().get(index) {
            Some(descriptor) => descriptor.clone(),
            None => return Ok(false),
        };

        self.release_worksheet();

        let archive = self.archive.as_mut().ok_or(XlsxStreamError::DocumentClosed)?;
        let part = match archive.open_part(descriptor.part_path()) {
            Ok(Some(part)) => part,
            Ok(None) => {
                warn!(
                    "worksheet '{}' refers to missing part {}",
                    descriptor.name(),
                    descriptor.part_path()
                );
                return Ok(false);
            }
            Err(e) => {
                warn!("cannot open worksheet '{}': {}", descriptor.name(), e);
                return Ok(false);
            }
        };

        let resolver = CellResolver::new(Arc::clone(&self.metadata), self.config.date_mode);
        let stream = WorksheetStream::new(
            descriptor.part_path(),
            part,
            resolver,
            self.config.block_size,
        );

        debug!("opened worksheet {} '{}'", index, descriptor.name());
        self.worksheet = Some(ActiveWorksheet { index, stream });
        Ok(true)
    }

    /// 開いているワークシートから次の行を読み込む
    ///
    /// 値を持たない行は空の`Row`として返され、`None`（これ以上行がない）とは区別されます。
    /// 読み込みエラーまたはXMLエラーが発生した場合はワークシートが閉じられ、
    /// 以降の呼び出しは`NoWorksheetOpen`になります。
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(Row))` - 次の行
    /// * `Ok(None)` - これ以上行がない場合
    /// * `Err(XlsxStreamError::DocumentClosed)` - ドキュメントが閉じられている場合
    /// * `Err(XlsxStreamError::NoWorksheetOpen)` - ワークシートが開かれていない場合
    /// * `Err(XlsxStreamError::CannotReadPackedEntry)` / `Err(XlsxStreamError::InvalidXml)` -
    ///   パーツの読み込みまたは解析に失敗した場合
    pub fn read_row(&mut self) -> Result<Option<Row>, XlsxStreamError> {
        if self.is_closed() {
            return Err(XlsxStreamError::DocumentClosed);
        }

        let active = self
            .worksheet
            .as_mut()
            .ok_or(XlsxStreamError::NoWorksheetOpen)?;

        match active.stream.next_row() {
            Ok(row) => Ok(row),
            Err(e) => {
                warn!("worksheet {} failed and was closed: {}", active.index, e);
                self.release_worksheet();
                Err(e)
            }
        }
    }

    /// 開いているワークシートの残りの行を返すイテレーター
    ///
    /// エラーを返した後は`None`を返し続けます。
    pub fn rows(&mut self) -> Rows<'_, R> {
        Rows {
            reader: self,
            done: false,
        }
    }

    /// ドキュメントを閉じる
    ///
    /// 開いているワークシートを解放してからアーカイブを解放します。
    /// 何度呼び出しても安全で、`Drop`でも呼び出されます。
    pub fn close(&mut self) {
        self.release_worksheet();
        if self.archive.take().is_some() {
            debug!("closed document");
        }
    }

    fn release_worksheet(&mut self) {
        if let Some(active) = self.worksheet.take() {
            debug!(
                "closing worksheet {} (finished: {})",
                active.index,
                active.stream.is_finished()
            );
            let part = active.stream.into_inner();
            if let Some(archive) = self.archive.as_mut() {
                archive.close_part(part);
            }
        }
    }
}

impl<R: Read + Seek> Drop for XlsxStreamReader<R> {
    fn drop(&mut self) {
        self.close();
    }
}

/// `XlsxStreamReader::rows()`が返すイテレーター
pub struct Rows<'a, R: Read + Seek> {
    reader: &'a mut XlsxStreamReader<R>,
    done: bool,
}

impl<R: Read + Seek> Iterator for Rows<'_, R> {
    type Item = Result<Row, XlsxStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> FusedIterator for Rows<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;
    use std::io::{Cursor, Write};
    use zip::write::{FileOptions, ZipWriter};

    fn package(sheets: &[(&str, &str)]) -> Vec<u8> {
        let mut rels = String::new();
        let mut entries = String::new();
        for (i, (name, _)) in sheets.iter().enumerate() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{0}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{0}.xml"/>"#,
                i + 1
            ));
            entries.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                name,
                i + 1,
                i + 1
            ));
        }

        let mut zip_data = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
            let options = FileOptions::default();
            zip.start_file("_rels/.rels", options).unwrap();
            zip.write_all(br#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#).unwrap();
            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(format!("<Relationships>{}</Relationships>", rels).as_bytes())
                .unwrap();
            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(
                format!(
                    r#"<workbook xmlns:r="urn:r"><sheets>{}</sheets></workbook>"#,
                    entries
                )
                .as_bytes(),
            )
            .unwrap();
            for (i, (_, content)) in sheets.iter().enumerate() {
                zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        zip_data
    }

    fn sheet_with_values(values: &[&str]) -> String {
        let rows: String = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!(r#"<row r="{0}"><c r="A{0}" t="inlineStr"><is><t>{1}</t></is></c></row>"#, i + 1, v))
            .collect();
        format!("<worksheet><sheetData>{}</sheetData></worksheet>", rows)
    }

    fn value(row: &Row) -> &str {
        row.get("A").and_then(CellValue::as_str).unwrap_or_default()
    }

    #[test]
    fn test_switching_worksheets_releases_previous() {
        let data = package(&[
            ("First", sheet_with_values(&["a1", "a2", "a3"]).as_str()),
            ("Second", sheet_with_values(&["b1", "b2"]).as_str()),
        ]);
        let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

        assert!(reader.open_worksheet(0).unwrap());
        assert_eq!(value(&reader.read_row().unwrap().unwrap()), "a1");

        assert!(reader.open_worksheet(1).unwrap());
        assert_eq!(reader.active_worksheet(), Some(1));
        let values: Vec<String> = reader
            .rows()
            .map(|r| value(&r.unwrap()).to_string())
            .collect();
        assert_eq!(values, vec!["b1", "b2"]);

        // 再度開くと先頭から読み直す
        assert!(reader.open_worksheet(0).unwrap());
        assert_eq!(value(&reader.read_row().unwrap().unwrap()), "a1");
    }

    #[test]
    fn test_out_of_range_keeps_current_worksheet() {
        let data = package(&[("Only", sheet_with_values(&["x", "y"]).as_str())]);
        let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

        assert!(reader.open_worksheet(0).unwrap());
        assert_eq!(value(&reader.read_row().unwrap().unwrap()), "x");
        assert!(!reader.open_worksheet(5).unwrap());
        assert_eq!(value(&reader.read_row().unwrap().unwrap()), "y");
        assert!(reader.read_row().unwrap().is_none());
    }

    #[test]
    fn test_preconditions() {
        let data = package(&[("Only", sheet_with_values(&["x"]).as_str())]);
        let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

        assert!(matches!(
            reader.read_row(),
            Err(XlsxStreamError::NoWorksheetOpen)
        ));

        reader.open_worksheet(0).unwrap();
        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(matches!(reader.read_row(), Err(XlsxStreamError::DocumentClosed)));
        assert!(matches!(
            reader.open_worksheet(0),
            Err(XlsxStreamError::DocumentClosed)
        ));
        assert_eq!(reader.find_worksheet_by_name("Only"), None);
    }

    #[test]
    fn test_stream_error_closes_worksheet() {
        let broken = "<worksheet><sheetData><row r=\"1\"><c r=\"A1\"><v>1</v></x></row></sheetData></worksheet>";
        let data = package(&[("Broken", broken), ("Fine", sheet_with_values(&["ok"]).as_str())]);
        let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

        reader.open_worksheet(0).unwrap();
        assert!(matches!(
            reader.read_row(),
            Err(XlsxStreamError::InvalidXml { .. })
        ));
        assert!(matches!(
            reader.read_row(),
            Err(XlsxStreamError::NoWorksheetOpen)
        ));

        // アーカイブは引き続き使用できる
        assert!(reader.open_worksheet(1).unwrap());
        assert_eq!(value(&reader.read_row().unwrap().unwrap()), "ok");
    }

    #[test]
    fn test_find_worksheet_by_name() {
        let data = package(&[
            ("Summary", sheet_with_values(&[]).as_str()),
            ("Raw Data", sheet_with_values(&[]).as_str()),
        ]);
        let reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(reader.find_worksheet_by_name("summary"), Some(0));
        assert_eq!(reader.find_worksheet_by_name("  RAW DATA "), Some(1));
        assert_eq!(reader.find_worksheet_by_name("Missing"), None);
    }
}
