//! Integration Tests for xlsxstream
//!
//! Workbooks are generated in memory with rust_xlsxwriter and read back row by
//! row through the public API.

use rust_xlsxwriter::*;
use std::io::Cursor;
use xlsxstream::{
    CellValue, DateMode, FormatCategory, ReaderBuilder, Row, SheetState, XlsxStreamError,
    XlsxStreamReader,
};

// Helper module for generating test fixtures
mod fixtures {
    use super::*;

    /// Generate a simple 2x2 table Excel file
    pub fn generate_simple_table() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        // Header row
        worksheet.write_string(0, 0, "Header1")?;
        worksheet.write_string(0, 1, "Header2")?;

        // Data row
        worksheet.write_string(1, 0, "Data1")?;
        worksheet.write_string(1, 1, "Data2")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a workbook with 3 sheets, the second one hidden
    pub fn generate_multi_sheets() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let sheet1 = workbook.add_worksheet();
        sheet1.set_name("Sheet1")?;
        sheet1.write_string(0, 0, "Sheet1_Data")?;

        let sheet2 = workbook.add_worksheet();
        sheet2.set_name("Hidden Sheet")?;
        sheet2.write_string(0, 0, "Sheet2_Data")?;
        sheet2.set_hidden(true);

        let sheet3 = workbook.add_worksheet();
        sheet3.set_name("Sheet3")?;
        sheet3.write_string(0, 0, "Sheet3_Data")?;
        sheet3.write_string(1, 0, "Sheet3_More")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate numbers, booleans and formatted numbers
    pub fn generate_typed_values() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        let percent = Format::new().set_num_format("0%");
        let decimal_percent = Format::new().set_num_format("0.00%");
        let money = Format::new().set_num_format("#,##0.00");

        worksheet.write_number(0, 0, 42.0)?;
        worksheet.write_number(0, 1, -3.5)?;
        worksheet.write_boolean(0, 2, true)?;
        worksheet.write_boolean(0, 3, false)?;

        worksheet.write_number_with_format(1, 0, 0.2, &percent)?;
        worksheet.write_number_with_format(1, 1, 0.25, &decimal_percent)?;
        worksheet.write_number_with_format(1, 2, 1234.5, &money)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate date and date-time cells from serial values
    pub fn generate_dates() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        let date = Format::new().set_num_format("yyyy-mm-dd");
        let date_time = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let time = Format::new().set_num_format("[$-409]h:mm AM/PM");

        worksheet.write_number_with_format(0, 0, 45658.0, &date)?;
        worksheet.write_number_with_format(0, 1, 45658.5729166667, &date_time)?;
        worksheet.write_number_with_format(0, 2, 0.75, &time)?;
        worksheet.write_number_with_format(1, 0, 61.0, &date)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a sheet whose rows 3 and 4 are absent
    pub fn generate_sparse_rows() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_string(0, 0, "first")?;
        worksheet.write_string(1, 1, "second")?;
        worksheet.write_string(4, 2, "fifth")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a sheet with unicode, multiline and repeated strings
    pub fn generate_strings() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        worksheet.write_string(0, 0, "日本語テキスト")?;
        worksheet.write_string(0, 1, "line1\nline2")?;
        worksheet.write_string(0, 2, "<tag> & \"quotes\"")?;
        worksheet.write_string(1, 0, "日本語テキスト")?;
        worksheet.write_string(1, 27, "far column")?;

        Ok(workbook.save_to_buffer()?)
    }
}

fn read_all(reader: &mut XlsxStreamReader<Cursor<Vec<u8>>>) -> Vec<Row> {
    reader.rows().collect::<Result<Vec<_>, _>>().unwrap()
}

fn text(value: &str) -> CellValue {
    CellValue::String(value.to_string())
}

#[test]
fn test_simple_table() {
    let data = fixtures::generate_simple_table().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

    assert_eq!(reader.worksheets().len(), 1);
    assert!(reader.open_worksheet(0).unwrap());

    let first = reader.read_row().unwrap().unwrap();
    assert_eq!(first.index(), 1);
    assert_eq!(first.get("A"), Some(&text("Header1")));
    assert_eq!(first.get("B"), Some(&text("Header2")));

    let second = reader.read_row().unwrap().unwrap();
    assert_eq!(second.index(), 2);
    let cells: Vec<(&str, &CellValue)> = second.cells().collect();
    assert_eq!(cells, vec![("A", &text("Data1")), ("B", &text("Data2"))]);

    assert!(reader.read_row().unwrap().is_none());
    // 終端に達した後もNoneを返し続ける
    assert!(reader.read_row().unwrap().is_none());
}

#[test]
fn test_multi_sheets() {
    let data = fixtures::generate_multi_sheets().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

    let names: Vec<&str> = reader.worksheets().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["Sheet1", "Hidden Sheet", "Sheet3"]);
    assert_eq!(reader.worksheets()[0].state(), SheetState::Visible);
    assert_eq!(reader.worksheets()[1].state(), SheetState::Hidden);
    assert_eq!(reader.worksheets()[2].part_path(), "xl/worksheets/sheet3.xml");

    assert_eq!(reader.find_worksheet_by_name("sheet3"), Some(2));
    assert_eq!(reader.find_worksheet_by_name(" HIDDEN SHEET "), Some(1));
    assert_eq!(reader.find_worksheet_by_name("Sheet4"), None);

    let index = reader.find_worksheet_by_name("Sheet3").unwrap();
    assert!(reader.open_worksheet(index).unwrap());
    let rows = read_all(&mut reader);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("A"), Some(&text("Sheet3_More")));

    assert!(reader.open_worksheet(1).unwrap());
    let rows = read_all(&mut reader);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("A"), Some(&text("Sheet2_Data")));
}

#[test]
fn test_opening_another_sheet_does_not_leak_rows() {
    let data = fixtures::generate_multi_sheets().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

    assert!(reader.open_worksheet(2).unwrap());
    let first = reader.read_row().unwrap().unwrap();
    assert_eq!(first.get("A"), Some(&text("Sheet3_Data")));

    // 読みかけのSheet3を放棄してSheet1を開く
    assert!(reader.open_worksheet(0).unwrap());
    let rows = read_all(&mut reader);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("A"), Some(&text("Sheet1_Data")));

    for _ in 0..20 {
        assert!(reader.open_worksheet(2).unwrap());
        assert!(reader.open_worksheet(0).unwrap());
    }
    assert_eq!(read_all(&mut reader).len(), 1);
}

#[test]
fn test_typed_values() {
    let data = fixtures::generate_typed_values().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();
    reader.open_worksheet(0).unwrap();

    let rows = read_all(&mut reader);
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].get("A"), Some(&CellValue::Number(42.0)));
    assert_eq!(rows[0].get("B"), Some(&CellValue::Number(-3.5)));
    assert_eq!(rows[0].get("C"), Some(&CellValue::Bool(true)));
    assert_eq!(rows[0].get("D"), Some(&CellValue::Bool(false)));

    assert_eq!(rows[1].get("A"), Some(&CellValue::Number(20.0)));
    assert_eq!(rows[1].get("B"), Some(&CellValue::Number(25.0)));
    assert_eq!(rows[1].get("C"), Some(&CellValue::Number(1234.5)));
}

#[test]
fn test_dates_as_text() {
    let data = fixtures::generate_dates().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();
    assert!(!reader.is_1904());
    reader.open_worksheet(0).unwrap();

    let rows = read_all(&mut reader);
    assert_eq!(rows[0].get("A"), Some(&text("2025-01-01")));
    assert_eq!(rows[0].get("B"), Some(&text("2025-01-01 13:45:00")));
    assert_eq!(rows[0].get("C"), Some(&text("1899-12-31 18:00:00")));
    assert_eq!(rows[1].get("A"), Some(&text("1900-03-01")));
}

#[test]
fn test_dates_as_timestamp() {
    let data = fixtures::generate_dates().unwrap();
    let mut reader = ReaderBuilder::new()
        .with_date_mode(DateMode::Timestamp)
        .from_reader(Cursor::new(data))
        .unwrap();
    reader.open_worksheet(0).unwrap();

    let rows = read_all(&mut reader);
    let date = rows[0].get("A").and_then(CellValue::as_datetime).unwrap();
    assert_eq!(date.to_string(), "2025-01-01 00:00:00");

    let date_time = rows[0].get("B").and_then(CellValue::as_datetime).unwrap();
    assert_eq!(date_time.to_string(), "2025-01-01 13:45:00");

    let time = rows[0].get("C").and_then(CellValue::as_datetime).unwrap();
    assert_eq!(time.format("%H:%M:%S").to_string(), "18:00:00");
}

#[test]
fn test_metadata_exposes_tables() {
    let data = fixtures::generate_typed_values().unwrap();
    let reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();

    let metadata = reader.metadata();
    assert_eq!(metadata.worksheets().len(), 1);
    assert_eq!(metadata.shared_string_count(), 0);
    assert_eq!(metadata.format_category(0), FormatCategory::General);
    assert_eq!(metadata.format_category(10_000), FormatCategory::General);

    let categories: Vec<FormatCategory> = (0..4).map(|s| metadata.format_category(s)).collect();
    assert!(categories.contains(&FormatCategory::Percent));

    // メタデータは他のスレッドから参照できる
    let handle = std::thread::spawn(move || metadata.worksheets()[0].name().to_string());
    assert_eq!(handle.join().unwrap(), "Sheet1");
}

#[test]
fn test_sparse_rows_are_filled() {
    let data = fixtures::generate_sparse_rows().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();
    reader.open_worksheet(0).unwrap();

    let rows = read_all(&mut reader);
    let shape: Vec<(u32, usize)> = rows.iter().map(|r| (r.index(), r.len())).collect();
    assert_eq!(shape, vec![(1, 1), (2, 1), (3, 0), (4, 0), (5, 1)]);
    assert_eq!(rows[1].get("B"), Some(&text("second")));
    assert_eq!(rows[4].get("C"), Some(&text("fifth")));
}

#[test]
fn test_strings() {
    let data = fixtures::generate_strings().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();
    reader.open_worksheet(0).unwrap();

    let rows = read_all(&mut reader);
    assert_eq!(rows[0].get("A"), Some(&text("日本語テキスト")));
    assert_eq!(rows[0].get("B"), Some(&text("line1\nline2")));
    assert_eq!(rows[0].get("C"), Some(&text("<tag> & \"quotes\"")));
    assert_eq!(rows[1].get("A"), Some(&text("日本語テキスト")));
    assert_eq!(rows[1].get("AB"), Some(&text("far column")));
}

#[test]
fn test_small_block_size_gives_same_rows() {
    let data = fixtures::generate_strings().unwrap();

    let mut default_reader = XlsxStreamReader::from_reader(Cursor::new(data.clone())).unwrap();
    default_reader.open_worksheet(0).unwrap();
    let expected = read_all(&mut default_reader);

    let mut tiny_reader = ReaderBuilder::new()
        .with_block_size(1)
        .from_reader(Cursor::new(data))
        .unwrap();
    tiny_reader.open_worksheet(0).unwrap();
    assert_eq!(read_all(&mut tiny_reader), expected);
}

#[test]
fn test_open_from_path() {
    let data = fixtures::generate_simple_table().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simple.xlsx");
    std::fs::write(&path, data).unwrap();

    let mut reader = XlsxStreamReader::open(&path).unwrap();
    reader.open_worksheet(0).unwrap();
    let mut count = 0;
    while let Some(row) = reader.read_row().unwrap() {
        assert_eq!(row.len(), 2);
        count += 1;
    }
    assert_eq!(count, 2);
    reader.close();
}

#[test]
fn test_open_missing_path() {
    let result = XlsxStreamReader::open("nonexistent.xlsx");
    assert!(matches!(result, Err(XlsxStreamError::Io(_))));
}

#[test]
fn test_row_serializes_to_json() {
    let data = fixtures::generate_typed_values().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();
    reader.open_worksheet(0).unwrap();

    let row = reader.read_row().unwrap().unwrap();
    let json = serde_json::to_string(&row).unwrap();
    assert_eq!(
        json,
        r#"{"index":1,"cells":{"A":42.0,"B":-3.5,"C":true,"D":false}}"#
    );

    let sheets = serde_json::to_value(reader.worksheets()).unwrap();
    assert_eq!(sheets[0]["name"], "Sheet1");
    assert_eq!(sheets[0]["state"], "visible");
}

#[test]
fn test_close_then_use() {
    let data = fixtures::generate_simple_table().unwrap();
    let mut reader = XlsxStreamReader::from_reader(Cursor::new(data)).unwrap();
    reader.open_worksheet(0).unwrap();
    reader.read_row().unwrap();

    reader.close();
    reader.close();

    assert!(matches!(
        reader.read_row(),
        Err(XlsxStreamError::DocumentClosed)
    ));
    assert!(matches!(
        reader.open_worksheet(0),
        Err(XlsxStreamError::DocumentClosed)
    ));
}
