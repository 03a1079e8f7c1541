//! xlsxstream - Streaming row reader for XLSX workbooks
//!
//! This crate reads Excel workbooks (XLSX) row by row without materializing the
//! whole workbook in memory. When a document is opened, the package's
//! relationship graph is resolved once (workbook, styles, shared strings and
//! worksheet parts). Worksheet XML is then decoded incrementally, one chunk at
//! a time, only when the caller asks for the next row.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxstream::XlsxStreamReader;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut reader = XlsxStreamReader::open("example.xlsx")?;
//!
//!     let index = reader.find_worksheet_by_name("Sheet1").unwrap_or(0);
//!     reader.open_worksheet(index)?;
//!
//!     // An empty row is `Some(row)` with no cells; `None` means no more rows
//!     while let Some(row) = reader.read_row()? {
//!         for (column, value) in row.cells() {
//!             println!("{}{}: {}", column, row.index(), value);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use std::io::Cursor;
//! use xlsxstream::{CellValue, DateMode, ReaderBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data: Vec<u8> = std::fs::read("example.xlsx")?;
//!
//!     let mut reader = ReaderBuilder::new()
//!         .with_date_mode(DateMode::Timestamp) // dates as chrono::NaiveDateTime
//!         .with_block_size(8 * 1024)
//!         .from_reader(Cursor::new(data))?;
//!
//!     reader.open_worksheet(0)?;
//!     for row in reader.rows() {
//!         let row = row?;
//!         if let Some(CellValue::DateTime(when)) = row.get("A") {
//!             println!("row {} at {}", row.index(), when);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod api;
mod archive;
mod builder;
mod error;
mod format;
mod parser;
mod reader;
mod resolver;
mod security;
mod types;

// 公開API
pub use api::{DateMode, SheetState};
pub use builder::ReaderBuilder;
pub use error::XlsxStreamError;
pub use format::FormatCategory;
pub use parser::WorkbookMetadata;
pub use reader::{Rows, XlsxStreamReader};
pub use types::{CellValue, Row, WorksheetDescriptor};
