//! Workbook Resolver Module
//!
//! パッケージ内のリレーションシップをたどってワークブックを解決し、
//! ワークシート一覧・1904年エポック・書式カテゴリテーブル・共有文字列テーブルを
//! 1つの読み取り専用メタデータにまとめるモジュール。
//!
//! 解決は次の順に行い、同時に開くパーツは常に1つだけです。
//!
//! 1. `_rels/.rels` からワークブックのパスを取得
//! 2. ワークブックの`.rels`からスタイル・共有文字列・各ワークシートのパスを取得
//! 3. ワークブック本体からシート一覧と`date1904`を取得
//! 4. スタイル（任意）、共有文字列（任意）

use std::collections::HashMap;
use std::io::{Read, Seek};

use log::debug;

use crate::api::SheetState;
use crate::archive::PackageArchive;
use crate::error::XlsxStreamError;
use crate::format::FormatCategory;
use crate::security::{resolve_part_path, split_part_path};
use crate::types::WorksheetDescriptor;

use super::events::{PartHandler, StartTag};
use super::relationships::{read_relationships, relationships_path_for, Relationship};
use super::shared_strings::{SharedStringTable, SharedStringsHandler};
use super::styles::{FormatCategoryTable, StylesHandler};
use super::scan_part;

const GLOBAL_RELATIONSHIPS_PATH: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PATH: &str = "xl/workbook.xml";

/// ワークブックのメタデータ
///
/// ドキュメントを開いた時点で構築され、以降は変更されません。
/// `XlsxStreamReader::metadata()`から`Arc`で取得でき、複数スレッドから参照できます。
#[derive(Debug, Clone, Default)]
pub struct WorkbookMetadata {
    worksheets: Vec<WorksheetDescriptor>,
    is_1904: bool,
    shared_strings: SharedStringTable,
    formats: FormatCategoryTable,
}

impl WorkbookMetadata {
    /// ワークシート一覧（`workbook.xml`での出現順）
    pub fn worksheets(&self) -> &[WorksheetDescriptor] {
        &self.worksheets
    }

    /// 1904年エポック（1904-01-01基準）を使用するかどうか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// 共有文字列を取得
    pub fn shared_string(&self, index: usize) -> Option<&str> {
        self.shared_strings.get(index)
    }

    /// 共有文字列の数
    pub fn shared_string_count(&self) -> usize {
        self.shared_strings.len()
    }

    /// スタイルインデックスの書式カテゴリ（未定義のインデックスは`General`）
    pub fn format_category(&self, style: u32) -> FormatCategory {
        self.formats.category(style)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        is_1904: bool,
        shared_strings: SharedStringTable,
        formats: FormatCategoryTable,
    ) -> Self {
        Self {
            worksheets: Vec::new(),
            is_1904,
            shared_strings,
            formats,
        }
    }
}

/// ワークブックの`.rels`から取得したパーツのパス
#[derive(Debug, Default)]
struct WorkbookParts {
    styles: String,
    shared_strings: String,
    /// リレーションシップID -> ワークシートのパス
    worksheets: HashMap<String, String>,
}

/// ワークブックを解決する
///
/// # 引数
///
/// * `archive` - パッケージのアーカイブ（パーツは1つも開いていないこと）
/// * `block_size` - 1回の読み込みで取得するバイト数
///
/// # 戻り値
///
/// * `Ok(WorkbookMetadata)` - 解決に成功した場合
/// * `Err(XlsxStreamError)` - 必須パーツの欠落、参照切れ、XMLエラーなど
pub(crate) fn resolve_workbook<R: Read + Seek>(
    archive: &mut PackageArchive<R>,
    block_size: usize,
) -> Result<WorkbookMetadata, XlsxStreamError> {
    let workbook_path = locate_workbook(archive, block_size)?;
    let parts = locate_workbook_parts(archive, &workbook_path, block_size)?;

    let mut handler = WorkbookHandler::new(&parts.worksheets);
    if !scan_part(archive, &workbook_path, block_size, &mut handler)? {
        return Err(XlsxStreamError::MissingWorkbook(workbook_path));
    }
    let is_1904 = handler.is_1904;
    let worksheets = handler.worksheets;

    let mut styles = StylesHandler::new();
    let has_styles = scan_part(archive, &parts.styles, block_size, &mut styles)?;
    let formats = styles.finish();

    let mut strings = SharedStringsHandler::new();
    let has_strings = scan_part(archive, &parts.shared_strings, block_size, &mut strings)?;
    let shared_strings = strings.finish();

    debug!(
        "resolved workbook {}: {} worksheet(s), date1904={}, styles={} ({} xf), shared strings={} ({})",
        workbook_path,
        worksheets.len(),
        is_1904,
        has_styles,
        formats.len(),
        has_strings,
        shared_strings.len()
    );

    Ok(WorkbookMetadata {
        worksheets,
        is_1904,
        shared_strings,
        formats,
    })
}

/// パス1: `_rels/.rels`からワークブックのパスを取得
fn locate_workbook<R: Read + Seek>(
    archive: &mut PackageArchive<R>,
    block_size: usize,
) -> Result<String, XlsxStreamError> {
    let relationships = read_relationships(archive, GLOBAL_RELATIONSHIPS_PATH, block_size)?
        .ok_or(XlsxStreamError::MissingGlobalRelationships)?;

    match relationships.iter().find(|r| r.is_type("officeDocument")) {
        Some(relationship) => resolve_target("", relationship),
        None => {
            debug!(
                "no officeDocument relationship, falling back to {}",
                DEFAULT_WORKBOOK_PATH
            );
            Ok(DEFAULT_WORKBOOK_PATH.to_string())
        }
    }
}

/// パス2: ワークブックの`.rels`からスタイル・共有文字列・ワークシートのパスを取得
fn locate_workbook_parts<R: Read + Seek>(
    archive: &mut PackageArchive<R>,
    workbook_path: &str,
    block_size: usize,
) -> Result<WorkbookParts, XlsxStreamError> {
    let rels_path = relationships_path_for(workbook_path);
    let relationships = read_relationships(archive, &rels_path, block_size)?
        .ok_or_else(|| XlsxStreamError::MissingWorkbookRelationships(rels_path.clone()))?;

    let (base_dir, _) = split_part_path(workbook_path);
    let mut parts = WorkbookParts {
        styles: join_dir(base_dir, "styles.xml"),
        shared_strings: join_dir(base_dir, "sharedStrings.xml"),
        worksheets: HashMap::new(),
    };

    for relationship in &relationships {
        if relationship.is_type("worksheet") {
            let path = resolve_target(base_dir, relationship)?;
            parts.worksheets.insert(relationship.id.clone(), path);
        } else if relationship.is_type("styles") {
            parts.styles = resolve_target(base_dir, relationship)?;
        } else if relationship.is_type("sharedStrings") {
            parts.shared_strings = resolve_target(base_dir, relationship)?;
        }
    }

    Ok(parts)
}

fn resolve_target(base_dir: &str, relationship: &Relationship) -> Result<String, XlsxStreamError> {
    resolve_part_path(base_dir, &relationship.target).ok_or_else(|| {
        XlsxStreamError::SecurityViolation(format!(
            "Relationship '{}' points outside the package: {}",
            relationship.id, relationship.target
        ))
    })
}

fn join_dir(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}

/// パス3: `workbook.xml`のイベントハンドラー
struct WorkbookHandler<'a> {
    worksheet_paths: &'a HashMap<String, String>,
    worksheets: Vec<WorksheetDescriptor>,
    is_1904: bool,
}

impl<'a> WorkbookHandler<'a> {
    fn new(worksheet_paths: &'a HashMap<String, String>) -> Self {
        Self {
            worksheet_paths,
            worksheets: Vec::new(),
            is_1904: false,
        }
    }
}

impl PartHandler for WorkbookHandler<'_> {
    fn start(&mut self, tag: &StartTag) -> Result<(), XlsxStreamError> {
        if tag.is("workbookPr") {
            self.is_1904 = tag
                .attribute("date1904")
                .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
        } else if tag.is("sheet") {
            let name = tag.attribute("name").unwrap_or_default();
            // r:id（名前空間プレフィックスは除去済み）
            let relationship = tag.attribute("id").unwrap_or_default();

            let part_path = self.worksheet_paths.get(relationship).ok_or_else(|| {
                XlsxStreamError::BadWorksheetRelationship {
                    sheet: name.to_string(),
                    relationship: relationship.to_string(),
                }
            })?;

            self.worksheets.push(WorksheetDescriptor {
                sheet_id: tag.attribute("sheetId").unwrap_or_default().to_string(),
                part_path: part_path.clone(),
                name: name.to_string(),
                state: tag
                    .attribute("state")
                    .map(SheetState::from_attribute)
                    .unwrap_or_default(),
            });
        }
        Ok(())
    }
}
