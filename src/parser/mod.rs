//! Parser Module
//!
//! XLSXパッケージ内の各XMLパーツを`quick-xml`のイベントとして読み込み、
//! ワークブックのメタデータとワークシートの行ストリームを構築するモジュール。
//!
//! - `relationships`: `.rels`パーツ（パーツ間の参照関係）
//! - `workbook`: ワークブックの解決（シート一覧、1904年エポック、各テーブル）
//! - `styles`: 書式カテゴリテーブル
//! - `shared_strings`: 共有文字列テーブル
//! - `worksheet`: ワークシートの行ストリーム

mod events;
mod relationships;
mod shared_strings;
mod styles;
mod workbook;
mod worksheet;

use std::io::{Read, Seek};

#[cfg(test)]
pub(crate) use shared_strings::SharedStringTable;
#[cfg(test)]
pub(crate) use styles::FormatCategoryTable;
pub use workbook::WorkbookMetadata;
pub(crate) use workbook::resolve_workbook;
pub(crate) use worksheet::WorksheetStream;

use crate::archive::PackageArchive;
use crate::error::XlsxStreamError;

use events::{PartHandler, PartTokenizer};

/// パーツを最後まで読み込み、ハンドラーにイベントを渡す
///
/// パーツはエラーの有無にかかわらず閉じられます。
///
/// # 戻り値
///
/// * `Ok(true)` - パーツを読み込んだ場合
/// * `Ok(false)` - パーツが存在しない場合
pub(crate) fn scan_part<R, H>(
    archive: &mut PackageArchive<R>,
    path: &str,
    block_size: usize,
    handler: &mut H,
) -> Result<bool, XlsxStreamError>
where
    R: Read + Seek,
    H: PartHandler,
{
    let part = match archive.open_part(path)? {
        Some(part) => part,
        None => return Ok(false),
    };

    let name = part.path().to_string();
    let mut tokenizer = PartTokenizer::new(&name, part, block_size);
    let result = tokenizer.run_to_end(handler);
    archive.close_part(tokenizer.into_inner());

    result.map(|()| true)
}
