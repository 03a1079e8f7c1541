//! Relationships Parser Module
//!
//! `.rels`パーツ（パーツ間の参照関係）を読み込むモジュール。

use std::io::{Read, Seek};

use crate::archive::PackageArchive;
use crate::error::XlsxStreamError;

use super::events::{PartHandler, StartTag};
use super::scan_part;

/// リレーションシップ1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"`の場合は`true`
    pub external: bool,
}

impl Relationship {
    /// リレーションシップタイプの末尾の名前（例: `officeDocument`, `worksheet`）
    ///
    /// Transitional（`schemas.openxmlformats.org`）とStrict（`purl.oclc.org`）の
    /// どちらの名前空間でも同じ名前になります。
    pub fn type_name(&self) -> &str {
        match self.rel_type.rfind('/') {
            Some(pos) => &self.rel_type[pos + 1..],
            None => &self.rel_type,
        }
    }

    /// タイプ名が一致するか（大文字小文字を区別しない）
    pub fn is_type(&self, name: &str) -> bool {
        !self.external && self.type_name().eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Default)]
struct RelationshipsHandler {
    relationships: Vec<Relationship>,
}

impl PartHandler for RelationshipsHandler {
    fn start(&mut self, tag: &StartTag) -> Result<(), XlsxStreamError> {
        if !tag.is("Relationship") {
            return Ok(());
        }

        let (id, target) = match (tag.attribute("Id"), tag.attribute("Target")) {
            (Some(id), Some(target)) => (id, target),
            _ => return Ok(()),
        };

        self.relationships.push(Relationship {
            id: id.to_string(),
            rel_type: tag.attribute("Type").unwrap_or_default().to_string(),
            target: target.to_string(),
            external: tag
                .attribute("TargetMode")
                .map_or(false, |mode| mode.eq_ignore_ascii_case("External")),
        });
        Ok(())
    }
}

/// `.rels`パーツを読み込む
///
/// # 戻り値
///
/// * `Ok(Some(Vec<Relationship>))` - 文書順のリレーションシップ一覧
/// * `Ok(None)` - パーツが存在しない場合
pub(crate) fn read_relationships<R: Read + Seek>(
    archive: &mut PackageArchive<R>,
    path: &str,
    block_size: usize,
) -> Result<Option<Vec<Relationship>>, XlsxStreamError> {
    let mut handler = RelationshipsHandler::default();
    if scan_part(archive, path, block_size, &mut handler)? {
        Ok(Some(handler.relationships))
    } else {
        Ok(None)
    }
}

/// パーツに対応する`.rels`パーツのパス（`xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`）
pub(crate) fn relationships_path_for(part_path: &str) -> String {
    let (dir, file) = crate::security::split_part_path(part_path);
    if dir.is_empty() {
        format!("_rels/{}.rels", file)
    } else {
        format!("{}/_rels/{}.rels", dir, file)
    }
}
