//! Package Archive Module
//!
//! XLSXパッケージ（ZIPアーカイブ）内のパーツをストリームとして開くモジュール。
//!
//! 中央ディレクトリは`zip`クレートで一度だけ読み込み、各エントリの位置を索引化します。
//! 以降のパーツの読み込みは、元のリーダーを`PartStream`に移動して行うため、
//! 同時に開けるパーツは常に1つだけです。`close_part()`でリーダーが戻ります。

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Take};

use crc32fast::Hasher;
use flate2::read::DeflateDecoder;
use zip::{CompressionMethod, ZipArchive};

use crate::error::XlsxStreamError;
use crate::security::{validate_zip_path, SecurityConfig};

/// エントリの格納位置
#[derive(Debug, Clone, Copy)]
struct EntryLocation {
    data_start: u64,
    compressed_size: u64,
    size: u64,
    crc32: u32,
    method: CompressionMethod,
}

/// 索引化済みのパッケージアーカイブ
pub(crate) struct PackageArchive<R> {
    /// パーツが開かれている間は`None`
    reader: Option<R>,
    entries: HashMap<String, EntryLocation>,
}

impl<R: Read + Seek> PackageArchive<R> {
    /// アーカイブを開き、エントリを索引化する
    ///
    /// # 戻り値
    ///
    /// * `Ok(PackageArchive)` - 索引化に成功した場合
    /// * `Err(XlsxStreamError::NotAZipContainer)` - ZIPとして読めない場合
    /// * `Err(XlsxStreamError::SecurityViolation)` - セキュリティ制限に違反した場合
    pub fn new(reader: R, security: &SecurityConfig) -> Result<Self, XlsxStreamError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| XlsxStreamError::NotAZipContainer(e.to_string()))?;

        // セキュリティチェック: エントリ数の上限
        if archive.len() > security.max_part_count {
            return Err(XlsxStreamError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security.max_part_count
            )));
        }

        let mut entries = HashMap::with_capacity(archive.len());
        let mut total_size = 0u64;

        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| XlsxStreamError::NotAZipContainer(e.to_string()))?;

            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            validate_zip_path(&name).map_err(|e| {
                XlsxStreamError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            if file.size() > security.max_part_size {
                return Err(XlsxStreamError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    name,
                    file.size(),
                    security.max_part_size
                )));
            }

            total_size = total_size.checked_add(file.size()).ok_or_else(|| {
                XlsxStreamError::SecurityViolation(
                    "Total decompressed size calculation overflow".to_string(),
                )
            })?;
            if total_size > security.max_total_size {
                return Err(XlsxStreamError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_size, security.max_total_size
                )));
            }

            entries.insert(
                name,
                EntryLocation {
                    data_start: file.data_start(),
                    compressed_size: file.compressed_size(),
                    size: file.size(),
                    crc32: file.crc32(),
                    method: file.compression(),
                },
            );
        }

        log::debug!("indexed {} archive entries", entries.len());

        Ok(Self {
            reader: Some(archive.into_inner()),
            entries,
        })
    }

    /// パーツが存在するかどうか
    #[cfg(test)]
    pub fn contains(&self, path: &str) -> bool {
        self.locate(path).is_some()
    }

    /// パス名でエントリを検索する（完全一致を優先し、次に大文字小文字を無視して一致）
    fn locate(&self, path: &str) -> Option<(&str, EntryLocation)> {
        let path = path.strip_prefix('/').unwrap_or(path);

        if let Some((name, location)) = self.entries.get_key_value(path) {
            return Some((name.as_str(), *location));
        }

        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(path))
            .map(|(name, location)| (name.as_str(), *location))
    }

    /// パーツを開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(PartStream))` - パーツを開けた場合
    /// * `Ok(None)` - パーツが存在しない場合
    /// * `Err(XlsxStreamError::CannotReadPackedEntry)` - 別のパーツが開いている、
    ///   シークに失敗した、または圧縮方式に対応していない場合
    pub fn open_part(&mut self, path: &str) -> Result<Option<PartStream<R>>, XlsxStreamError> {
        let (name, location) = match self.locate(path) {
            Some((name, location)) => (name.to_string(), location),
            None => return Ok(None),
        };

        let mut reader = self.reader.take().ok_or_else(|| XlsxStreamError::CannotReadPackedEntry {
            part: name.clone(),
            source: io::Error::new(
                io::ErrorKind::Other,
                "another part of the archive is still open",
            ),
        })?;

        if let Err(source) = reader.seek(SeekFrom::Start(location.data_start)) {
            self.reader = Some(reader);
            return Err(XlsxStreamError::CannotReadPackedEntry { part: name, source });
        }

        let limited = reader.take(location.compressed_size);
        let body = match location.method {
            CompressionMethod::Stored => PartBody::Stored(limited),
            CompressionMethod::Deflated => PartBody::Deflated(DeflateDecoder::new(limited)),
            other => {
                self.reader = Some(limited.into_inner());
                return Err(XlsxStreamError::CannotReadPackedEntry {
                    part: name,
                    source: io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!("unsupported compression method {:?}", other),
                    ),
                });
            }
        };

        Ok(Some(PartStream {
            path: name,
            body,
            expected: location.size,
            produced: 0,
            expected_crc: location.crc32,
            hasher: Hasher::new(),
            verified: false,
        }))
    }

    /// パーツを閉じ、リーダーをアーカイブに戻す
    pub fn close_part(&mut self, part: PartStream<R>) {
        self.reader = Some(part.into_inner());
    }
}

enum PartBody<R> {
    Stored(Take<R>),
    Deflated(DeflateDecoder<Take<R>>),
}

/// 開かれたパーツの展開済みバイトストリーム
///
/// 中央ディレクトリに記録された展開後サイズと実際のバイト数、またはCRC-32が
/// 一致しない場合はI/Oエラーになります。CRC-32は終端まで読み込んだ時点で検証します。
pub(crate) struct PartStream<R> {
    path: String,
    body: PartBody<R>,
    expected: u64,
    produced: u64,
    expected_crc: u32,
    hasher: Hasher,
    verified: bool,
}

impl<R> PartStream<R> {
    /// アーカイブ内でのエントリ名
    pub fn path(&self) -> &str {
        &self.path
    }

    fn into_inner(self) -> R {
        match self.body {
            PartBody::Stored(limited) => limited.into_inner(),
            PartBody::Deflated(decoder) => decoder.into_inner().into_inner(),
        }
    }
}

impl<R: Read> Read for PartStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.body {
            PartBody::Stored(limited) => limited.read(buf)?,
            PartBody::Deflated(decoder) => decoder.read(buf)?,
        };

        if n == 0 && !buf.is_empty() && self.produced < self.expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "packed data ended after {} of {} bytes",
                    self.produced, self.expected
                ),
            ));
        }

        self.produced += n as u64;
        if self.produced > self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("packed data is larger than the recorded {} bytes", self.expected),
            ));
        }

        if n > 0 {
            self.hasher.update(&buf[..n]);
        } else if !buf.is_empty() && !self.verified {
            self.verified = true;
            let actual = self.hasher.clone().finalize();
            if actual != self.expected_crc {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "CRC-32 mismatch in {}: expected {:08x}, got {:08x}",
                        self.path, self.expected_crc, actual
                    ),
                ));
            }
        }

        Ok(n)
    }
}
