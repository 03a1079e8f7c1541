//! Builder Module
//!
//! Fluent Builder APIを提供し、`XlsxStreamReader`インスタンスを段階的に構築する。

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::api::DateMode;
use crate::error::XlsxStreamError;
use crate::reader::XlsxStreamReader;
use crate::security::SecurityConfig;

/// 1回の読み込みで取得するバイト数のデフォルト値
pub(crate) const DEFAULT_BLOCK_SIZE: usize = 65_536;

/// 読み込み処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ReaderConfig {
    /// 日付・時刻セルの出力モード
    pub date_mode: DateMode,

    /// パーツから1回に読み込むバイト数
    pub block_size: usize,

    /// アーカイブの制限
    pub security: SecurityConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            date_mode: DateMode::Text,
            block_size: DEFAULT_BLOCK_SIZE,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxstream::{DateMode, ReaderBuilder};
///
/// # fn main() -> Result<(), xlsxstream::XlsxStreamError> {
/// let mut reader = ReaderBuilder::new()
///     .with_date_mode(DateMode::Timestamp)
///     .with_block_size(16 * 1024)
///     .open("report.xlsx")?;
///
/// if let Some(index) = reader.find_worksheet_by_name("Sales") {
///     reader.open_worksheet(index)?;
///     while let Some(row) = reader.read_row()? {
///         println!("{}: {} cell(s)", row.index(), row.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReaderBuilder {
    /// 内部設定（構築中）
    config: ReaderConfig,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 日付モード: テキスト（`YYYY-MM-DD` / `YYYY-MM-DD HH:MM:SS`）
    /// - 読み込み単位: 64KiB
    /// - エントリ数上限: 10000
    /// - 単一パーツの上限: 2GiB
    /// - 合計サイズの上限: 16GiB
    pub fn new() -> Self {
        Self {
            config: ReaderConfig::default(),
        }
    }

    /// 日付・時刻セルの出力モードを指定する
    ///
    /// # 引数
    ///
    /// * `mode: DateMode`: テキストまたは`chrono::NaiveDateTime`
    pub fn with_date_mode(mut self, mode: DateMode) -> Self {
        self.config.date_mode = mode;
        self
    }

    /// パーツから1回に読み込むバイト数を指定する
    ///
    /// 0は`build`時にエラーになります。
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// アーカイブ内の最大エントリ数を指定する
    pub fn with_max_part_count(mut self, count: usize) -> Self {
        self.config.security.max_part_count = count;
        self
    }

    /// 単一パーツの展開後の最大サイズ（バイト）を指定する
    pub fn with_max_part_size(mut self, size: u64) -> Self {
        self.config.security.max_part_size = size;
        self
    }

    /// 全パーツの展開後の合計最大サイズ（バイト）を指定する
    pub fn with_max_total_size(mut self, size: u64) -> Self {
        self.config.security.max_total_size = size;
        self
    }

    /// ファイルを開いてワークブックを解決する
    ///
    /// # 引数
    ///
    /// * `path` - XLSXファイルのパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxStreamReader<File>)` - 読み込み準備ができたリーダー
    /// * `Err(XlsxStreamError)` - 設定が不正、ファイルを開けない、またはパッケージが不正な場合
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<XlsxStreamReader<File>, XlsxStreamError> {
        let config = self.validate()?;
        let file = File::open(path)?;
        XlsxStreamReader::with_config(file, config)
    }

    /// 任意のリーダーからワークブックを解決する
    ///
    /// # 引数
    ///
    /// * `reader` - XLSXデータを読み込むためのリーダー（Read + Seekトレイトを実装）
    pub fn from_reader<R: Read + Seek>(
        self,
        reader: R,
    ) -> Result<XlsxStreamReader<R>, XlsxStreamError> {
        let config = self.validate()?;
        XlsxStreamReader::with_config(reader, config)
    }

    /// 設定を検証する
    fn validate(self) -> Result<ReaderConfig, XlsxStreamError> {
        if self.config.block_size == 0 {
            return Err(XlsxStreamError::Config(
                "Block size must be greater than 0".to_string(),
            ));
        }

        if self.config.security.max_part_count == 0 {
            return Err(XlsxStreamError::Config(
                "Maximum part count must be greater than 0".to_string(),
            ));
        }

        if self.config.security.max_part_size > self.config.security.max_total_size {
            return Err(XlsxStreamError::Config(format!(
                "Maximum part size ({}) exceeds maximum total size ({})",
                self.config.security.max_part_size, self.config.security.max_total_size
            )));
        }

        Ok(self.config)
    }
}
