//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// xlsxstreamクレート全体で使用するエラー型
///
/// エラーは大きく3種類に分かれます。
///
/// - 構造エラー: ドキュメントを開く際に必須パーツが欠けている、または壊れている
///   （`NotAZipContainer`, `MissingGlobalRelationships`, `MissingWorkbookRelationships`,
///   `MissingWorkbook`, `BadWorksheetRelationship`）
/// - ストリーミングエラー: 行の読み込み中に発生するI/OエラーやXMLエラー
///   （`CannotReadPackedEntry`, `InvalidXml`, `CannotCreateParser`）。
///   発生したワークシートのストリームは破棄されるため、再度
///   `open_worksheet()`を呼び出す必要があります。
/// - 使用方法の誤り: ワークシートを開かずに行を読む、閉じたドキュメントを操作する
///   （`NoWorksheetOpen`, `DocumentClosed`）
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxstream::{XlsxStreamError, XlsxStreamReader};
///
/// match XlsxStreamReader::open("book.xlsx") {
///     Ok(reader) => println!("{} worksheets", reader.worksheets().len()),
///     Err(XlsxStreamError::MissingWorkbookRelationships(path)) => {
///         eprintln!("broken package, missing {}", path);
///     }
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxStreamError {
    /// I/O操作中に発生したエラー（ファイルが開けないなど）
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 入力がZIPアーカイブとして読めない
    #[error("The file is damaged or its format is not XLSX: {0}")]
    NotAZipContainer(String),

    /// `_rels/.rels`が存在しない
    #[error("The file is not XLSX: global relationships part '_rels/.rels' is missing")]
    MissingGlobalRelationships,

    /// ワークブックのリレーションシップパーツが存在しない
    #[error("The file is damaged: workbook relationships part '{0}' is missing")]
    MissingWorkbookRelationships(String),

    /// ワークブックパーツが存在しない
    #[error("The file is damaged: workbook part '{0}' is missing")]
    MissingWorkbook(String),

    /// ワークシートが未定義のリレーションシップIDを参照している
    #[error("The file is damaged: worksheet '{sheet}' references unknown relationship '{relationship}'")]
    BadWorksheetRelationship {
        /// ワークシート名
        sheet: String,
        /// 参照されているリレーションシップID（`r:id`）
        relationship: String,
    },

    /// XMLパーサーを構築できない
    ///
    /// パーツのXML宣言がUTF-8以外のエンコーディングを指定している場合に発生します。
    #[error("Cannot create XML parser for '{part}': unsupported encoding '{encoding}'")]
    CannotCreateParser {
        /// パーツのパス
        part: String,
        /// 宣言されていたエンコーディング
        encoding: String,
    },

    /// アーカイブ内のパーツ読み込み中に発生したI/Oエラー
    #[error("There was an error while reading packed part '{part}': {source}")]
    CannotReadPackedEntry {
        /// パーツのパス
        part: String,
        /// 元のI/Oエラー
        #[source]
        source: std::io::Error,
    },

    /// XMLの構文エラー
    ///
    /// `line`はベストエフォートの行番号（1始まり）です。
    #[error("XML parsing error in '{part}' on line {line}: {message}")]
    InvalidXml {
        /// パーツのパス
        part: String,
        /// エラーが検出された行番号
        line: usize,
        /// パーサーのエラーメッセージ
        message: String,
    },

    /// ワークシートが開かれていない状態で行を読もうとした
    #[error("No worksheet is open; use open_worksheet() before reading rows")]
    NoWorksheetOpen,

    /// 閉じたドキュメントを操作しようとした
    #[error("The document is closed")]
    DocumentClosed,

    /// 設定の検証に失敗したエラー
    ///
    /// `ReaderBuilder`の設定が無効な場合（ブロックサイズ0など）に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// エントリ数・展開サイズの上限超過や、パッケージ外を指すパスを検出した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl XlsxStreamError {
    /// ワークシートのストリームを使用不能にするエラーかどうか
    pub fn is_stream_failure(&self) -> bool {
        matches!(
            self,
            XlsxStreamError::CannotReadPackedEntry { .. }
                | XlsxStreamError::InvalidXml { .. }
                | XlsxStreamError::CannotCreateParser { .. }
        )
    }
}
