//! Security Module
//!
//! セキュリティ対策を実装するモジュール。
//! ZIP bomb攻撃、パストラバーサル攻撃への対策を提供します。

/// セキュリティ設定
///
/// アーカイブを開く際のセキュリティ制限を定義します。
/// ストリーミング読み込みでは展開後のデータをメモリに保持しないため、
/// 単一パーツの上限は大きめに設定しています。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// ZIPアーカイブ内の最大エントリ数
    /// デフォルト: 10000
    pub max_part_count: usize,
    /// 単一パーツの展開後の最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_part_size: u64,
    /// 全パーツの展開後の合計最大サイズ（バイト）
    /// デフォルト: 16GB (17_179_869_184 bytes)
    pub max_total_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_part_count: 10_000,
            max_part_size: 2_147_483_648,   // 2GB
            max_total_size: 17_179_869_184, // 16GB
        }
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、アーカイブ内のエントリ名を検証します。
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`セグメントや絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

/// リレーションシップのターゲットをパッケージ内のパスに解決
///
/// `base_dir`はリレーションシップの持ち主パーツが置かれているディレクトリ
/// （例: `xl`、ルートの場合は空文字列）です。`/`で始まるターゲットは
/// パッケージルートからの絶対パスとして扱います。
///
/// # 戻り値
///
/// * `Some(String)` - 正規化されたパス（例: `xl/worksheets/sheet1.xml`）
/// * `None` - パッケージルートの外を指している、または空になった場合
pub(crate) fn resolve_part_path(base_dir: &str, target: &str) -> Option<String> {
    let target = target.trim();
    let mut segments: Vec<&str> = Vec::new();

    let relative = match target.strip_prefix('/') {
        Some(absolute) => absolute,
        None => {
            segments.extend(base_dir.split('/').filter(|s| !s.is_empty()));
            target
        }
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }

    Some(segments.join("/"))
}

/// パスをディレクトリ部分とファイル名部分に分割
///
/// `xl/workbook.xml` -> (`xl`, `workbook.xml`)、`workbook.xml` -> (``, `workbook.xml`)
pub(crate) fn split_part_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}
