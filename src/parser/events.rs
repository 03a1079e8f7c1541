//! XML Event Module
//!
//! `quick-xml`をラップし、パーツのバイトストリームを固定サイズのチャンクで読み込みながら
//! 開始タグ・文字データ・終了タグのイベントをハンドラーへ渡すモジュール。
//!
//! 要素名と属性名は名前空間プレフィックスを除いたローカル名を小文字化して渡すため、
//! ハンドラー側では大文字小文字を区別せずに比較できます。

use std::io::{self, BufRead, Read};

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

use crate::error::XlsxStreamError;

/// 開始タグ（要素名と属性）
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
}

impl StartTag {
    #[cfg(test)]
    pub fn new(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
        }
    }

    /// 要素名が一致するか（大文字小文字を区別しない）
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// 属性値を取得（属性名は大文字小文字を区別しない）
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn from_element(element: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).to_ascii_lowercase();

        let mut attributes = Vec::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| format!("XML attribute error: {}", e))?;
            let raw_key = attr.key.as_ref();
            if raw_key == b"xmlns" || raw_key.starts_with(b"xmlns:") {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("XML attribute error: {}", e))?;
            attributes.push((key, value.into_owned()));
        }

        Ok(Self { name, attributes })
    }
}

/// パーツの内容を受け取るハンドラー
///
/// 要素名はすべて小文字化されたローカル名です。
pub(crate) trait PartHandler {
    fn start(&mut self, tag: &StartTag) -> Result<(), XlsxStreamError>;

    fn text(&mut self, _text: &str) -> Result<(), XlsxStreamError> {
        Ok(())
    }

    fn end(&mut self, _name: &str) -> Result<(), XlsxStreamError> {
        Ok(())
    }
}

/// 固定サイズのチャンク単位で読み込み、消費済みバイト中の改行数を数えるリーダー
pub(crate) struct ChunkReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    at_end: bool,
    newlines: usize,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R, block_size: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; block_size.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            at_end: false,
            newlines: 0,
        }
    }

    /// 現在の行番号（1始まり）
    pub fn line(&self) -> usize {
        self.newlines + 1
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ChunkReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for ChunkReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled && !self.at_end {
            let n = loop {
                match self.inner.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            self.pos = 0;
            self.filled = n;
            self.at_end = n == 0;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        let end = (self.pos + amt).min(self.filled);
        self.newlines += self.buf[self.pos..end]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.pos = end;
    }
}

/// パーツ1つ分のXMLトークナイザー
///
/// `next_event()`を呼ぶたびにイベントを1つ読み込み、ハンドラーへ渡します。
/// 入力が尽きた時点で要素が閉じられていない場合はXMLエラーになります。
pub(crate) struct PartTokenizer<R> {
    part: String,
    reader: Reader<ChunkReader<R>>,
    buf: Vec<u8>,
    depth: usize,
    finished: bool,
}

impl<R: Read> PartTokenizer<R> {
    pub fn new(part: &str, source: R, block_size: usize) -> Self {
        let mut reader = Reader::from_reader(ChunkReader::new(source, block_size));
        reader.trim_text(false);
        reader.expand_empty_elements(true);
        reader.check_end_names(true);

        Self {
            part: part.to_string(),
            reader,
            buf: Vec::new(),
            depth: 0,
            finished: false,
        }
    }

    /// イベントを1つ処理する
    ///
    /// # 戻り値
    ///
    /// * `Ok(true)` - イベントを処理した（続きがある）
    /// * `Ok(false)` - ドキュメントの終端に達した
    pub fn next_event<H: PartHandler>(&mut self, handler: &mut H) -> Result<bool, XlsxStreamError> {
        if self.finished {
            return Ok(false);
        }

        self.buf.clear();
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(e) => {
                self.finished = true;
                return Err(xml_error(&self.part, self.reader.get_ref().line(), e));
            }
        };

        match event {
            Event::Start(element) => {
                self.depth += 1;
                let tag = StartTag::from_element(&element).map_err(|message| {
                    XlsxStreamError::InvalidXml {
                        part: self.part.clone(),
                        line: self.reader.get_ref().line(),
                        message,
                    }
                })?;
                handler.start(&tag)?;
            }
            Event::End(element) => {
                self.depth = self.depth.saturating_sub(1);
                let name = String::from_utf8_lossy(element.local_name().as_ref()).to_ascii_lowercase();
                handler.end(&name)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| xml_error(&self.part, self.reader.get_ref().line(), e))?;
                handler.text(&text)?;
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(|e| XlsxStreamError::InvalidXml {
                    part: self.part.clone(),
                    line: self.reader.get_ref().line(),
                    message: format!("invalid UTF-8 in CDATA section: {}", e),
                })?;
                handler.text(text)?;
            }
            Event::Decl(decl) => check_encoding(&self.part, &decl)?,
            Event::Eof => {
                self.finished = true;
                if self.depth > 0 {
                    return Err(XlsxStreamError::InvalidXml {
                        part: self.part.clone(),
                        line: self.reader.get_ref().line(),
                        message: format!(
                            "unexpected end of document, {} element(s) left open",
                            self.depth
                        ),
                    });
                }
                return Ok(false);
            }
            _ => {}
        }

        Ok(true)
    }

    /// ドキュメントの終端まで読み込む
    pub fn run_to_end<H: PartHandler>(&mut self, handler: &mut H) -> Result<(), XlsxStreamError> {
        while self.next_event(handler)? {}
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner().into_inner()
    }
}

/// XML宣言のエンコーディングを確認する（UTF-8のみ対応）
fn check_encoding(part: &str, decl: &BytesDecl<'_>) -> Result<(), XlsxStreamError> {
    if let Some(Ok(encoding)) = decl.encoding() {
        let encoding = encoding.as_ref();
        if !encoding.eq_ignore_ascii_case(b"utf-8") && !encoding.eq_ignore_ascii_case(b"utf8") {
            return Err(XlsxStreamError::CannotCreateParser {
                part: part.to_string(),
                encoding: String::from_utf8_lossy(encoding).into_owned(),
            });
        }
    }
    Ok(())
}

/// `quick-xml`のエラーを変換する
///
/// 下位ストリームのI/Oエラーは`CannotReadPackedEntry`、それ以外は`InvalidXml`になります。
fn xml_error(part: &str, line: usize, error: quick_xml::Error) -> XlsxStreamError {
    match error {
        quick_xml::Error::Io(e) => XlsxStreamError::CannotReadPackedEntry {
            part: part.to_string(),
            source: io::Error::new(e.kind(), e.to_string()),
        },
        other => XlsxStreamError::InvalidXml {
            part: part.to_string(),
            line,
            message: other.to_string(),
        },
    }
}
