//! Byte-level decoding and encoding of file contents. Text is kept verbatim;
//! line endings are not normalized.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16BE_BOM: &[u8] = b"\xFE\xFF";
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// 文件載入時偵測到的編碼，儲存時沿用。 / Encoding detected on load and reused on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    Utf16Le,
    Utf16Be,
    Legacy(&'static Encoding),
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8 { bom: false }
    }
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 { bom: false } => "utf-8",
            TextEncoding::Utf8 { bom: true } => "utf-8-bom",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Legacy(encoding) => encoding.name(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    #[error("content looks binary")]
    Binary,
    #[error("content is not valid {0}")]
    InvalidEncoding(&'static str),
    #[error("text cannot be represented in {0}")]
    Unrepresentable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Decodes file bytes: BOM-marked Unicode first, then plain UTF-8, then a
/// detected legacy encoding.  
/// 依序嘗試 BOM、UTF-8 與舊式編碼偵測以解碼檔案內容。
pub fn decode(bytes: &[u8]) -> Result<DecodedText, TextError> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        let text = std::str::from_utf8(rest).map_err(|_| TextError::InvalidEncoding("utf-8"))?;
        return Ok(DecodedText {
            text: text.to_owned(),
            encoding: TextEncoding::Utf8 { bom: true },
        });
    }
    if let Some(rest) = bytes.strip_prefix(UTF16LE_BOM) {
        return Ok(DecodedText {
            text: decode_utf16(rest, false)?,
            encoding: TextEncoding::Utf16Le,
        });
    }
    if let Some(rest) = bytes.strip_prefix(UTF16BE_BOM) {
        return Ok(DecodedText {
            text: decode_utf16(rest, true)?,
            encoding: TextEncoding::Utf16Be,
        });
    }
    if bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0) {
        return Err(TextError::Binary);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedText {
            text: text.to_owned(),
            encoding: TextEncoding::Utf8 { bom: false },
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, false);
    let (text, had_errors) = guess.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(TextError::InvalidEncoding(guess.name()));
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding: TextEncoding::Legacy(guess),
    })
}

/// Encodes `text` in `encoding`, restoring any BOM the file was loaded with.  
/// 以原編碼輸出文字，並還原載入時的 BOM。
pub fn encode(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, TextError> {
    match encoding {
        TextEncoding::Utf8 { bom } => {
            let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
            if bom {
                out.extend_from_slice(UTF8_BOM);
            }
            out.extend_from_slice(text.as_bytes());
            Ok(out)
        }
        TextEncoding::Utf16Le => Ok(encode_utf16(text, false)),
        TextEncoding::Utf16Be => Ok(encode_utf16(text, true)),
        TextEncoding::Legacy(legacy) => {
            let (bytes, _, had_errors) = legacy.encode(text);
            if had_errors {
                return Err(TextError::Unrepresentable(legacy.name()));
            }
            Ok(bytes.into_owned())
        }
    }
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<String, TextError> {
    let label = if big_endian { "utf-16be" } else { "utf-16le" };
    if bytes.len() % 2 != 0 {
        return Err(TextError::InvalidEncoding(label));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| TextError::InvalidEncoding(label))
}

fn encode_utf16(text: &str, big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(if big_endian { UTF16BE_BOM } else { UTF16LE_BOM });
    for unit in text.encode_utf16() {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        out.extend_from_slice(&bytes);
    }
    out
}
