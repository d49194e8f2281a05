//! Byte-order mark handling and text decoding for package files.
//!
//! Files are decoded once, patched as text, and re-encoded with the exact
//! encoding and BOM they came with.

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::error::Error;

/// Text encodings the reference tool writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    fn as_encoding(self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::Utf16Le => UTF_16LE,
            TextEncoding::Utf16Be => UTF_16BE,
        }
    }

    /// Encodes `text` without any BOM.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            // encoding_rs only ever encodes to UTF-8, so UTF-16 is done by hand.
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

/// A decoded file together with what is needed to write it back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    /// The leading BOM bytes exactly as found (empty when absent).
    pub bom: Vec<u8>,
}

impl DecodedText {
    /// Re-encodes `text` with this file's encoding and re-prepends its BOM.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = self.bom.clone();
        out.extend(self.encoding.encode(text));
        out
    }
}

/// Detects and strips a BOM, then decodes the remainder.
///
/// Without a BOM, bytes whose first two look like an ASCII character in
/// either UTF-16 byte order are tried as that UTF-16 variant first. NUL is
/// valid UTF-8, so trying UTF-8 first would accept such files as garbage.
pub fn decode(bytes: &[u8]) -> Result<DecodedText, Error> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let text_encoding = if encoding == UTF_16LE {
            TextEncoding::Utf16Le
        } else if encoding == UTF_16BE {
            TextEncoding::Utf16Be
        } else {
            TextEncoding::Utf8
        };
        let text = decode_strict(&bytes[bom_len..], text_encoding)?;
        return Ok(DecodedText {
            text,
            encoding: text_encoding,
            bom: bytes[..bom_len].to_vec(),
        });
    }

    let mut attempts = Vec::with_capacity(2);
    match bytes {
        [b, 0, ..] if *b != 0 && b.is_ascii() => attempts.push(TextEncoding::Utf16Le),
        [0, b, ..] if *b != 0 && b.is_ascii() => attempts.push(TextEncoding::Utf16Be),
        _ => {}
    }
    attempts.push(TextEncoding::Utf8);

    for encoding in attempts {
        if let Ok(text) = decode_strict(bytes, encoding) {
            return Ok(DecodedText {
                text,
                encoding,
                bom: Vec::new(),
            });
        }
    }

    Err(Error::Encoding(
        "content is not valid UTF-8 or UTF-16".to_string(),
    ))
}

fn decode_strict(bytes: &[u8], encoding: TextEncoding) -> Result<String, Error> {
    encoding
        .as_encoding()
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            Error::Encoding(format!(
                "content is not valid {}",
                encoding.as_encoding().name()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_bom_is_kept() {
        let bytes = b"\xEF\xBB\xBF<xliff/>";
        let decoded = decode(bytes).unwrap();
        assert_eq!(decoded.text, "<xliff/>");
        assert_eq!(decoded.bom, vec![0xEF, 0xBB, 0xBF]);
        assert_eq!(decoded.encode(&decoded.text), bytes.to_vec());
    }

    #[test]
    fn test_plain_utf8() {
        let decoded = decode("<a>café</a>".as_bytes()).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert!(decoded.bom.is_empty());
        assert_eq!(decoded.text, "<a>café</a>");
    }

    #[test]
    fn test_utf16le_with_bom_roundtrip() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(TextEncoding::Utf16Le.encode("<a>ü</a>"));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf16Le);
        assert_eq!(decoded.text, "<a>ü</a>");
        assert_eq!(decoded.encode(&decoded.text), bytes);
    }

    #[test]
    fn test_utf16be_without_bom() {
        let bytes = TextEncoding::Utf16Be.encode("<a/>");
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf16Be);
        assert_eq!(decoded.text, "<a/>");
    }

    #[test]
    fn test_utf16le_without_bom_parses_as_text() {
        let doc = r#"<xliff version="1.2"><file original="a"/></xliff>"#;
        let decoded = decode(&TextEncoding::Utf16Le.encode(doc)).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf16Le);
        assert_eq!(decoded.text, doc);
        assert!(!decoded.text.contains('\0'));
        assert_eq!(decoded.encode(&decoded.text), TextEncoding::Utf16Le.encode(doc));
    }

    #[test]
    fn test_undecodable_bytes() {
        let result = decode(&[0xC3, 0x28, 0xA0, 0xA1]);
        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}
