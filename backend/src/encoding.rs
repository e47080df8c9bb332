//! Byte to text decoding for CSV content.
//!
//! UTF-8 is tried first. Anything else goes through charset detection,
//! which covers the Latin-1 / Windows-1252 exports spreadsheet tools emit.

use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode `bytes` with a named encoding. Unknown names fall back to lossy UTF-8.
pub fn decode_with(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Turn raw CSV bytes into text.
///
/// Returns the text and the name of the encoding that was used.
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, String) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if let Ok(text) = std::str::from_utf8(bytes) {
        return (Cow::Borrowed(text), "utf-8".to_string());
    }

    let encoding = detect_encoding(bytes);
    (Cow::Owned(decode_with(bytes, &encoding)), encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        let (text, encoding) = decode_text("Pol Alsina Domènech".as_bytes());
        assert_eq!(text, "Pol Alsina Domènech");
        assert_eq!(encoding, "utf-8");
        assert!(matches!(text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_bom_stripped() {
        let (text, _) = decode_text(b"\xEF\xBB\xBFa,b");
        assert_eq!(text, "a,b");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_with(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_non_utf8_never_fails() {
        let bytes: &[u8] = b"name,city\nRen\xe9,Montr\xe9al\n";
        let (text, _) = decode_text(bytes);
        assert!(text.starts_with("name,city\nRen"));
    }
}
