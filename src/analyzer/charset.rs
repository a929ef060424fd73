//! Charset sniffing ahead of DOM parsing, per spec.md §4.5 step 1.
//!
//! Grounded on the teacher's `page_extractor` decoding a browser-rendered
//! DOM; here there is no browser, so the raw bytes are decoded with
//! `chardetng` (BOM/meta/statistical sniffing) falling back to the
//! `Content-Type` header's `charset=` parameter before defaulting to UTF-8.

use encoding_rs::Encoding;

/// Decode `body` to a `String`, returning the encoding label used.
///
/// An explicit `charset=` in the `Content-Type` header wins outright;
/// otherwise `chardetng`'s statistical detector decides.
#[must_use]
pub fn decode(body: &[u8], content_type_header: Option<&str>) -> (String, &'static str) {
    if let Some(label) = content_type_header.and_then(header_charset) {
        let encoding = encoding_for_label(&label);
        let (text, _had_errors) = encoding.decode_without_bom_handling(body);
        return (text.into_owned(), encoding.name());
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (text, encoding, _had_errors) = encoding.decode(body);
    (text.into_owned(), encoding.name())
}

fn header_charset(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("charset="))
        .map(|charset| charset.trim_matches('"').to_string())
}

/// Resolve an explicit charset label (from a header or `<meta charset>`) to
/// an [`Encoding`], falling back to UTF-8 when unrecognised.
#[must_use]
pub fn encoding_for_label(label: &str) -> &'static Encoding {
    Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_ascii_as_utf8() {
        let (text, _) = decode(b"<html><body>hello</body></html>", None);
        assert!(text.contains("hello"));
    }

    #[test]
    fn header_charset_extracts_label() {
        assert_eq!(
            header_charset("text/html; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(header_charset("text/html"), None);
    }
}
