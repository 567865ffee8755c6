//! Percent-encoding helpers for request paths, generated links and cache
//! filenames, plus HTML text escaping.
//!
//! Three alphabets are in play:
//!
//! * request paths are decoded strictly: a `%` must be followed by two hex
//!   digits and the decoded bytes must be UTF-8;
//! * link segments keep `[A-Za-z0-9.-]` and escape everything else;
//! * cache filenames keep `[A-Za-z0-9_-]` and reserve `%5fempty` for the
//!   empty name, which no real name can produce because `_` is never escaped.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

const SEGMENT_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-');
const FILENAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

/// Cache filename used for the empty category name.
pub const EMPTY_FILENAME: &str = "%5fempty";

/// Errors raised while decoding a request path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed percent escape at byte {offset}")]
    MalformedEscape { offset: usize },
    #[error("decoded path is not valid UTF-8")]
    InvalidUtf8,
    #[error("path `{0}` is not absolute")]
    NotAbsolute(String),
}

/// Percent-decode an absolute request path.
pub fn decode(raw_path: &str) -> Result<String, CodecError> {
    if !raw_path.starts_with('/') {
        return Err(CodecError::NotAbsolute(raw_path.to_string()));
    }

    let bytes = raw_path.as_bytes();
    let mut offset = 0;
    while offset < bytes.len() {
        if bytes[offset] == b'%' {
            let well_formed = bytes
                .get(offset + 1..offset + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(CodecError::MalformedEscape { offset });
            }
            offset += 3;
        } else {
            offset += 1;
        }
    }

    percent_decode_str(raw_path)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| CodecError::InvalidUtf8)
}

/// Encode a single path segment or query value for use in a link.
pub fn encode_segment(text: &str) -> String {
    utf8_percent_encode(text, SEGMENT_SET).to_string()
}

/// Escape a category name into a token usable as a cache filename.
pub fn escape_filename(name: &str) -> String {
    if name.is_empty() {
        return EMPTY_FILENAME.to_string();
    }
    utf8_percent_encode(name, FILENAME_SET).to_string()
}

/// Convert a stored path (either separator convention) into a link path.
///
/// Segment boundaries are preserved, including empty segments, so
/// `a\b/` becomes `a/b/`.
pub fn path_to_uri(path: &str) -> String {
    path.split(['/', '\\'])
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_handles_escapes_and_utf8() {
        assert_eq!(decode("/docs/a%20b.txt").unwrap(), "/docs/a b.txt");
        assert_eq!(decode("/reference/%E6%A8%99").unwrap(), "/reference/標");
        assert_eq!(decode("/plain/path").unwrap(), "/plain/path");
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert_eq!(
            decode("/bad%zzpath"),
            Err(CodecError::MalformedEscape { offset: 4 })
        );
        assert_eq!(
            decode("/trailing%4"),
            Err(CodecError::MalformedEscape { offset: 9 })
        );
        assert_eq!(decode("/%FF%FE"), Err(CodecError::InvalidUtf8));
        assert!(matches!(
            decode("relative/path"),
            Err(CodecError::NotAbsolute(_))
        ));
    }

    #[test]
    fn encode_segment_keeps_only_alnum_dot_dash() {
        assert_eq!(encode_segment("mes"), "mes");
        assert_eq!(encode_segment("hsp3.txt"), "hsp3.txt");
        assert_eq!(encode_segment("a b_c"), "a%20b%5Fc");
        assert_eq!(encode_segment("#func"), "%23func");
        assert_eq!(encode_segment("標"), "%E6%A8%99");
    }

    #[test]
    fn escape_filename_uses_sentinel_for_empty_name() {
        assert_eq!(escape_filename(""), "%5fempty");
        assert_eq!(escape_filename("a b"), "a%20b");
        assert_eq!(escape_filename("hsp_ext-1"), "hsp_ext-1");
        assert_eq!(escape_filename("obj/x"), "obj%2Fx");
    }

    #[test]
    fn escape_filename_never_collides() {
        let names = [
            "", "_empty", "%5fempty", "a b", "a%20b", "a_b", "a-b", "A", "a", "a.b",
        ];
        let escaped: std::collections::HashSet<String> =
            names.iter().map(|name| escape_filename(name)).collect();
        assert_eq!(escaped.len(), names.len());
    }

    #[test]
    fn path_to_uri_splits_on_both_separators() {
        assert_eq!(path_to_uri("doclib\\HSP Document\\a.txt"), "doclib/HSP%20Document/a.txt");
        assert_eq!(path_to_uri("sample/new/"), "sample/new/");
        assert_eq!(path_to_uri("opensearch/"), "opensearch/");
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("画面"), "画面");
    }
}
