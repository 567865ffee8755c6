//! Search keyword emphasis for rendered pages.
//!
//! Matching is ASCII case-insensitive and only touches body text: the head,
//! tags, comments, `<style>`/`<script>` blocks and character references are
//! left alone.

use bytes::Bytes;

use crate::domain::codec::escape_html;

const OPEN: &str = "<span class=\"kwd\">";
const CLOSE: &str = "</span>";

/// Regions blanked out before searching, as (start marker, end marker).
const MASKED_REGIONS: [(&[u8], &[u8]); 4] = [
    (b"<", b"<body"),
    (b"<!--", b"-->"),
    (b"<style>", b"</style>"),
    (b"<script", b"</script>"),
];

/// Emphasises every space separated word of `keywords` in `html`.
pub fn emphasize(html: &[u8], keywords: &str) -> Bytes {
    let mut page = String::from_utf8_lossy(html).into_owned();
    for keyword in keywords.split(' ').filter(|word| !word.is_empty()) {
        page = emphasize_word(&page, &escape_html(keyword));
    }
    Bytes::from(page)
}

fn emphasize_word(page: &str, keyword: &str) -> String {
    let keyword = keyword.to_ascii_lowercase();
    let needle = keyword.as_bytes();
    let haystack = masked(page);

    let mut out = String::with_capacity(page.len() + 64);
    let mut copied = 0;
    let mut from = 0;
    while let Some(start) = find(&haystack, needle, from) {
        let end = start + needle.len();
        if in_text(&haystack, start)
            && page.is_char_boundary(start)
            && page.is_char_boundary(end)
        {
            out.push_str(&page[copied..start]);
            out.push_str(OPEN);
            out.push_str(&page[start..end]);
            out.push_str(CLOSE);
            copied = end;
        }
        from = end;
    }
    out.push_str(&page[copied..]);
    out.push_str("<!-- KeywordEmphasis : ");
    out.push_str(&keyword);
    out.push_str(" -->\n");
    out
}

/// Lowercased copy of `page` with non-text regions overwritten by `<`.
///
/// Byte offsets match the original page.
fn masked(page: &str) -> Vec<u8> {
    let mut bytes = page.as_bytes().to_ascii_lowercase();
    for (open, close) in MASKED_REGIONS {
        loop {
            let (Some(start), Some(stop)) = (find(&bytes, open, 0), find(&bytes, close, 0)) else {
                break;
            };
            if stop <= start {
                break;
            }
            let from = (start + 2).min(bytes.len());
            let to = (stop + 2).min(bytes.len());
            bytes[from..to].fill(b'<');
        }
    }
    bytes
}

/// Whether `pos` lies outside any tag and any character reference.
fn in_text(haystack: &[u8], pos: usize) -> bool {
    let before = &haystack[..pos];
    let gt = before.iter().rposition(|&b| b == b'>');
    let lt = before.iter().rposition(|&b| b == b'<');
    let outside_tag = match (gt, lt) {
        (Some(gt), Some(lt)) => gt > lt,
        (_, None) => true,
        (None, Some(_)) => false,
    };
    if !outside_tag {
        return false;
    }

    let window_start = pos.saturating_sub(9).max(gt.unwrap_or(0));
    let window = &haystack[window_start..pos];
    match window.iter().rposition(|&b| b == b'&') {
        Some(amp) => window[amp..].contains(&b';'),
        None => true,
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}
