//! Text to HTML conversion for reference and document bodies.

use std::collections::HashMap;

use crate::application::repos::{ContentStore, RepoError};
use crate::domain::codec::escape_html;

use super::uri::UriMapper;

const URL_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];
const MAX_WORD: usize = 40;

/// Markers that would let embedded HTML run script.
const ACTIVE_CONTENT: &[&str] = &[
    "<script", "<iframe", "<applet", "<meta", "<embed", "<object", "javascript:",
    "vbscript:", "onunload", "onsubmit", "onstop", "onstart", "onselectstart",
    "onselectionchange", "onselect", "onscroll", "onrowsinserted", "onrowsdelete",
    "onrowexit", "onrowenter", "onresizestart", "onresizeend", "onresize", "onreset",
    "onreadystatechange", "onpropertychange", "onpaste", "onpage", "onmovestart",
    "onmoveend", "onmove", "onmousewheel", "onmouseup", "onmouseover", "onmouseout",
    "onmousemove", "onmouseleave", "onmouseenter", "onmousedown", "onlosecapture",
    "onload", "onlayoutcomplete", "onkeyup", "onkeypress", "onkeydown", "onhelp",
    "onfocusout", "onfocusin", "onfocus", "onfinish", "onfilterchange",
    "onerrorupdate", "onerror", "ondrop", "ondragstart", "ondragover", "ondragleave",
    "ondragenter", "ondragend", "ondrag", "ondeactivate", "ondblclick",
    "ondatasetcomplete", "ondatasetchanged", "ondataavailable", "oncut", "oncopy",
    "oncontrolselect", "oncontextmenu", "onclick", "onchange", "oncellchange",
    "onbounce", "onblur", "onbeforeupdate", "onbeforeunload", "onbeforeprint",
    "onbeforepaste", "onbeforeeditfocus", "onbeforedeactivate", "onbeforecut",
    "onbeforecopy", "onbeforeactivate", "onafterupdate", "onafterprint",
    "onactivate", "onabort",
];

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'#' | b'%' | b'$' | b'.')
}

fn is_url_byte(byte: u8) -> bool {
    (0x21..0x7f).contains(&byte) && !matches!(byte, b'"' | b'\'' | b'(' | b')' | b',' | b'\\')
}

/// Escapes text, keeping spaces and line breaks visible.
pub fn escape_multiline(text: &str) -> String {
    escape_html(text)
        .replace(' ', "&nbsp;")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

/// Turns URLs into anchors and reference names or indexed file names into
/// links. Lookups are memoised per linker.
pub struct AutoLinker<'a> {
    store: &'a dyn ContentStore,
    uris: &'a UriMapper,
    memo: HashMap<String, String>,
}

impl<'a> AutoLinker<'a> {
    pub fn new(store: &'a dyn ContentStore, uris: &'a UriMapper) -> Self {
        Self {
            store,
            uris,
            memo: HashMap::new(),
        }
    }

    /// Converts `text` to HTML; with `line_breaks` newlines become `<br>`.
    pub async fn link(&mut self, text: &str, line_breaks: bool) -> Result<String, RepoError> {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len() + text.len() / 4);
        let mut pos = 0;

        while pos < bytes.len() {
            if line_breaks && bytes[pos] == b'\n' {
                out.push_str("<br>");
                pos += 1;
                continue;
            }

            if let Some(len) = url_at(&bytes[pos..]) {
                let url = escape_html(&text[pos..pos + len]);
                out.push_str(&format!("<a href=\"{url}\" target=\"_top\">{url}</a>"));
                pos += len;
                continue;
            }

            let word_len = bytes[pos..]
                .iter()
                .take(MAX_WORD)
                .take_while(|&&b| is_word_byte(b))
                .count();
            if word_len >= 2 {
                let word = &text[pos..pos + word_len];
                let html = self.word_html(word).await?;
                out.push_str(&html);
                pos += word_len;
                continue;
            }

            // A run of non-word text, or a single character.
            let mut end = pos + text[pos..].chars().next().map_or(1, char::len_utf8);
            while end < bytes.len() && !is_word_byte(bytes[end]) && bytes[end] != b'\n' {
                end += text[end..].chars().next().map_or(1, char::len_utf8);
            }
            out.push_str(&escape_html(&text[pos..end]));
            pos = end;
        }

        Ok(out)
    }

    async fn word_html(&mut self, word: &str) -> Result<String, RepoError> {
        if let Some(html) = self.memo.get(word) {
            return Ok(html.clone());
        }

        let html = match self.store.reference_key_by_name(word).await? {
            Some(key) => {
                let summary = self
                    .store
                    .find_reference_by_id(key.id)
                    .await?
                    .map(|reference| reference.summary)
                    .unwrap_or_default();
                format!(
                    "<a href=\"{}\" title=\"{} - {}\">{}</a>",
                    escape_html(&self.uris.reference_named(&key.module, &key.name)),
                    escape_html(&key.name),
                    escape_html(&summary),
                    escape_html(word)
                )
            }
            None if word.contains('.') => match self.store.file_path_by_basename(word).await? {
                Some(path) => format!(
                    "<a href=\"{}\">{}</a>",
                    escape_html(&self.uris.file(&path)),
                    escape_html(word)
                ),
                None => escape_html(word),
            },
            None => escape_html(word),
        };

        self.memo.insert(word.to_string(), html.clone());
        Ok(html)
    }

    /// Renders reference instructions. Plain passages become linked
    /// `<pre>` blocks; `html{ ... }html` passages are embedded with active
    /// content neutralised.
    pub async fn instructions(&mut self, inst: &str) -> Result<String, RepoError> {
        let text = inst.replace("\r\n", "\n");
        let mut out = String::new();
        let mut rest = text.as_str();

        loop {
            let (plain, embedded) = match rest.find("html{\n") {
                Some(index) => (&rest[..index], Some(&rest[index + "html{\n".len()..])),
                None => (rest, None),
            };
            if !plain.is_empty() && plain != "\n" {
                out.push_str("<pre class=\"para\">");
                out.push_str(&self.link(plain, false).await?);
                out.push_str("</pre>\n");
            }

            let Some(embedded) = embedded else { break };
            let (html, next) = match embedded.find("\n}html") {
                Some(index) => (&embedded[..index], &embedded[index + "\n}html".len()..]),
                None => (embedded, ""),
            };
            out.push_str("<div class=\"para\">");
            out.push_str(&defang(html));
            out.push_str("</div>\n");

            if next.is_empty() {
                break;
            }
            rest = next;
        }

        Ok(out)
    }
}

/// Length of a URL starting at the beginning of `bytes`, if any.
fn url_at(bytes: &[u8]) -> Option<usize> {
    URL_SCHEMES.iter().find_map(|scheme| {
        let rest = bytes.strip_prefix(scheme.as_bytes())?;
        let body = rest.iter().take_while(|&&b| is_url_byte(b)).count();
        (body > 0).then_some(scheme.len() + body)
    })
}

/// Breaks script-capable markup by blanking the inside of each marker,
/// keeping its first and last characters.
pub fn defang(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = html.as_bytes().to_vec();
    let mut pos = 0;
    while pos < lower.len() {
        let hit = ACTIVE_CONTENT
            .iter()
            .find(|marker| lower.as_bytes()[pos..].starts_with(marker.as_bytes()));
        match hit {
            Some(marker) => {
                let len = marker.len();
                out[pos + 1..pos + len - 1].fill(b'_');
                pos += len;
            }
            None => pos += 1,
        }
    }
    // Only ASCII bytes were replaced, so the buffer is still UTF-8.
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Cuts `text` after the last delimiter found at or before byte `limit`.
///
/// Delimiters are tried in order; the first one whose cut point lies past
/// `min_len` wins. Without a usable delimiter the text is cut at `limit`.
pub fn omit_sentence<'t>(text: &'t str, limit: usize, delimiters: &[&str], min_len: usize) -> &'t str {
    let limit = floor_boundary(text, limit.min(text.len()));
    for delimiter in delimiters {
        let window = floor_boundary(text, (limit + delimiter.len()).min(text.len()));
        if let Some(index) = text[..window].rfind(delimiter) {
            let cut = index + delimiter.len();
            if cut > min_len {
                return &text[..cut];
            }
        }
    }
    &text[..limit]
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Short excerpt of reference instructions for listing pages.
pub fn instruction_excerpt(inst: &str) -> String {
    let flattened = inst.replace("---", "");
    let mut excerpt: String = flattened.chars().take(150).collect();
    excerpt.push_str("..");
    let limit = excerpt.find("html{").unwrap_or(excerpt.len());
    omit_sentence(&excerpt, limit, &["。", "\n", " "], 10).to_string()
}

/// Excerpt of a document summary for category pages.
pub fn summary_excerpt(summary: &str) -> &str {
    omit_sentence(summary, summary.len(), &["。", ". ", " "], 10)
}

/// Short summary for the menu: at most 75 characters, cut at a space.
pub fn menu_summary(summary: &str) -> String {
    let short: String = summary.chars().take(75).collect();
    match short.rfind(' ') {
        Some(index) if index >= 10 => short[..=index].to_string(),
        _ => short,
    }
}
