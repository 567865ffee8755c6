//! "Did you mean" suggestions for reference names that do not exist.

use tracing::warn;

use crate::application::repos::{ContentStore, LengthWindow, NamePattern};

const MIN_TOKEN_LEN: usize = 3;

/// Returns reference names that share a large substring with `token`.
///
/// Suggestions are only produced for ASCII tokens of at least three
/// characters that do not already name a reference or module.
pub async fn suggest(store: &dyn ContentStore, token: &str) -> Vec<String> {
    let Some((patterns, window)) = plan(token) else {
        return Vec::new();
    };

    match store.count_exact_reference_matches(token).await {
        Ok(0) => {}
        Ok(_) => return Vec::new(),
        Err(err) => {
            warn!(
                target = "ohdl::application::suggest",
                token,
                error = %err,
                "exact match check failed"
            );
            return Vec::new();
        }
    }

    match store.search_token_matches(&patterns, window).await {
        Ok(mut names) => {
            names.dedup();
            names
        }
        Err(err) => {
            warn!(
                target = "ohdl::application::suggest",
                token,
                error = %err,
                "suggestion search failed"
            );
            Vec::new()
        }
    }
}

/// Patterns and length window for `token`, or `None` when the token is too
/// short or not ASCII.
pub fn plan(token: &str) -> Option<([NamePattern; 4], LengthWindow)> {
    let n = token.len();
    if n < MIN_TOKEN_LEN || !token.is_ascii() {
        return None;
    }

    let quarter = n / 4;
    let half = n / 2;
    let three_quarters = n * 3 / 4;
    let patterns = [
        NamePattern::new(&token[..three_quarters], ""),
        NamePattern::new(&token[..half], &token[three_quarters..]),
        NamePattern::new(&token[..quarter], &token[half..]),
        NamePattern::new("", &token[quarter..]),
    ];

    let window = if n >= 4 {
        LengthWindow {
            min: n - 1,
            max: n + 1,
        }
    } else {
        LengthWindow { min: n, max: n }
    };

    Some((patterns, window))
}
