//! Whitespace compression
//!
//! Runs of whitespace outside `pre`, `textarea` and `script` blocks are
//! collapsed to a single space.

use once_cell::sync::Lazy;
use regex::Regex;

static PRESERVED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre\s*>|<textarea\b.*?</textarea\s*>|<script\b.*?</script\s*>")
        .expect("valid preserved block regex")
});

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Collapses insignificant whitespace in `html`
pub fn compress_whitespace(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for block in PRESERVED_BLOCK.find_iter(html) {
        out.push_str(&compress_segment(&html[last..block.start()]));
        out.push_str(block.as_str());
        last = block.end();
    }
    out.push_str(&compress_segment(&html[last..]));

    out.trim().to_string()
}

fn compress_segment(segment: &str) -> String {
    WHITESPACE_RUN.replace_all(segment, " ").into_owned()
}
