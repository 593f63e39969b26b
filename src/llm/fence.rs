//! Fenced block extraction
//!
//! Models are asked to wrap the rewritten text in a Markdown code block.
//! Only the first block is used; replies without one pass through untouched.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Optional info string (```markdown) only counts when a newline follows it,
    // so an inline ```text``` keeps its content.
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?:[A-Za-z0-9_+.\-]*[ \t]*\r?\n)?(.*?)```")
            .expect("fenced block pattern is valid");
}

/// Return the trimmed content of the first fenced block, or `text` unchanged
pub fn extract_fenced_block(text: &str) -> String {
    match FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => text.to_string(),
    }
}
