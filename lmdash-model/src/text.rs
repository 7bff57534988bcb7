//! Helpers for working with model response text.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```([\s\S]*?)```").expect("fenced block pattern is valid"));

static LANGUAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w+#.-]*$").expect("language tag pattern is valid"));

/// Extract the contents of triple-backtick code blocks from `text`.
///
/// The fences and an optional language tag on the opening line are
/// removed, and each block is trimmed. An unterminated fence is ignored.
///
/// ```
/// use lmdash_model::extract_code_blocks;
///
/// let reply = "Try this:\n```rust\nfn main() {}\n```\nor ```ls -la```";
/// assert_eq!(extract_code_blocks(reply), vec!["fn main() {}", "ls -la"]);
/// ```
pub fn extract_code_blocks(text: &str) -> Vec<String> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|inner| {
            let inner = inner.as_str();
            let body = match inner.split_once('\n') {
                Some((first, rest)) if LANGUAGE_TAG.is_match(first.trim()) => rest,
                _ => inner,
            };
            body.trim().to_string()
        })
        .collect()
}
