//! Lexical tokenizer shared by documents and queries.
//!
//! A token is a maximal run of ASCII letters, digits, or `_`, lowercased.
//! Every other character, non-ASCII included, separates tokens and is dropped.
//! No stemming and no stop words.

#[inline]
const fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split `text` into lowercase tokens in order of appearance.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if is_token_byte(b) {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            tokens.push(text[s..i].to_ascii_lowercase());
        }
    }
    if let Some(s) = start {
        tokens.push(text[s..].to_ascii_lowercase());
    }

    tokens
}
