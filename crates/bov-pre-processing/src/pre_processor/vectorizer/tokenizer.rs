//! Documents arrive already tokenized by an upstream step, one
//! whitespace-separated token stream per file.

/// Split pre-tokenized text into tokens on ASCII whitespace. Newlines count
/// as separators; U+00A0 and other Unicode spaces stay inside a token.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_ascii_whitespace().collect()
}
