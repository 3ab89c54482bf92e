/// Separator placed between the tokens of a multi-word n-gram, matching
/// the phrase convention of word2vec models (`New_York`).
pub const NGRAM_SEPARATOR: &str = "_";

/// Everygrams of `tokens` up to `max_order`, length-major then left to
/// right: `["cat", "sat"]` with order 2 gives `["cat", "sat", "cat_sat"]`.
pub fn expand<S: AsRef<str>>(tokens: &[S], max_order: usize) -> Vec<String> {
    let max_order = max_order.min(tokens.len());
    (1..=max_order)
        .flat_map(|n| expand_order(tokens, n))
        .collect()
}

/// Only the windows of length exactly `n`.
pub fn expand_order<S: AsRef<str>>(tokens: &[S], n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    tokens.windows(n).map(join_window).collect()
}

fn join_window<S: AsRef<str>>(window: &[S]) -> String {
    let mut joined = String::with_capacity(window.iter().map(|t| t.as_ref().len() + 1).sum());
    for (i, token) in window.iter().enumerate() {
        if i > 0 {
            joined.push_str(NGRAM_SEPARATOR);
        }
        joined.push_str(token.as_ref());
    }
    joined
}
