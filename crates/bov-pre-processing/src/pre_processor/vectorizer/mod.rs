mod aggregate;
mod ngrams;
mod params;
mod tokenizer;

pub use aggregate::{aggregate, aggregate_orders, Aggregate, IncrementalAggregator};
pub use ngrams::{expand, expand_order, NGRAM_SEPARATOR};
pub use params::{BuildParams, DEFAULT_OUTPUT_PREFIX};
pub use tokenizer::tokenize;

/// Everygram order `n`: all contiguous token spans of length `1..=n`.
pub type NgramOrder = usize;
