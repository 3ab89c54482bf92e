mod embedding;
mod vectorizer;

pub use embedding::{DimensionPolicy, VectorTable};
pub use vectorizer::{
    aggregate, aggregate_orders, expand, expand_order, tokenize, Aggregate, BuildParams,
    IncrementalAggregator, NgramOrder, DEFAULT_OUTPUT_PREFIX, NGRAM_SEPARATOR,
};
