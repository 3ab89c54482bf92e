use ndarray::Array1;

use super::ngrams;
use crate::pre_processor::VectorTable;

/// Mean of the embedding vectors matched for one document at one order.
///
/// With `match_count == 0` nothing was found in the table and `vector` is
/// all zeros.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub vector: Array1<f64>,
    pub match_count: usize,
}

/// Average the table vectors of every n-gram present in `table`.
pub fn aggregate<S: AsRef<str>>(ngrams: &[S], table: &VectorTable) -> Aggregate {
    let mut acc = IncrementalAggregator::new(table);
    acc.push_ngrams(ngrams);
    acc.snapshot()
}

/// Aggregate for orders `1..=max_order` from a single accumulator.
pub fn aggregate_orders<S: AsRef<str>>(
    tokens: &[S],
    table: &VectorTable,
    max_order: usize,
) -> Vec<Aggregate> {
    let mut acc = IncrementalAggregator::new(table);
    (0..max_order).map(|_| acc.advance(tokens)).collect()
}

/// Running sum carried across n-gram orders.
///
/// The order-`n` everygram list is the order-`n - 1` list followed by the
/// length-`n` windows, so adding only the new windows keeps the summation
/// order of [`aggregate`] over [`ngrams::expand`] and yields bit-identical
/// means.
pub struct IncrementalAggregator<'t> {
    table: &'t VectorTable,
    sum: Array1<f64>,
    match_count: usize,
    order: usize,
}

impl<'t> IncrementalAggregator<'t> {
    #[must_use]
    pub fn new(table: &'t VectorTable) -> Self {
        Self {
            table,
            sum: Array1::zeros(table.dimension()),
            match_count: 0,
            order: 0,
        }
    }

    /// Fold in the windows of the next order and return the mean so far.
    pub fn advance<S: AsRef<str>>(&mut self, tokens: &[S]) -> Aggregate {
        self.order += 1;
        self.push_ngrams(&ngrams::expand_order(tokens, self.order));
        self.snapshot()
    }

    fn push_ngrams<S: AsRef<str>>(&mut self, ngrams: &[S]) {
        for ngram in ngrams {
            if let Some(vector) = self.table.get(ngram.as_ref()) {
                self.sum += &vector;
                self.match_count += 1;
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Aggregate {
        let vector = if self.match_count > 0 {
            &self.sum / self.match_count as f64
        } else {
            self.sum.clone()
        };
        Aggregate {
            vector,
            match_count: self.match_count,
        }
    }
}
