use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ahash::HashMap;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BovError, Result};

/// What to do with a table row whose width differs from the first row's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// Reject the whole table.
    #[default]
    Strict,
    /// Drop the row and keep loading.
    Skip,
}

/// Word-embedding lookup table in word2vec text layout.
///
/// Vectors live in one dense `(vocab, dimension)` matrix; the token map
/// only stores row indices.
#[derive(Clone, Debug)]
pub struct VectorTable {
    index: HashMap<String, usize>,
    vectors: Array2<f64>,
    skipped_rows: usize,
}

impl VectorTable {
    /// Load a table from disk. The first line is the `<vocab> <dim>` header
    /// and is skipped.
    pub fn load(path: impl AsRef<Path>, policy: DimensionPolicy) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            BovError::format(&source, format!("cannot open embedding table: {e}"))
        })?;
        debug!(path = %source, ?policy, "Loading embedding table");
        Self::from_reader(BufReader::new(file), &source, policy)
    }

    /// Parse a table from any buffered reader. `source` names the input in
    /// error messages.
    pub fn from_reader<R: BufRead>(
        reader: R,
        source: &str,
        policy: DimensionPolicy,
    ) -> Result<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => parse_header(
                &line.map_err(|e| BovError::format(source, format!("line 1: {e}")))?,
            ),
            None => None,
        };

        let mut builder = TableBuilder::new(source, policy);
        for (idx, line) in lines.enumerate() {
            // header is line 1
            let line_no = idx + 2;
            let line =
                line.map_err(|e| BovError::format(source, format!("line {line_no}: {e}")))?;
            let mut fields = split_row(&line);
            let Some(token) = fields.next() else {
                continue;
            };
            let values = fields
                .map(str::parse::<f64>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    BovError::format(
                        source,
                        format!("line {line_no}: invalid value for token {token:?}: {e}"),
                    )
                })?;
            builder.push(token, values, line_no)?;
        }

        let table = builder.finish()?;
        if let Some((declared_vocab, declared_dim)) = header {
            debug!(declared_vocab, declared_dim, "Embedding table header");
            if declared_dim != table.dimension() {
                warn!(
                    declared_dim,
                    detected_dim = table.dimension(),
                    "Embedding table header disagrees with its rows"
                );
            }
        }
        debug!(
            vocab_size = table.len(),
            dimension = table.dimension(),
            skipped_rows = table.skipped_rows,
            "Embedding table loaded"
        );
        Ok(table)
    }

    /// Build a table from in-memory entries with [`DimensionPolicy::Strict`].
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: AsRef<str>,
    {
        let mut builder = TableBuilder::new("<memory>", DimensionPolicy::Strict);
        for (row, (token, values)) in entries.into_iter().enumerate() {
            builder.push(token.as_ref(), values, row + 1)?;
        }
        builder.finish()
    }

    /// Exact-match lookup.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<ArrayView1<'_, f64>> {
        self.index.get(token).map(|&row| self.vectors.row(row))
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rows dropped under [`DimensionPolicy::Skip`].
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

/// Fields are separated by single ASCII spaces only; a token may itself
/// contain other whitespace such as U+00A0.
fn split_row(line: &str) -> impl Iterator<Item = &str> {
    line.trim_end_matches(['\r', '\n'])
        .split(' ')
        .filter(|field| !field.is_empty())
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let mut fields = split_row(line);
    let vocab = fields.next()?.parse().ok()?;
    let dim = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some((vocab, dim))
}

struct TableBuilder<'a> {
    source: &'a str,
    policy: DimensionPolicy,
    index: HashMap<String, usize>,
    data: Vec<f64>,
    dimension: Option<usize>,
    skipped_rows: usize,
}

impl<'a> TableBuilder<'a> {
    fn new(source: &'a str, policy: DimensionPolicy) -> Self {
        Self {
            source,
            policy,
            index: HashMap::default(),
            data: Vec::new(),
            dimension: None,
            skipped_rows: 0,
        }
    }

    fn push(&mut self, token: &str, values: Vec<f64>, line_no: usize) -> Result<()> {
        let dim = *self.dimension.get_or_insert(values.len());
        if dim == 0 {
            return Err(BovError::format(
                self.source,
                format!("line {line_no}: token {token:?} has no vector values"),
            ));
        }
        if values.len() != dim {
            match self.policy {
                DimensionPolicy::Strict => {
                    return Err(BovError::format(
                        self.source,
                        format!(
                            "line {line_no}: token {token:?} has {} values, expected {dim}",
                            values.len()
                        ),
                    ));
                }
                DimensionPolicy::Skip => {
                    warn!(
                        line = line_no,
                        token,
                        width = values.len(),
                        expected = dim,
                        "Skipping embedding row with mismatched dimension"
                    );
                    self.skipped_rows += 1;
                    return Ok(());
                }
            }
        }

        // later rows win, as a plain dict insert would
        if let Some(&row) = self.index.get(token) {
            self.data[row * dim..(row + 1) * dim].copy_from_slice(&values);
        } else {
            self.index.insert(token.to_owned(), self.index.len());
            self.data.extend_from_slice(&values);
        }
        Ok(())
    }

    fn finish(self) -> Result<VectorTable> {
        let Some(dim) = self.dimension else {
            return Err(BovError::format(
                self.source,
                "embedding table contains no vectors",
            ));
        };
        let vectors = Array2::from_shape_vec((self.index.len(), dim), self.data)
            .map_err(|e| BovError::format(self.source, e.to_string()))?;
        Ok(VectorTable {
            index: self.index,
            vectors,
            skipped_rows: self.skipped_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn load_str(text: &str, policy: DimensionPolicy) -> Result<VectorTable> {
        VectorTable::from_reader(Cursor::new(text), "test", policy)
    }

    #[test]
    fn test_skips_header_and_looks_up_rows() {
        let table = load_str("2 2\ncat 1 2\nsat 3.5 -4\n", DimensionPolicy::Strict).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.dimension(), 2);
        assert_eq!(table.get("cat").unwrap().to_vec(), vec![1.0, 2.0]);
        assert_eq!(table.get("sat").unwrap().to_vec(), vec![3.5, -4.0]);
        assert!(table.get("2").is_none());
    }

    #[test]
    fn test_lookup_is_exact() {
        let table = load_str("1 2\nCat 1 2\n", DimensionPolicy::Strict).unwrap();
        assert!(table.get("cat").is_none());
        assert!(table.get("Cat").is_some());
    }

    #[test]
    fn test_header_is_skipped_even_when_it_looks_like_a_row() {
        let table = load_str("dog 9 9\ncat 1 2\n", DimensionPolicy::Strict).unwrap();
        assert!(table.get("dog").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let table = load_str("2 2\ncat 1 2\n\n   \nsat 3 4\n", DimensionPolicy::Strict).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_token_may_contain_non_ascii_whitespace() {
        let table = load_str(
            "3 2\ncat 1 2\nnew\u{a0}york 3 4\nthin\u{2009}space 5 6 \r\n",
            DimensionPolicy::Strict,
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("new\u{a0}york").unwrap().to_vec(), vec![3.0, 4.0]);
        assert_eq!(table.get("thin\u{2009}space").unwrap().to_vec(), vec![5.0, 6.0]);
        assert!(table.get("new").is_none());
    }

    #[test]
    fn test_repeated_spaces_between_fields() {
        let table = load_str("1 2\ncat  1   2\n", DimensionPolicy::Strict).unwrap();
        assert_eq!(table.get("cat").unwrap().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_strict_policy_rejects_ragged_rows() {
        let err = load_str("2 2\ncat 1 2\nsat 3\n", DimensionPolicy::Strict).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("expected 2"), "{message}");
    }

    #[test]
    fn test_skip_policy_drops_ragged_rows() {
        let table = load_str(
            "3 2\ncat 1 2\nsat 3\nmat 5 6 7\n",
            DimensionPolicy::Skip,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped_rows(), 2);
        assert!(table.get("sat").is_none());
    }

    #[test]
    fn test_unparsable_value_is_format_error() {
        let err = load_str("1 2\ncat 1 abc\n", DimensionPolicy::Strict).unwrap_err();
        assert!(matches!(err, BovError::Format { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_empty_table_is_format_error() {
        assert!(matches!(
            load_str("0 300\n", DimensionPolicy::Strict),
            Err(BovError::Format { .. })
        ));
        assert!(load_str("", DimensionPolicy::Strict).is_err());
    }

    #[test]
    fn test_duplicate_token_keeps_last_row() {
        let table = load_str("2 2\ncat 1 2\ncat 7 8\n", DimensionPolicy::Strict).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("cat").unwrap().to_vec(), vec![7.0, 8.0]);
    }

    #[test]
    fn test_missing_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorTable::load(dir.path().join("absent.txt"), DimensionPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, BovError::Format { .. }));
    }

    #[test]
    fn test_from_entries() {
        let table =
            VectorTable::from_entries([("cat", vec![1.0, 2.0]), ("sat", vec![3.0, 4.0])]).unwrap();
        assert_eq!(table.dimension(), 2);
        assert!(VectorTable::from_entries([("a", vec![1.0]), ("b", vec![1.0, 2.0])]).is_err());
    }
}
