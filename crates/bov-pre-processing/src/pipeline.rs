use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    corpus::{self, Document},
    error::{BovError, Result},
    matrix::{self, CorpusMatrix, DocumentVector},
    pre_processor::{aggregate_orders, tokenize, Aggregate, BuildParams, NgramOrder, VectorTable},
    progress::{NoProgress, ProgressObserver, ProgressTracker},
};

/// Minimum number of documents before aggregation moves to the rayon pool
const MIN_DOCS_FOR_PARALLEL: usize = 64;

/// Turns a sorted document list into one [`CorpusMatrix`] per n-gram order.
pub struct CorpusMatrixBuilder<'a> {
    table: &'a VectorTable,
    params: &'a BuildParams,
    observer: &'a dyn ProgressObserver,
}

impl<'a> CorpusMatrixBuilder<'a> {
    #[must_use]
    pub fn new(table: &'a VectorTable, params: &'a BuildParams) -> Self {
        Self {
            table,
            params,
            observer: &NoProgress,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Row `i` of every returned matrix belongs to `documents[i]`.
    ///
    /// Each document is read and tokenized once; all orders come from a
    /// single running sum. An unreadable document fails the whole build.
    pub fn build(&self, documents: &[Document]) -> Result<BTreeMap<NgramOrder, CorpusMatrix>> {
        self.params.validate()?;
        let max_order = self.params.max_order();
        info!(
            num_documents = documents.len(),
            max_order,
            dimension = self.table.dimension(),
            "Building corpus matrices"
        );

        let tracker = ProgressTracker::new(self.observer, documents.len());
        let per_document: Vec<Vec<Aggregate>> = if self.should_use_parallel(documents) {
            debug!("Using parallel aggregation");
            documents
                .par_iter()
                .map(|doc| self.vectorize(doc, &tracker))
                .collect::<Result<_>>()?
        } else {
            debug!("Using sequential aggregation");
            documents
                .iter()
                .map(|doc| self.vectorize(doc, &tracker))
                .collect::<Result<_>>()?
        };
        tracker.finish();

        let mut columns: Vec<Vec<DocumentVector>> = (0..max_order)
            .map(|_| Vec::with_capacity(documents.len()))
            .collect();
        for (doc, aggregates) in documents.iter().zip(per_document) {
            for (column, agg) in columns.iter_mut().zip(aggregates) {
                column.push(DocumentVector {
                    vector: agg.vector,
                    label: doc.label().clone(),
                    match_count: agg.match_count,
                });
            }
        }

        let mut matrices = BTreeMap::new();
        for (order, rows) in self.params.orders().zip(columns) {
            let matrix = CorpusMatrix::from_rows(order, self.table.dimension(), rows)?;
            if matrix.empty_rows() > 0 {
                warn!(
                    order,
                    empty_rows = matrix.empty_rows(),
                    "Documents matched nothing in the embedding table and got zero vectors"
                );
            }
            matrices.insert(order, matrix);
        }
        Ok(matrices)
    }

    /// Parallel only pays off once there are enough documents to spread
    /// over the pool.
    #[inline]
    fn should_use_parallel(&self, documents: &[Document]) -> bool {
        self.params.parallel() && documents.len() >= MIN_DOCS_FOR_PARALLEL
    }

    fn vectorize(&self, doc: &Document, tracker: &ProgressTracker<'_>) -> Result<Vec<Aggregate>> {
        let text = doc.read()?;
        let tokens = tokenize(&text);
        let aggregates = aggregate_orders(&tokens, self.table, self.params.max_order());
        tracker.tick();
        Ok(aggregates)
    }
}

/// Outcome of one n-gram order.
#[derive(Clone, Debug, Serialize)]
pub struct OrderReport {
    pub order: NgramOrder,
    pub path: PathBuf,
    /// Documents whose vector is all zeros at this order.
    pub empty_rows: usize,
    /// False when the file was deleted as identical to the lower order.
    pub kept: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildReport {
    pub num_documents: usize,
    pub dimension: usize,
    pub vocab_size: usize,
    pub skipped_table_rows: usize,
    pub orders: Vec<OrderReport>,
}

impl BuildReport {
    pub fn kept_orders(&self) -> impl Iterator<Item = NgramOrder> + '_ {
        self.orders.iter().filter(|o| o.kept).map(|o| o.order)
    }
}

/// Load the table, then run [`run_with_table`].
///
/// The input directory and params are checked before the (slow) table load.
pub fn run(
    model: impl AsRef<Path>,
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    params: &BuildParams,
    observer: &dyn ProgressObserver,
) -> Result<BuildReport> {
    params.validate()?;
    let input_dir = input_dir.as_ref();
    if !input_dir.is_dir() {
        return Err(BovError::Config(format!(
            "input directory does not exist: {}",
            input_dir.display()
        )));
    }

    info!(model = %model.as_ref().display(), "Loading embedding table");
    let table = VectorTable::load(model, params.dimension_policy())?;
    run_with_table(&table, input_dir, output_dir, params, observer)
}

/// Discover documents, build every order, write the matrices and prune the
/// redundant ones. No file is written unless every document was processed,
/// and a failed write leaves none of this run's matrices behind.
pub fn run_with_table(
    table: &VectorTable,
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    params: &BuildParams,
    observer: &dyn ProgressObserver,
) -> Result<BuildReport> {
    let output_dir = output_dir.as_ref();
    let documents = corpus::discover(input_dir)?;
    if documents.is_empty() {
        warn!("Corpus contains no documents; matrices will only hold headers");
    }

    let matrices = CorpusMatrixBuilder::new(table, params)
        .with_observer(observer)
        .build(&documents)?;

    fs::create_dir_all(output_dir).map_err(|e| BovError::io(output_dir, e))?;
    let files: BTreeMap<NgramOrder, PathBuf> = matrices
        .keys()
        .map(|&order| (order, output_dir.join(params.file_name(order))))
        .collect();
    matrix::write_all(matrices.iter().map(|(order, matrix)| (matrix, &files[order])))?;

    let kept = matrix::prune(&files)?;
    let orders = matrices
        .iter()
        .map(|(&order, matrix)| OrderReport {
            order,
            path: files[&order].clone(),
            empty_rows: matrix.empty_rows(),
            kept: kept.contains(&order),
        })
        .collect();

    info!(
        num_documents = documents.len(),
        kept = ?kept,
        "Bag of vectors complete"
    );
    Ok(BuildReport {
        num_documents: documents.len(),
        dimension: table.dimension(),
        vocab_size: table.len(),
        skipped_table_rows: table.skipped_rows(),
        orders,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::progress::ProgressUpdate;

    fn cat_sat() -> VectorTable {
        VectorTable::from_entries([("cat", vec![1.0, 2.0]), ("sat", vec![3.0, 4.0])]).unwrap()
    }

    fn write_corpus(docs: &[(&str, &str)]) -> (tempfile::TempDir, Vec<Document>) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, text) in docs {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, text).unwrap();
        }
        let documents = corpus::discover(dir.path()).unwrap();
        (dir, documents)
    }

    #[test]
    fn test_one_row_per_document() {
        let (_dir, docs) = write_corpus(&[("pos/a", "cat sat"), ("neg/b", "dog"), ("neg/c", "")]);
        let params = BuildParams::new(2).unwrap();
        let matrices = CorpusMatrixBuilder::new(&cat_sat(), &params)
            .build(&docs)
            .unwrap();

        assert_eq!(matrices.len(), 2);
        for matrix in matrices.values() {
            assert_eq!(matrix.num_examples(), 3);
            assert_eq!(matrix.dimension(), 2);
            let labels: Vec<_> = matrix.labels().iter().map(|l| l.as_str()).collect();
            assert_eq!(labels, vec!["neg", "neg", "pos"]);
            assert_eq!(matrix.empty_rows(), 2);
        }
        assert_eq!(matrices[&1].row(2).to_vec(), vec![2.0, 3.0]);
        assert_eq!(matrices[&1].row(0).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let docs: Vec<(String, String)> = (0..150)
            .map(|i| {
                let class = if i % 2 == 0 { "even" } else { "odd" };
                let text = match i % 3 {
                    0 => "cat sat cat",
                    1 => "sat dog",
                    _ => "cat",
                };
                (format!("{class}/doc{i:03}"), text.to_owned())
            })
            .collect();
        let docs_ref: Vec<(&str, &str)> =
            docs.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
        let (_dir, docs) = write_corpus(&docs_ref);
        let table = cat_sat();

        let parallel = BuildParams::new(3).unwrap();
        let sequential = BuildParams::new(3).unwrap().with_parallel(false);
        let a = CorpusMatrixBuilder::new(&table, &parallel).build(&docs).unwrap();
        let b = CorpusMatrixBuilder::new(&table, &sequential)
            .build(&docs)
            .unwrap();

        for order in 1..=3 {
            assert_eq!(a[&order].to_bytes(), b[&order].to_bytes());
        }
    }

    #[test]
    fn test_observer_sees_every_document() {
        struct Count(AtomicUsize);
        impl ProgressObserver for Count {
            fn on_progress(&self, update: ProgressUpdate) {
                self.0.fetch_max(update.completed, Ordering::Relaxed);
            }
        }

        let (_dir, docs) = write_corpus(&[("a/1", "cat"), ("a/2", "sat"), ("b/3", "cat")]);
        let params = BuildParams::new(1).unwrap();
        let counter = Count(AtomicUsize::new(0));
        let table = cat_sat();
        CorpusMatrixBuilder::new(&table, &params)
            .with_observer(&counter)
            .build(&docs)
            .unwrap();
        assert_eq!(counter.0.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_unreadable_document_aborts_build() {
        let (dir, mut docs) = write_corpus(&[("pos/a", "cat")]);
        docs.push(Document::new(dir.path().join("pos").join("missing")).unwrap());
        let params = BuildParams::new(1).unwrap();

        let err = CorpusMatrixBuilder::new(&cat_sat(), &params)
            .build(&docs)
            .unwrap_err();
        assert!(matches!(err, BovError::Format { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_run_prunes_redundant_order() {
        let (dir, _) = write_corpus(&[("pos/a", "cat sat"), ("neg/b", "dog")]);
        let out = tempfile::tempdir().unwrap();
        let params = BuildParams::new(2).unwrap();

        let report =
            run_with_table(&cat_sat(), dir.path(), out.path(), &params, &NoProgress).unwrap();

        assert_eq!(report.num_documents, 2);
        assert_eq!(report.kept_orders().collect::<Vec<_>>(), vec![1]);
        assert!(out.path().join("bov_ng1").exists());
        assert!(!out.path().join("bov_ng2").exists());
        assert_eq!(
            fs::read_to_string(out.path().join("bov_ng1")).unwrap(),
            "2 2\nd1\td2\tclass_atr\n0.0\t0.0\tneg\n2.0\t3.0\tpos\n"
        );
    }

    #[test]
    fn test_failed_write_leaves_no_partial_set() {
        let (dir, _) = write_corpus(&[("pos/a", "cat sat"), ("neg/b", "dog")]);
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("bov_ng1"), "stale").unwrap();
        let blocker = out.path().join("bov_ng2");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();
        let params = BuildParams::new(2).unwrap();

        let err = run_with_table(&cat_sat(), dir.path(), out.path(), &params, &NoProgress)
            .unwrap_err();

        assert!(matches!(err, BovError::Io { .. }));
        let entries: Vec<_> = fs::read_dir(out.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["bov_ng2"]);
    }

    #[test]
    fn test_run_rejects_missing_input_before_loading_model() {
        let out = tempfile::tempdir().unwrap();
        let params = BuildParams::new(1).unwrap();
        // the model does not exist either; the input check must fire first
        let err = run(
            out.path().join("model.txt"),
            out.path().join("corpus"),
            out.path(),
            &params,
            &NoProgress,
        )
        .unwrap_err();
        assert!(matches!(err, BovError::Config(_)));
    }
}
