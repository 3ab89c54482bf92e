//! Labeled document-vector matrices and their tab-separated file format.
//!
//! ```text
//! <num_examples> <dimension>
//! d1<TAB>d2<TAB>...<TAB>dD<TAB>class_atr
//! <v1><TAB>...<TAB><vD><TAB><label>
//! ```

mod dedup;

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use ndarray::{Array1, Array2, ArrayView1};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub use dedup::{files_identical, prune, prune_in_memory};

use crate::{
    corpus::ClassLabel,
    error::{BovError, Result},
    pre_processor::NgramOrder,
};

/// Name of the trailing label column.
pub const CLASS_COLUMN: &str = "class_atr";

/// One document's averaged vector and its class.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentVector {
    pub vector: Array1<f64>,
    pub label: ClassLabel,
    pub match_count: usize,
}

/// Document vectors for one n-gram order, in sorted document order.
#[derive(Clone, Debug, PartialEq)]
pub struct CorpusMatrix {
    order: NgramOrder,
    values: Array2<f64>,
    labels: Vec<ClassLabel>,
    match_counts: Vec<usize>,
}

impl CorpusMatrix {
    pub fn from_rows<I>(order: NgramOrder, dimension: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = DocumentVector>,
    {
        let rows = rows.into_iter();
        let mut data = Vec::with_capacity(rows.size_hint().0 * dimension);
        let mut labels = Vec::with_capacity(rows.size_hint().0);
        let mut match_counts = Vec::with_capacity(rows.size_hint().0);

        for row in rows {
            if row.vector.len() != dimension {
                return Err(BovError::format(
                    format!("matrix for order {order}"),
                    format!(
                        "row {} has {} values, expected {dimension}",
                        labels.len() + 1,
                        row.vector.len()
                    ),
                ));
            }
            data.extend(row.vector.iter().copied());
            labels.push(row.label);
            match_counts.push(row.match_count);
        }

        let values = Array2::from_shape_vec((labels.len(), dimension), data)
            .map_err(|e| BovError::format(format!("matrix for order {order}"), e.to_string()))?;
        Ok(Self {
            order,
            values,
            labels,
            match_counts,
        })
    }

    #[must_use]
    pub fn num_examples(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.ncols()
    }

    #[must_use]
    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(idx)
    }

    #[must_use]
    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    /// Rows whose document matched nothing in the embedding table.
    #[must_use]
    pub fn empty_rows(&self) -> usize {
        self.match_counts.iter().filter(|&&count| count == 0).count()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{} {}", self.num_examples(), self.dimension())?;
        for dim in 1..=self.dimension() {
            write!(writer, "d{dim}\t")?;
        }
        writeln!(writer, "{CLASS_COLUMN}")?;

        for (row, label) in self.values.outer_iter().zip(&self.labels) {
            for value in row {
                write!(writer, "{}\t", format_value(*value))?;
            }
            writeln!(writer, "{label}")?;
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Serialize into a temporary file next to `path`, so `path` never
    /// holds a partial matrix. Nothing appears under `path` until
    /// [`StagedMatrix::commit`]; dropping the stage removes the temporary
    /// file.
    pub fn stage(&self, path: impl AsRef<Path>) -> Result<StagedMatrix> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| BovError::io(dir, e))?;

        let mut tmp = temp_file_builder()
            .tempfile_in(dir)
            .map_err(|e| BovError::io(dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut writer)
                .and_then(|()| writer.flush())
                .map_err(|e| BovError::io(path, e))?;
        }
        Ok(StagedMatrix {
            tmp,
            path: path.to_path_buf(),
            order: self.order,
            rows: self.num_examples(),
        })
    }
}

/// A serialized matrix waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedMatrix {
    tmp: NamedTempFile,
    path: PathBuf,
    order: NgramOrder,
    rows: usize,
}

impl StagedMatrix {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(self) -> Result<()> {
        let Self {
            tmp,
            path,
            order,
            rows,
        } = self;
        tmp.persist(&path).map_err(|e| BovError::io(&path, e.error))?;
        debug!(path = %path.display(), order, rows, "Matrix written");
        Ok(())
    }
}

/// Write a set of matrices as a unit.
///
/// Every matrix is staged before any is renamed into place. If a rename
/// fails, the files already committed by this call are removed again, so a
/// failed call never leaves a mix of new and stale matrices.
pub fn write_all<'m, I, P>(matrices: I) -> Result<()>
where
    I: IntoIterator<Item = (&'m CorpusMatrix, P)>,
    P: AsRef<Path>,
{
    let staged = matrices
        .into_iter()
        .map(|(matrix, path)| matrix.stage(path))
        .collect::<Result<Vec<_>>>()?;

    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for matrix in staged {
        let path = matrix.path().to_path_buf();
        if let Err(err) = matrix.commit() {
            for done in &committed {
                if let Err(rm) = fs::remove_file(done) {
                    warn!(path = %done.display(), error = %rm, "Could not roll back matrix");
                }
            }
            return Err(err);
        }
        committed.push(path);
    }
    Ok(())
}

/// Temp files are created with the mode a plain create would get (0o666
/// under the umask) instead of tempfile's private 0o600.
fn temp_file_builder() -> tempfile::Builder<'static, 'static> {
    #[allow(unused_mut)]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
}

/// Shortest representation that round-trips, always with a decimal point
/// or exponent (`2.0`, `0.1`, `1e-7`). Equality of matrices across orders
/// is judged on this text.
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value:?}")
}
