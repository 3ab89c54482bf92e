//! Corpus discovery: `root/<class>/<document>` files in deterministic order.

use std::{
    ffi::OsStr,
    fmt,
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::debug;

use crate::error::{BovError, Result};

/// Class of a document, taken from the directory that holds it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassLabel(String);

impl ClassLabel {
    /// Map a class directory name to its label. Surrounding whitespace is
    /// trimmed; everything else is kept verbatim.
    #[must_use]
    pub fn from_dir_name(name: &OsStr) -> Self {
        Self(name.to_string_lossy().trim().to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    label: ClassLabel,
}

impl Document {
    /// A document labelled by its immediate parent directory.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir_name = path
            .parent()
            .and_then(Path::file_name)
            .ok_or_else(|| {
                BovError::Config(format!(
                    "document {} has no parent directory to take a class from",
                    path.display()
                ))
            })?;
        let label = ClassLabel::from_dir_name(dir_name);
        Ok(Self { path, label })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn label(&self) -> &ClassLabel {
        &self.label
    }

    /// Whole document as text. Any read failure is fatal to the build.
    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| {
            BovError::format(
                self.path.display().to_string(),
                format!("cannot read document: {e}"),
            )
        })
    }
}

/// List every file of every immediate subdirectory of `root`, sorted by
/// full path.
pub fn discover(root: impl AsRef<Path>) -> Result<Vec<Document>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(BovError::Config(format!(
            "input directory does not exist: {}",
            root.display()
        )));
    }

    let mut documents = Vec::new();
    for class_dir in read_dir_paths(root)? {
        if !class_dir.is_dir() {
            debug!(path = %class_dir.display(), "Ignoring non-directory entry in corpus root");
            continue;
        }
        for path in read_dir_paths(&class_dir)? {
            if !path.is_file() {
                debug!(path = %path.display(), "Ignoring non-file entry in class directory");
                continue;
            }
            documents.push(Document::new(path)?);
        }
    }

    sort_documents(&mut documents);
    debug!(
        root = %root.display(),
        num_documents = documents.len(),
        "Corpus discovered"
    );
    Ok(documents)
}

/// Order documents by the byte string of their full path.
///
/// `Path` ordering compares component by component, which puts `a/x`
/// before `a-b/x`; the row order of every matrix depends on plain string
/// order instead.
pub fn sort_documents(documents: &mut [Document]) {
    documents.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
}

fn read_dir_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    fs::read_dir(dir)
        .map_err(|e| BovError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()).map_err(|e| BovError::io(dir, e)))
        .collect()
}
