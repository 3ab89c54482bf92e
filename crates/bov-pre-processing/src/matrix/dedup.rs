use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    error::{BovError, Result},
    pre_processor::NgramOrder,
};

/// Delete every matrix file identical to the one of the next-lower order.
///
/// Orders are visited from the highest down to 2 and each adjacent pair is
/// judged on its own; a mismatch does not stop the walk. Returns the orders
/// whose files survive.
pub fn prune(files: &BTreeMap<NgramOrder, PathBuf>) -> Result<BTreeSet<NgramOrder>> {
    walk_down(
        files,
        |current, lower| files_identical(current, lower),
        |order, path| {
            fs::remove_file(path).map_err(|e| BovError::io(path, e))?;
            info!(order, path = %path.display(), "Removed matrix identical to lower order");
            Ok(())
        },
    )
}

/// [`prune`] over serialized matrices held in memory.
pub fn prune_in_memory(serialized: &BTreeMap<NgramOrder, Vec<u8>>) -> BTreeSet<NgramOrder> {
    walk_down(
        serialized,
        |current, lower| Ok(current == lower),
        |_, _| Ok(()),
    )
    .unwrap_or_default()
}

/// Byte-exact comparison of two files, streamed.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let len_a = fs::metadata(a).map_err(|e| BovError::io(a, e))?.len();
    let len_b = fs::metadata(b).map_err(|e| BovError::io(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(File::open(a).map_err(|e| BovError::io(a, e))?);
    let mut reader_b = BufReader::new(File::open(b).map_err(|e| BovError::io(b, e))?);
    loop {
        let chunk_a = reader_a.fill_buf().map_err(|e| BovError::io(a, e))?;
        let chunk_b = reader_b.fill_buf().map_err(|e| BovError::io(b, e))?;
        if chunk_a.is_empty() || chunk_b.is_empty() {
            return Ok(chunk_a.is_empty() && chunk_b.is_empty());
        }
        let n = chunk_a.len().min(chunk_b.len());
        if chunk_a[..n] != chunk_b[..n] {
            return Ok(false);
        }
        reader_a.consume(n);
        reader_b.consume(n);
    }
}

fn walk_down<T, F, D>(
    artifacts: &BTreeMap<NgramOrder, T>,
    mut identical: F,
    mut discard: D,
) -> Result<BTreeSet<NgramOrder>>
where
    F: FnMut(&T, &T) -> Result<bool>,
    D: FnMut(NgramOrder, &T) -> Result<()>,
{
    let mut survivors: BTreeSet<NgramOrder> = artifacts.keys().copied().collect();
    let Some(&max_order) = artifacts.keys().next_back() else {
        return Ok(survivors);
    };
    for order in (2..=max_order).rev() {
        let (Some(current), Some(lower)) = (artifacts.get(&order), artifacts.get(&(order - 1)))
        else {
            continue;
        };
        if identical(current, lower)? {
            discard(order, current)?;
            survivors.remove(&order);
        }
    }
    Ok(survivors)
}
