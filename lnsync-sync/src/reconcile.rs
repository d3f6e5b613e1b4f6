//! Startup reconciliation of the destination directory.
//!
//! Runs once, before live events are consumed:
//! 1. List direct children of every source directory into a
//!    name → source map (a later source shadows an earlier one).
//! 2. List the destination; delete every symlink whose target no longer
//!    resolves.
//!
//! Regular files, directories and resolving links are left alone, and
//! missing links are never created here. Any listing failure is fatal.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// What a reconcile pass saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Base name → source directory that last provided it.
    pub names: BTreeMap<OsString, PathBuf>,
    /// Broken links removed from the destination.
    pub pruned: Vec<PathBuf>,
    /// Destination entries left untouched.
    pub kept: usize,
}

/// Prune broken links from `destination`.
pub fn reconcile<P: AsRef<Path>>(
    sources: &[P],
    destination: &Path,
) -> Result<ReconcileReport, SyncError> {
    let names = source_names(sources)?;

    let mut pruned = Vec::new();
    let mut kept = 0usize;
    for entry in list_dir(destination)? {
        let path = destination.join(&entry);
        if is_broken_link(&path)? {
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
            tracing::info!(link = %path.display(), "unresolved link deleted");
            pruned.push(path);
        } else {
            kept += 1;
        }
    }

    tracing::info!(
        destination = %destination.display(),
        sources = sources.len(),
        names = names.len(),
        pruned = pruned.len(),
        kept,
        "reconcile finished",
    );

    Ok(ReconcileReport {
        names,
        pruned,
        kept,
    })
}

/// Map every direct child name across `sources` to the directory holding it.
///
/// Sources are scanned in order, so the last directory to contain a name owns it.
pub fn source_names<P: AsRef<Path>>(
    sources: &[P],
) -> Result<BTreeMap<OsString, PathBuf>, SyncError> {
    let mut names = BTreeMap::new();
    for source in sources {
        let source = source.as_ref();
        for name in list_dir(source)? {
            if let Some(previous) = names.insert(name.clone(), source.to_path_buf()) {
                tracing::debug!(
                    name = %name.to_string_lossy(),
                    shadowed = %previous.display(),
                    owner = %source.display(),
                    "name present in several sources",
                );
            }
        }
    }
    Ok(names)
}

/// `true` when `path` is a symlink whose target cannot be resolved.
pub fn is_broken_link(path: &Path) -> Result<bool, SyncError> {
    let meta = fs::symlink_metadata(path).map_err(|e| io_err(path, e))?;
    if !meta.file_type().is_symlink() {
        return Ok(false);
    }
    Ok(fs::canonicalize(path).is_err())
}

/// Sorted names of the direct children of `dir`.
fn list_dir(dir: &Path) -> Result<Vec<OsString>, SyncError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
