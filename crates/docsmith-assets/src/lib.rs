//! Static asset merging for docsmith sites.
//!
//! Copies asset subdirectories (`js/`, `css/`, `media/`, ...) from several
//! source roots into the site output. Roots are applied in priority order:
//! when two roots provide the same relative path, the later root wins.
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! use docsmith_assets::AssetSync;
//!
//! let sync = AssetSync::new(
//!     vec![PathBuf::from("theme"), PathBuf::from(".")],
//!     vec!["css".to_owned(), "js".to_owned()],
//! );
//! let report = sync.sync(Path::new("site"))?;
//! println!("{} files copied", report.files_copied);
//! # Ok::<(), docsmith_assets::AssetError>(())
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error returned by asset synchronization.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Filesystem operation failed.
    #[error("Asset I/O error at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Root index out of range.
    #[error("Unknown asset root index {0}")]
    UnknownRoot(usize),
}

impl AssetError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Summary of one synchronization pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssetReport {
    /// Files written to the destination.
    pub files_copied: usize,
    /// Files skipped because a later root provides them.
    pub files_shadowed: usize,
}

/// Merges asset subdirectories from ordered source roots into one destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSync {
    roots: Vec<PathBuf>,
    subdirs: Vec<String>,
}

impl AssetSync {
    /// Create a synchronizer for `roots` (lowest priority first) and the
    /// subdirectory names to merge from each root.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, subdirs: Vec<String>) -> Self {
        Self { roots, subdirs }
    }

    /// Source roots in priority order.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Subdirectory names merged from every root.
    #[must_use]
    pub fn subdirs(&self) -> &[String] {
        &self.subdirs
    }

    /// Copy every subdirectory of every root into `dest`.
    ///
    /// Existing destination files are overwritten. Source subdirectories that
    /// do not exist are skipped. Running this twice over unchanged sources
    /// leaves the destination byte-identical.
    pub fn sync(&self, dest: &Path) -> Result<AssetReport, AssetError> {
        let mut report = AssetReport::default();
        for subdir in &self.subdirs {
            for root in &self.roots {
                copy_tree(
                    &root.join(subdir),
                    &dest.join(subdir),
                    &HashSet::new(),
                    &mut report,
                )?;
            }
        }
        tracing::debug!(
            files = report.files_copied,
            roots = self.roots.len(),
            "Assets synchronized"
        );
        Ok(report)
    }

    /// Re-copy a single root into `dest`.
    ///
    /// Files also provided by a later root are left alone, so the override
    /// order of a full [`sync`](Self::sync) is preserved.
    pub fn sync_root(&self, dest: &Path, index: usize) -> Result<AssetReport, AssetError> {
        let root = self.roots.get(index).ok_or(AssetError::UnknownRoot(index))?;
        let later = &self.roots[index + 1..];

        let mut report = AssetReport::default();
        for subdir in &self.subdirs {
            let mut shadowed = HashSet::new();
            for other in later {
                let base = other.join(subdir);
                collect_files(&base, &base, &mut shadowed)?;
            }
            copy_tree(&root.join(subdir), &dest.join(subdir), &shadowed, &mut report)?;
        }
        tracing::debug!(
            root = %root.display(),
            files = report.files_copied,
            shadowed = report.files_shadowed,
            "Asset root synchronized"
        );
        Ok(report)
    }
}

/// Recursively copy `src` into `dst`, skipping relative paths in `skip`.
fn copy_tree(
    src: &Path,
    dst: &Path,
    skip: &HashSet<PathBuf>,
    report: &mut AssetReport,
) -> Result<(), AssetError> {
    if !src.is_dir() {
        return Ok(());
    }

    let mut files = HashSet::new();
    collect_files(src, src, &mut files)?;
    let mut files: Vec<_> = files.into_iter().collect();
    files.sort();

    for relative in files {
        if skip.contains(&relative) {
            report.files_shadowed += 1;
            continue;
        }
        let from = src.join(&relative);
        let to = dst.join(&relative);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
        }
        fs::copy(&from, &to).map_err(|e| AssetError::io(&from, e))?;
        report.files_copied += 1;
    }

    Ok(())
}

/// Collect file paths under `dir` relative to `base`.
///
/// A missing `dir` yields nothing.
fn collect_files(base: &Path, dir: &Path, files: &mut HashSet<PathBuf>) -> Result<(), AssetError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).map_err(|e| AssetError::io(dir, e))? {
        let entry = entry.map_err(|e| AssetError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            files.insert(relative.to_path_buf());
        }
    }
    Ok(())
}
