//! Site build errors.

use std::io;
use std::path::{Path, PathBuf};

use docsmith_assets::AssetError;
use docsmith_config::ConfigError;
use docsmith_renderer::{ParserConfigError, TemplateError};

use crate::scheduler::{PageFailure, WorkerFailure};

/// Error constructing the navigation tree. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum SourceTreeError {
    /// Content root does not exist or is not a directory.
    #[error("Content directory not found: {}", .0.display())]
    MissingContentRoot(PathBuf),
    /// Content root has no index document.
    #[error("Content directory {} has no index document", .0.display())]
    MissingRootIndex(PathBuf),
    /// Directory or source file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Two sources map to the same output location (`b.md` next to `b/index.md`).
    #[error("{} and {} both produce page '{url_path}'", first.display(), second.display())]
    DuplicatePath {
        url_path: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl SourceTreeError {
    pub(crate) fn unreadable(path: &Path, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Error returned by [`Builder`](crate::Builder) operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Source(#[from] SourceTreeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid markdown configuration: {0}")]
    Markdown(#[from] ParserConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// A single page rebuild failed.
    #[error(transparent)]
    Page(#[from] PageFailure),
    /// One or more pages failed; every other page was still built.
    #[error(transparent)]
    Workers(#[from] WorkerFailure),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error("Failed to start build workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Output I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
