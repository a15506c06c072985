//! Parallel page building.
//!
//! The page list is split into contiguous chunks of balanced size and each
//! chunk is handed to its own worker thread, which builds the chunk's pages
//! in order. Workers share nothing but a single lock for filesystem-structure
//! mutation. A failing page never stops its siblings: every outcome is
//! collected and failures are reported together once all workers are done.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use rayon::prelude::*;

use crate::page::RenderError;

/// Split `items` into at most `n` contiguous chunks of balanced size.
///
/// The chunk count is `ceil(len / ceil(len / n))`, which may be fewer than
/// `n` for short lists. Sizes differ by at most one, larger chunks first.
/// Concatenating the chunks reproduces `items`. An `n` of zero is treated as
/// one.
///
/// # Examples
///
/// ```
/// use docsmith_site::partition;
///
/// let pages: Vec<u32> = (0..10).collect();
/// let sizes: Vec<usize> = partition(&pages, 4).iter().map(|c| c.len()).collect();
/// assert_eq!(sizes, vec![3, 3, 2, 2]);
///
/// // Short lists use fewer chunks than requested.
/// assert_eq!(partition(&pages[..3], 8).len(), 3);
/// ```
#[must_use]
pub fn partition<T>(items: &[T], n: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }
    let n = n.max(1);
    let chunk_size = items.len().div_ceil(n);
    let count = items.len().div_ceil(chunk_size);
    let base = items.len() / count;
    let extra = items.len() % count;

    let mut chunks = Vec::with_capacity(count);
    let mut rest = items;
    for i in 0..count {
        let size = if i < extra { base + 1 } else { base };
        let (chunk, tail) = rest.split_at(size);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// A page that failed to build.
#[derive(Debug)]
pub struct PageFailure {
    /// Markup source of the page.
    pub source_path: PathBuf,
    /// URL path of the page.
    pub url_path: String,
    pub error: RenderError,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_path.display(), self.error)
    }
}

impl std::error::Error for PageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Every page failure of one parallel build.
#[derive(Debug)]
pub struct WorkerFailure {
    failures: Vec<PageFailure>,
    total: usize,
}

impl WorkerFailure {
    /// Wrap `failures` out of `total` pages, or `None` if nothing failed.
    #[must_use]
    pub fn from_failures(failures: Vec<PageFailure>, total: usize) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures, total })
        }
    }

    /// Failed pages in build order.
    #[must_use]
    pub fn failures(&self) -> &[PageFailure] {
        &self.failures
    }

    /// Number of pages in the build.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} pages failed to build:",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkerFailure {}

/// Outcome of a parallel build with partial failures.
#[derive(Debug)]
pub struct PartialBuild<R> {
    /// Results of pages that built successfully, in build order.
    pub built: Vec<R>,
    /// Pages that failed, in build order.
    pub failures: Vec<PageFailure>,
}

impl<R> Default for PartialBuild<R> {
    fn default() -> Self {
        Self {
            built: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<R> PartialBuild<R> {
    /// Total number of pages attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.built.len() + self.failures.len()
    }

    /// Succeed only if no page failed.
    pub fn into_result(self) -> Result<Vec<R>, WorkerFailure> {
        let total = self.total();
        match WorkerFailure::from_failures(self.failures, total) {
            Some(failure) => Err(failure),
            None => Ok(self.built),
        }
    }
}

/// Runs page builds on a pool of worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildScheduler {
    workers: usize,
}

impl BuildScheduler {
    /// Scheduler with at most `workers` threads (zero means one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Build every item, one chunk per worker.
    ///
    /// `build` receives the item and the shared lock. It should hold the lock
    /// only around filesystem-structure changes such as creating output
    /// directories. Blocks until every worker has finished its chunk.
    pub fn run<T, R, F>(
        &self,
        items: &[T],
        build: F,
    ) -> Result<PartialBuild<R>, rayon::ThreadPoolBuildError>
    where
        T: Sync,
        R: Send,
        F: Fn(&T, &Mutex<()>) -> Result<R, PageFailure> + Sync,
    {
        let chunks = partition(items, self.workers);
        if chunks.is_empty() {
            return Ok(PartialBuild::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(chunks.len())
            .thread_name(|i| format!("docsmith-build-{i}"))
            .build()?;
        let lock = Mutex::new(());

        let outcomes: Vec<Vec<Result<R, PageFailure>>> = pool.install(|| {
            chunks
                .par_iter()
                .with_max_len(1)
                .map(|chunk| chunk.iter().map(|item| build(item, &lock)).collect())
                .collect()
        });

        let mut partial = PartialBuild {
            built: Vec::with_capacity(items.len()),
            failures: Vec::new(),
        };
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(built) => partial.built.push(built),
                Err(failure) => partial.failures.push(failure),
            }
        }

        tracing::debug!(
            items = items.len(),
            chunks = chunks.len(),
            failed = partial.failures.len(),
            "Parallel build finished"
        );
        Ok(partial)
    }
}
