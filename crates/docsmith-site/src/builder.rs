//! Site builder: full builds, scoped page rebuilds and staged full rebuilds.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use docsmith_assets::{AssetReport, AssetSync};
use docsmith_renderer::{PageTemplate, ParserConfig};

use crate::error::BuildError;
use crate::page::{PageRenderer, RenderError, write_page};
use crate::scheduler::{BuildScheduler, PageFailure, WorkerFailure, partition};
use crate::site_config::SiteConfig;
use crate::tree::{NavItem, NodeId, NodeTree};

/// Summary of a completed build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildReport {
    /// Pages written.
    pub pages: usize,
    /// Worker chunks the pages were split into.
    pub chunks: usize,
    pub assets: AssetReport,
    pub elapsed: Duration,
}

/// Owns one navigation tree and everything needed to (re)build its pages.
///
/// The tree is scanned once in [`Builder::new`]. Page rebuilds reuse it;
/// [`Builder::rebuild_all`] replaces the whole builder.
#[derive(Debug)]
pub struct Builder {
    config: SiteConfig,
    tree: NodeTree,
    navigation: Vec<NavItem>,
    renderer: PageRenderer,
    assets: AssetSync,
    rendered: HashMap<NodeId, String>,
}

impl Builder {
    /// Validate the configuration and scan the content tree.
    ///
    /// Nothing is written until [`build`](Self::build).
    pub fn new(config: SiteConfig) -> Result<Self, BuildError> {
        let parser = ParserConfig::from_extensions(&config.markdown)?;
        let template = PageTemplate::load(&config.templates_dir, &config.template)?;
        let tree = NodeTree::scan(&config.content_dir, &config.tree, &parser)?;
        let navigation = tree.navigation();
        let assets = AssetSync::new(config.assets.roots.clone(), config.assets.dirs.clone());

        tracing::debug!(
            nodes = tree.len(),
            pages = tree.pages().len(),
            template = template.name(),
            "Navigation tree built"
        );
        let renderer = PageRenderer::new(parser, template, config.live_reload);

        Ok(Self {
            config,
            tree,
            navigation,
            renderer,
            assets,
            rendered: HashMap::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    #[must_use]
    pub fn assets(&self) -> &AssetSync {
        &self.assets
    }

    /// Last rendered HTML of a page, `None` before its first build.
    #[must_use]
    pub fn rendered_content(&self, id: NodeId) -> Option<&str> {
        self.rendered.get(&id).map(String::as_str)
    }

    /// Build every page in parallel, then merge assets into the output.
    ///
    /// Page failures do not stop other pages. They are reported together as
    /// [`BuildError::Workers`] once everything else has been written.
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        let dest = self.config.site_dir.clone();
        self.build_into(&dest)
    }

    fn build_into(&mut self, dest: &Path) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        fs::create_dir_all(dest).map_err(|e| BuildError::io(dest, e))?;

        let scheduler = BuildScheduler::new(self.config.threads);
        let pages = self.tree.pages();
        let chunks = partition(pages, scheduler.workers()).len();

        let tree = &self.tree;
        let navigation = &self.navigation;
        let renderer = &self.renderer;
        let partial = scheduler.run(pages, |&id, lock| {
            let html = renderer
                .render(tree, navigation, id)
                .map_err(|e| page_failure(tree, id, e))?;
            write_page(dest, tree.node(id), &html, lock).map_err(|e| page_failure(tree, id, e))?;
            Ok((id, html))
        })?;

        let total = partial.total();
        let written = partial.built.len();
        self.rendered.extend(partial.built);

        let assets = self.assets.sync(dest)?;
        if let Some(failure) = WorkerFailure::from_failures(partial.failures, total) {
            return Err(failure.into());
        }

        let report = BuildReport {
            pages: written,
            chunks,
            assets,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            pages = report.pages,
            chunks = report.chunks,
            assets = report.assets.files_copied,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            dest = %dest.display(),
            "Site built"
        );
        Ok(report)
    }

    /// Re-render one page in place using the existing tree.
    ///
    /// The page is rendered completely before its output file is replaced,
    /// so a failure leaves the previous output untouched. No other page and
    /// no tree structure is affected.
    pub fn rebuild_page(&mut self, id: NodeId) -> Result<(), BuildError> {
        let node = self.tree.node(id);
        let html = self
            .renderer
            .render(&self.tree, &self.navigation, id)
            .map_err(|e| page_failure(&self.tree, id, e))?;
        write_page(&self.config.site_dir, node, &html, &Mutex::new(()))
            .map_err(|e| page_failure(&self.tree, id, e))?;

        tracing::info!(page = %node.url_path(), "Page rebuilt");
        self.rendered.insert(id, html);
        Ok(())
    }

    /// Discard the tree and build a fresh site from `config`.
    ///
    /// The new site is built in a staging directory next to the output and
    /// swapped in only when every step succeeded. On failure the current
    /// output and builder stay as they were.
    pub fn rebuild_all(&mut self, config: SiteConfig) -> Result<BuildReport, BuildError> {
        let site_dir = config.site_dir.clone();
        let staging = staging_dir(&site_dir);
        remove_dir_if_exists(&staging)?;

        let mut next = Self::new(config)?;
        let report = match next.build_into(&staging) {
            Ok(report) => report,
            Err(e) => {
                if let Err(cleanup) = remove_dir_if_exists(&staging) {
                    tracing::warn!(error = %cleanup, "Failed to remove staging directory");
                }
                return Err(e);
            }
        };

        swap_in(&staging, &site_dir)?;

        *self = next;
        tracing::info!(pages = report.pages, "Site rebuilt");
        Ok(report)
    }

    /// Re-merge a single asset root into the output.
    pub fn sync_assets(&self, root: usize) -> Result<AssetReport, BuildError> {
        Ok(self.assets.sync_root(&self.config.site_dir, root)?)
    }
}

fn page_failure(tree: &NodeTree, id: NodeId, error: RenderError) -> PageFailure {
    let node = tree.node(id);
    PageFailure {
        source_path: node.source_path().map(Path::to_path_buf).unwrap_or_default(),
        url_path: node.url_path().to_owned(),
        error,
    }
}

/// `<site_dir>.staging`, a sibling of the output directory.
fn staging_dir(site_dir: &Path) -> PathBuf {
    sibling(site_dir, ".staging")
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    dir.with_file_name(name)
}

/// Replace `site_dir` with `staging` by two renames.
///
/// The old output is moved aside to `<site_dir>.old` and restored if the
/// staged tree cannot take its place. It is deleted only after the swap.
fn swap_in(staging: &Path, site_dir: &Path) -> Result<(), BuildError> {
    let old = sibling(site_dir, ".old");
    remove_dir_if_exists(&old)?;

    let had_output = match fs::rename(site_dir, &old) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(BuildError::io(site_dir, e)),
    };

    if let Err(e) = fs::rename(staging, site_dir) {
        if had_output && let Err(restore) = fs::rename(&old, site_dir) {
            tracing::error!(
                path = %old.display(),
                error = %restore,
                "Failed to restore previous output"
            );
        }
        return Err(BuildError::io(site_dir, e));
    }

    if had_output && let Err(e) = remove_dir_if_exists(&old) {
        tracing::warn!(error = %e, "Failed to remove previous output");
    }
    Ok(())
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(dir, e)),
    }
}
