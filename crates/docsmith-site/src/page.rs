//! Single page rendering and output.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use docsmith_renderer::{
    Breadcrumb, NavLink, PageContext, PageTemplate, ParserConfig, TemplateError, render,
    root_prefix,
};

use crate::tree::{NavItem, Node, NodeId, NodeTree};

/// Failure to build one page. Never aborts sibling pages.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to read source: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Sections have no source and cannot be rendered.
    #[error("'{0}' is a section without a page")]
    NotRenderable(String),
}

/// Renders tree pages into complete HTML documents.
///
/// Holds the parser configuration and template shared by every page of a
/// build. Immutable, so one instance serves all build workers.
#[derive(Debug)]
pub struct PageRenderer {
    parser: ParserConfig,
    template: PageTemplate,
    live_reload: bool,
}

impl PageRenderer {
    #[must_use]
    pub fn new(parser: ParserConfig, template: PageTemplate, live_reload: bool) -> Self {
        Self {
            parser,
            template,
            live_reload,
        }
    }

    #[must_use]
    pub fn parser(&self) -> &ParserConfig {
        &self.parser
    }

    /// Render page `id` of `tree`.
    ///
    /// `navigation` is the tree's [`NodeTree::navigation`], computed once per
    /// build. The source file is read fresh on every call.
    pub fn render(
        &self,
        tree: &NodeTree,
        navigation: &[NavItem],
        id: NodeId,
    ) -> Result<String, RenderError> {
        let node = tree.node(id);
        let source_path = node
            .source_path()
            .ok_or_else(|| RenderError::NotRenderable(node.url_path().to_owned()))?;
        let source = fs::read_to_string(source_path).map_err(RenderError::Read)?;
        let rendered = render(&source, &self.parser);

        let url_path = node.url_path();
        let breadcrumbs = tree
            .breadcrumbs(id)
            .into_iter()
            .map(|ancestor| {
                let ancestor = tree.node(ancestor);
                Breadcrumb {
                    title: ancestor.title().to_owned(),
                    href: ancestor
                        .is_page()
                        .then(|| relative_href(url_path, ancestor.url_path())),
                }
            })
            .collect();

        let ctx = PageContext {
            title: rendered.title.unwrap_or_else(|| node.title().to_owned()),
            content: rendered.html,
            url_path: url_path.to_owned(),
            root: root_prefix(url_path),
            navigation: nav_links(navigation, url_path),
            breadcrumbs,
            toc: rendered.toc,
            live_reload: self.live_reload,
        };
        Ok(self.template.render(&ctx)?)
    }
}

/// Link from the page at `from` to the page at `to`.
///
/// Pages live in `<url>/index.html`, so links target directories.
fn relative_href(from: &str, to: &str) -> String {
    let mut href = root_prefix(from);
    if !to.is_empty() {
        href.push_str(to);
        href.push('/');
    }
    if href.is_empty() {
        href.push_str("./");
    }
    href
}

fn nav_links(items: &[NavItem], current: &str) -> Vec<NavLink> {
    items
        .iter()
        .map(|item| NavLink {
            title: item.title.clone(),
            href: item
                .has_page
                .then(|| relative_href(current, &item.url_path)),
            active: item.has_page && item.url_path == current,
            children: nav_links(&item.children, current),
        })
        .collect()
}

/// Write a rendered page below `dest`.
///
/// Only directory creation happens under `lock`.
pub(crate) fn write_page(
    dest: &Path,
    node: &Node,
    html: &str,
    lock: &Mutex<()>,
) -> Result<(), RenderError> {
    let path = dest.join(node.output_path());
    if let Some(parent) = path.parent() {
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(parent).map_err(|source| RenderError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    atomic_write(&path, html)
}

/// Replace `path` with `contents` via a temporary sibling and rename, so
/// readers see either the old or the new file.
pub(crate) fn atomic_write(path: &Path, contents: &str) -> Result<(), RenderError> {
    let temp = path.with_extension("html.tmp");
    fs::write(&temp, contents).map_err(|source| RenderError::Write {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, path).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}
