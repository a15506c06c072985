//! Navigation tree built from the content directory.
//!
//! # Architecture
//!
//! Nodes are stored in a flat `Vec<Node>` and refer to each other by
//! [`NodeId`]. A node's parent is a lookup index, never an owning edge, so the
//! tree has no reference cycles and can be shared freely between build
//! workers. The tree is constructed once by [`NodeTree::scan`] and never
//! mutated afterwards; a structural change means scanning again.
//!
//! Directory layout maps onto the tree as follows:
//! - `index.<ext>` in a directory is that directory's own page
//! - every other markup file is a page child of its directory
//! - a subdirectory with an index document is a page, one without is a section

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use docsmith_renderer::{ParserConfig, extract_title};
use serde::Serialize;

use crate::error::SourceTreeError;

/// Output file written for every page.
const PAGE_FILE: &str = "index.html";

/// Index of a node within its [`NodeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: Self = Self(0);

    /// Position of the node in the tree's arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node represents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Directory without an index document. Navigation only.
    Section,
    /// Renderable page backed by a markup file.
    Page {
        /// Markup source file.
        source_path: PathBuf,
    },
}

/// A node in the navigation tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    name: String,
    title: String,
    url_path: String,
    output_path: PathBuf,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// File or directory name without extension (empty for the root).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display title: first H1 of the source, or derived from the name.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// URL path without leading slash (`""` for root, `"b/c"` when nested).
    #[must_use]
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    /// Output file relative to the destination directory.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Markup source, `None` for sections.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        match &self.kind {
            NodeKind::Page { source_path } => Some(source_path),
            NodeKind::Section => None,
        }
    }

    #[must_use]
    pub fn is_page(&self) -> bool {
        matches!(self.kind, NodeKind::Page { .. })
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in name order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Options controlling which files become pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Markup file extensions without the dot, in index lookup order.
    pub markup_extensions: Vec<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            markup_extensions: vec!["md".to_owned()],
        }
    }
}

impl TreeOptions {
    /// Page name for a markup file (`"a.md"` becomes `"a"`).
    fn markup_stem<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || !self.markup_extensions.iter().any(|e| e == ext) {
            return None;
        }
        Some(stem)
    }

    /// Whether `file_name` is a directory's own index document.
    fn is_reserved(&self, file_name: &str) -> bool {
        file_name == PAGE_FILE
            || file_name
                .strip_prefix("index.")
                .is_some_and(|ext| self.markup_extensions.iter().any(|e| e == ext))
    }

    /// Index document of `dir`, if any.
    fn find_index(&self, dir: &Path) -> Option<PathBuf> {
        self.markup_extensions
            .iter()
            .map(|ext| dir.join(format!("index.{ext}")))
            .find(|path| path.is_file())
    }
}

/// Navigation entry for page templates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub title: String,
    /// URL path without leading slash.
    pub url_path: String,
    /// False for sections, which have no page of their own.
    pub has_page: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}

/// Immutable navigation tree of a content directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeTree {
    content_root: PathBuf,
    nodes: Vec<Node>,
    pages: Vec<NodeId>,
    source_index: HashMap<PathBuf, NodeId>,
}

impl NodeTree {
    /// Scan `content_root` and build the tree.
    ///
    /// Entries are visited in name order at every level, so scanning an
    /// unchanged directory always yields an identical tree. Hidden entries
    /// (starting with `.`) are skipped. Each page source is read once to
    /// extract its title.
    ///
    /// # Errors
    ///
    /// Fails if the content root or its index document is missing, if a
    /// directory or source file cannot be read, or if two sources map to the
    /// same URL path.
    pub fn scan(
        content_root: &Path,
        options: &TreeOptions,
        parser: &ParserConfig,
    ) -> Result<Self, SourceTreeError> {
        if !content_root.is_dir() {
            return Err(SourceTreeError::MissingContentRoot(
                content_root.to_path_buf(),
            ));
        }
        let root_index = options
            .find_index(content_root)
            .ok_or_else(|| SourceTreeError::MissingRootIndex(content_root.to_path_buf()))?;

        let mut scanner = Scanner {
            options,
            parser,
            nodes: Vec::new(),
            origins: HashMap::new(),
        };
        let root = scanner.push(
            None,
            "",
            NodeKind::Page {
                source_path: root_index.clone(),
            },
            &root_index,
        )?;
        scanner.scan_dir(content_root, root)?;

        Ok(Self::from_nodes(content_root.to_path_buf(), scanner.nodes))
    }

    fn from_nodes(content_root: PathBuf, nodes: Vec<Node>) -> Self {
        let mut pages = Vec::new();
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = &nodes[id.0];
            if node.is_page() {
                pages.push(id);
            }
            stack.extend(node.children.iter().rev());
        }

        let source_index = nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.source_path().map(|p| (p.to_path_buf(), NodeId(i))))
            .collect();

        Self {
            content_root,
            nodes,
            pages,
            source_index,
        }
    }

    /// Directory the tree was scanned from.
    #[must_use]
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different tree and is out of range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Renderable nodes in pre-order, root first. This is the build order.
    #[must_use]
    pub fn pages(&self) -> &[NodeId] {
        &self.pages
    }

    /// Find the page whose source file is `path`.
    #[must_use]
    pub fn find_by_source(&self, path: &Path) -> Option<NodeId> {
        self.source_index.get(path).copied()
    }

    /// Ancestors of `id`, root first, excluding `id` itself.
    #[must_use]
    pub fn breadcrumbs(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            ancestors.push(ancestor);
            current = self.parent(ancestor);
        }
        ancestors.reverse();
        ancestors
    }

    /// Navigation entries below the root.
    ///
    /// Sections with no page anywhere beneath them are left out.
    #[must_use]
    pub fn navigation(&self) -> Vec<NavItem> {
        self.nav_items(NodeId::ROOT)
    }

    fn nav_items(&self, id: NodeId) -> Vec<NavItem> {
        self.children(id)
            .iter()
            .filter_map(|&child| {
                let node = self.node(child);
                let children = self.nav_items(child);
                if !node.is_page() && children.is_empty() {
                    return None;
                }
                Some(NavItem {
                    title: node.title.clone(),
                    url_path: node.url_path.clone(),
                    has_page: node.is_page(),
                    children,
                })
            })
            .collect()
    }

    /// Total number of nodes, sections included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }
}

/// Recursive directory walker that appends nodes to the arena.
struct Scanner<'a> {
    options: &'a TreeOptions,
    parser: &'a ParserConfig,
    nodes: Vec<Node>,
    /// URL path to the file or directory that produced it.
    origins: HashMap<String, PathBuf>,
}

impl Scanner<'_> {
    fn scan_dir(&mut self, dir: &Path, parent: NodeId) -> Result<(), SourceTreeError> {
        let read_dir = fs::read_dir(dir).map_err(|e| SourceTreeError::unreadable(dir, e))?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| SourceTreeError::unreadable(dir, e))?;
            entries.push((entry.file_name(), entry.path()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (file_name, path) in entries {
            let Some(name) = file_name.to_str() else {
                tracing::warn!(path = %path.display(), "Skipping non-UTF-8 path");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            if path.is_dir() {
                let kind = match self.options.find_index(&path) {
                    Some(source_path) => NodeKind::Page { source_path },
                    None => NodeKind::Section,
                };
                let child = self.push(Some(parent), name, kind, &path)?;
                self.scan_dir(&path, child)?;
            } else if self.options.is_reserved(name) {
                continue;
            } else if let Some(stem) = self.options.markup_stem(name) {
                let kind = NodeKind::Page {
                    source_path: path.clone(),
                };
                self.push(Some(parent), stem, kind, &path)?;
            }
        }

        Ok(())
    }

    fn push(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        kind: NodeKind,
        origin: &Path,
    ) -> Result<NodeId, SourceTreeError> {
        let url_path = match parent.map(|p| self.nodes[p.0].url_path.as_str()) {
            None | Some("") => name.to_owned(),
            Some(parent_url) => format!("{parent_url}/{name}"),
        };

        if let Some(first) = self.origins.get(&url_path) {
            return Err(SourceTreeError::DuplicatePath {
                url_path,
                first: first.clone(),
                second: origin.to_path_buf(),
            });
        }
        self.origins.insert(url_path.clone(), origin.to_path_buf());

        let title = match &kind {
            NodeKind::Page { source_path } => {
                let source = fs::read_to_string(source_path)
                    .map_err(|e| SourceTreeError::unreadable(source_path, e))?;
                extract_title(&source, self.parser).unwrap_or_else(|| default_title(name))
            }
            NodeKind::Section => default_title(name),
        };

        let output_path = if url_path.is_empty() {
            PathBuf::from(PAGE_FILE)
        } else {
            Path::new(&url_path).join(PAGE_FILE)
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_owned(),
            title,
            url_path,
            output_path,
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }

        Ok(id)
    }
}

/// Title for a node without an H1 heading.
fn default_title(name: &str) -> String {
    if name.is_empty() {
        return "Home".to_owned();
    }
    titlecase_from_slug(name)
}

/// Convert a slug (kebab-case or `snake_case`) to title case.
fn titlecase_from_slug(slug: &str) -> String {
    let mut result = String::with_capacity(slug.len());
    for word in slug.split(['-', '_', ' ']).filter(|w| !w.is_empty()) {
        if !result.is_empty() {
            result.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(NodeTree: Send, Sync);

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scan(root: &Path) -> Result<NodeTree, SourceTreeError> {
        NodeTree::scan(root, &TreeOptions::default(), &ParserConfig::default())
    }

    fn names(tree: &NodeTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| tree.node(id).name().to_owned()).collect()
    }

    #[test]
    fn test_scan_builds_nested_tree() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "# Home");
        write(temp.path(), "a.md", "# A");
        write(temp.path(), "b/index.md", "# B");
        write(temp.path(), "b/c.md", "# C");

        let tree = scan(temp.path()).unwrap();
        let root = tree.root();

        assert_eq!(names(&tree, tree.children(root)), vec!["a", "b"]);
        let b = tree.children(root)[1];
        assert!(tree.node(b).is_page());
        assert_eq!(tree.node(b).source_path(), Some(temp.path().join("b/index.md").as_path()));
        assert_eq!(names(&tree, tree.children(b)), vec!["c"]);
        assert_eq!(names(&tree, tree.pages()), vec!["", "a", "b", "c"]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_parent_links() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "b/c.md", "");

        let tree = scan(temp.path()).unwrap();
        let b = tree.children(tree.root())[0];
        let c = tree.children(b)[0];

        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.parent(b), Some(tree.root()));
        assert_eq!(tree.parent(c), Some(b));
    }

    #[test]
    fn test_url_and_output_paths() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "b/c.md", "");

        let tree = scan(temp.path()).unwrap();
        let b = tree.children(tree.root())[0];
        let c = tree.children(b)[0];

        assert_eq!(tree.node(tree.root()).url_path(), "");
        assert_eq!(tree.node(tree.root()).output_path(), Path::new("index.html"));
        assert_eq!(tree.node(c).url_path(), "b/c");
        assert_eq!(tree.node(c).output_path(), Path::new("b/c/index.html"));
    }

    #[test]
    fn test_directory_without_index_is_section() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "guides/setup.md", "");

        let tree = scan(temp.path()).unwrap();
        let guides = tree.children(tree.root())[0];

        assert_eq!(tree.node(guides).kind(), &NodeKind::Section);
        assert_eq!(tree.node(guides).source_path(), None);
        assert_eq!(names(&tree, tree.pages()), vec!["", "setup"]);
    }

    #[test]
    fn test_only_exact_index_name_is_reserved() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "index-old.md", "");
        write(temp.path(), "reindex.md", "");
        write(temp.path(), "sub/index.md", "");

        let tree = scan(temp.path()).unwrap();

        assert_eq!(
            names(&tree, tree.children(tree.root())),
            vec!["index-old", "reindex", "sub"]
        );
        let sub = tree.children(tree.root())[2];
        assert!(tree.children(sub).is_empty());
    }

    #[test]
    fn test_skips_hidden_and_non_markup_files() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), ".draft.md", "");
        write(temp.path(), ".git/notes.md", "");
        write(temp.path(), "logo.png", "");
        write(temp.path(), "index.html", "");
        write(temp.path(), "page.md", "");

        let tree = scan(temp.path()).unwrap();
        assert_eq!(names(&tree, tree.children(tree.root())), vec!["page"]);
    }

    #[test]
    fn test_custom_markup_extensions() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.markdown", "");
        write(temp.path(), "a.md", "");
        write(temp.path(), "b.markdown", "");

        let options = TreeOptions {
            markup_extensions: vec!["markdown".to_owned()],
        };
        let tree = NodeTree::scan(temp.path(), &options, &ParserConfig::default()).unwrap();
        assert_eq!(names(&tree, tree.children(tree.root())), vec!["b"]);
    }

    #[test]
    fn test_titles_from_h1_or_name() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "no heading");
        write(temp.path(), "setup-guide.md", "text");
        write(temp.path(), "usage.md", "# How to use it\n");
        write(temp.path(), "api_docs/ref.md", "");

        let tree = scan(temp.path()).unwrap();
        let titles: Vec<_> = tree.iter().map(|(_, n)| n.title().to_owned()).collect();

        assert_eq!(
            titles,
            vec!["Home", "Api Docs", "Ref", "Setup Guide", "How to use it"]
        );
    }

    #[test]
    fn test_scan_is_deterministic() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "# Home");
        for name in ["zeta.md", "alpha.md", "mid/index.md", "mid/x.md", "mid/a.md"] {
            write(temp.path(), name, "text");
        }

        let first = scan(temp.path()).unwrap();
        let second = scan(temp.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(names(&first, first.pages()), vec!["", "alpha", "mid", "a", "x", "zeta"]);
    }

    #[test]
    fn test_missing_content_root() {
        let temp = tempfile::tempdir().unwrap();
        let err = scan(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, SourceTreeError::MissingContentRoot(_)));
    }

    #[test]
    fn test_missing_root_index() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "a.md", "");

        let err = scan(temp.path()).unwrap_err();
        assert!(matches!(err, SourceTreeError::MissingRootIndex(_)));
    }

    #[test]
    fn test_unreadable_source() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        fs::write(temp.path().join("bad.md"), [0xff, 0xfe, 0x00]).unwrap();

        let err = scan(temp.path()).unwrap_err();
        assert!(
            matches!(err, SourceTreeError::Unreadable { ref path, .. } if path.ends_with("bad.md"))
        );
    }

    #[test]
    fn test_duplicate_url_path() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "b.md", "");
        write(temp.path(), "b/index.md", "");

        let err = scan(temp.path()).unwrap_err();
        assert!(matches!(err, SourceTreeError::DuplicatePath { ref url_path, .. } if url_path == "b"));
    }

    #[test]
    fn test_find_by_source() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "b/index.md", "");
        write(temp.path(), "b/c.md", "");

        let tree = scan(temp.path()).unwrap();
        let b = tree.find_by_source(&temp.path().join("b/index.md")).unwrap();

        assert_eq!(tree.node(b).url_path(), "b");
        assert_eq!(tree.find_by_source(&temp.path().join("b")), None);
    }

    #[test]
    fn test_breadcrumbs() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "a/b/c.md", "");

        let tree = scan(temp.path()).unwrap();
        let c = tree.find_by_source(&temp.path().join("a/b/c.md")).unwrap();

        assert_eq!(names(&tree, &tree.breadcrumbs(c)), vec!["", "a", "b"]);
        assert!(tree.breadcrumbs(tree.root()).is_empty());
    }

    #[test]
    fn test_navigation_skips_empty_sections() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.md", "");
        write(temp.path(), "guide.md", "# Guide");
        write(temp.path(), "empty/notes.txt", "");
        write(temp.path(), "ref/api.md", "");

        let tree = scan(temp.path()).unwrap();

        assert_eq!(
            tree.navigation(),
            vec![
                NavItem {
                    title: "Guide".to_owned(),
                    url_path: "guide".to_owned(),
                    has_page: true,
                    children: vec![],
                },
                NavItem {
                    title: "Ref".to_owned(),
                    url_path: "ref".to_owned(),
                    has_page: false,
                    children: vec![NavItem {
                        title: "Api".to_owned(),
                        url_path: "ref/api".to_owned(),
                        has_page: true,
                        children: vec![],
                    }],
                },
            ]
        );
    }

    #[test]
    fn test_titlecase_from_slug() {
        assert_eq!(titlecase_from_slug("setup-guide"), "Setup Guide");
        assert_eq!(titlecase_from_slug("my_page"), "My Page");
        assert_eq!(titlecase_from_slug("--"), "");
    }
}
