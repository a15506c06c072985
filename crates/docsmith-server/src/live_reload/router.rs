//! Mapping of watched paths to rebuild actions.
//!
//! Every watched path is bound to exactly one [`RebuildAction`]. A change is
//! routed to the binding of the longest registered path containing it, so a
//! page source wins over the content directory it lives in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use docsmith_site::{BuildError, Builder, NodeId};

/// What to rebuild when a bound path changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildAction {
    /// Re-render one page using the existing tree.
    Page(NodeId),
    /// Rescan the content tree and rebuild the whole site.
    Full,
    /// Re-merge one asset root, by position in the configured roots.
    Assets(usize),
}

/// Something the router can dispatch rebuilds into.
pub trait RebuildTarget {
    fn rebuild_page(&mut self, id: NodeId) -> Result<(), BuildError>;

    fn rebuild_all(&mut self) -> Result<(), BuildError>;

    fn sync_assets(&mut self, root: usize) -> Result<(), BuildError>;

    /// Paths to watch for the current site, with their actions.
    fn bindings(&self) -> Vec<(PathBuf, RebuildAction)>;
}

/// Bindings for a builder's current configuration and tree.
///
/// The content directory, the templates directory and the configuration file
/// trigger a full rebuild. Each page source triggers its own page rebuild and
/// each `<asset root>/<subdir>` resyncs that root.
#[must_use]
pub fn builder_bindings(builder: &Builder) -> Vec<(PathBuf, RebuildAction)> {
    let config = builder.config();
    let tree = builder.tree();

    let mut bindings = vec![
        (config.content_dir.clone(), RebuildAction::Full),
        (config.templates_dir.clone(), RebuildAction::Full),
    ];
    if let Some(path) = &config.config_path {
        bindings.push((path.clone(), RebuildAction::Full));
    }
    for (index, root) in config.assets.roots.iter().enumerate() {
        for subdir in &config.assets.dirs {
            bindings.push((root.join(subdir), RebuildAction::Assets(index)));
        }
    }
    bindings.extend(tree.pages().iter().filter_map(|&id| {
        let source = tree.node(id).source_path()?;
        Some((source.to_path_buf(), RebuildAction::Page(id)))
    }));
    bindings
}

/// Routes filesystem changes to rebuild actions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveReloadRouter {
    bindings: BTreeMap<PathBuf, RebuildAction>,
}

impl LiveReloadRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with every binding of `target`.
    #[must_use]
    pub fn for_target<T: RebuildTarget + ?Sized>(target: &T) -> Self {
        let mut router = Self::new();
        router.register_all(target.bindings());
        router
    }

    /// Bind `path` to `action`, replacing any earlier binding of that path.
    pub fn register(&mut self, path: impl AsRef<Path>, action: RebuildAction) {
        self.bindings.insert(normalize(path.as_ref()), action);
    }

    pub fn register_all(&mut self, bindings: impl IntoIterator<Item = (PathBuf, RebuildAction)>) {
        for (path, action) in bindings {
            self.register(path, action);
        }
    }

    /// Action for a change at `path`, if any registered path contains it.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<RebuildAction> {
        normalize(path)
            .ancestors()
            .find_map(|candidate| self.bindings.get(candidate).copied())
    }

    /// Run `action` against `target`.
    ///
    /// A successful full rebuild replaces every binding with those of the
    /// rebuilt site, since pages may have been added, removed or renumbered.
    pub fn run<T: RebuildTarget + ?Sized>(
        &mut self,
        action: RebuildAction,
        target: &mut T,
    ) -> Result<(), BuildError> {
        match action {
            RebuildAction::Page(id) => target.rebuild_page(id),
            RebuildAction::Assets(root) => target.sync_assets(root),
            RebuildAction::Full => {
                target.rebuild_all()?;
                self.bindings.clear();
                self.register_all(target.bindings());
                Ok(())
            }
        }
    }

    /// Resolve `path` and run its action.
    ///
    /// Returns `None` without touching `target` when `path` is unmapped.
    pub fn dispatch<T: RebuildTarget + ?Sized>(
        &mut self,
        path: &Path,
        target: &mut T,
    ) -> Option<(RebuildAction, Result<(), BuildError>)> {
        let action = self.resolve(path)?;
        Some((action, self.run(action, target)))
    }

    /// Smallest set of registered paths covering every binding.
    ///
    /// Paths nested inside another registered path are folded into it.
    #[must_use]
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        // Component-wise ordering keeps descendants right after their ancestor.
        for path in self.bindings.keys() {
            if roots.last().is_some_and(|root| path.starts_with(root)) {
                continue;
            }
            roots.push(path.clone());
        }
        roots
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Absolute form of `path` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use docsmith_config::AssetsConfig;
    use docsmith_site::{SiteConfig, TreeOptions};
    use pretty_assertions::assert_eq;

    use super::*;

    /// Records every call instead of building anything.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        bindings: Vec<(PathBuf, RebuildAction)>,
        fail: bool,
    }

    impl Recorder {
        fn outcome(&self) -> Result<(), BuildError> {
            if self.fail {
                Err(BuildError::Io {
                    path: PathBuf::from("/site"),
                    source: std::io::Error::other("boom"),
                })
            } else {
                Ok(())
            }
        }
    }

    impl RebuildTarget for Recorder {
        fn rebuild_page(&mut self, id: NodeId) -> Result<(), BuildError> {
            self.calls.push(format!("page {}", id.index()));
            self.outcome()
        }

        fn rebuild_all(&mut self) -> Result<(), BuildError> {
            self.calls.push("full".to_owned());
            self.outcome()
        }

        fn sync_assets(&mut self, root: usize) -> Result<(), BuildError> {
            self.calls.push(format!("assets {root}"));
            self.outcome()
        }

        fn bindings(&self) -> Vec<(PathBuf, RebuildAction)> {
            self.bindings.clone()
        }
    }

    fn router() -> LiveReloadRouter {
        let mut router = LiveReloadRouter::new();
        router.register("/proj/content", RebuildAction::Full);
        router.register("/proj/content/index.md", RebuildAction::Page(NodeId::ROOT));
        router.register("/proj/templates", RebuildAction::Full);
        router.register("/proj/css", RebuildAction::Assets(0));
        router.register("/theme/css", RebuildAction::Assets(1));
        router
    }

    #[test]
    fn test_resolve_most_specific() {
        let router = router();

        assert_eq!(
            router.resolve(Path::new("/proj/content/index.md")),
            Some(RebuildAction::Page(NodeId::ROOT))
        );
        assert_eq!(
            router.resolve(Path::new("/proj/content/new.md")),
            Some(RebuildAction::Full)
        );
        assert_eq!(
            router.resolve(Path::new("/proj/templates/partials/nav.html")),
            Some(RebuildAction::Full)
        );
        assert_eq!(
            router.resolve(Path::new("/theme/css/site.css")),
            Some(RebuildAction::Assets(1))
        );
    }

    #[test]
    fn test_resolve_is_component_wise() {
        let router = router();
        assert_eq!(router.resolve(Path::new("/proj/content-old/a.md")), None);
        assert_eq!(router.resolve(Path::new("/proj/cssx/a.css")), None);
    }

    #[test]
    fn test_unmapped_path_does_nothing() {
        let mut router = router();
        let mut target = Recorder::default();

        assert!(router.dispatch(Path::new("/elsewhere/a.md"), &mut target).is_none());
        assert!(router.dispatch(Path::new("/proj/README.md"), &mut target).is_none());
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_dispatch_runs_exactly_one_action() {
        let mut router = router();
        let mut target = Recorder::default();

        let (action, result) = router
            .dispatch(Path::new("/proj/content/index.md"), &mut target)
            .unwrap();
        assert_eq!(action, RebuildAction::Page(NodeId::ROOT));
        assert!(result.is_ok());

        router.dispatch(Path::new("/proj/css/a.css"), &mut target);
        assert_eq!(target.calls, vec!["page 0", "assets 0"]);
    }

    #[test]
    fn test_full_rebuild_replaces_bindings() {
        let mut router = router();
        let mut target = Recorder {
            bindings: vec![(PathBuf::from("/other/content"), RebuildAction::Full)],
            ..Recorder::default()
        };

        router
            .dispatch(Path::new("/proj/templates/page.html"), &mut target)
            .unwrap()
            .1
            .unwrap();

        assert_eq!(target.calls, vec!["full"]);
        assert_eq!(router.len(), 1);
        assert_eq!(router.resolve(Path::new("/proj/content/index.md")), None);
        assert_eq!(
            router.resolve(Path::new("/other/content/a.md")),
            Some(RebuildAction::Full)
        );
    }

    #[test]
    fn test_failed_full_rebuild_keeps_bindings() {
        let mut router = router();
        let before = router.clone();
        let mut target = Recorder {
            fail: true,
            ..Recorder::default()
        };

        let (_, result) = router
            .dispatch(Path::new("/proj/templates/page.html"), &mut target)
            .unwrap();

        assert!(result.is_err());
        assert_eq!(router, before);
    }

    #[test]
    fn test_watch_roots_fold_nested_paths() {
        let router = router();
        assert_eq!(
            router.watch_roots(),
            vec![
                PathBuf::from("/proj/content"),
                PathBuf::from("/proj/css"),
                PathBuf::from("/proj/templates"),
                PathBuf::from("/theme/css"),
            ]
        );
    }

    #[test]
    fn test_relative_paths_are_normalized() {
        let mut router = LiveReloadRouter::new();
        router.register("content", RebuildAction::Full);

        let absolute = std::env::current_dir().unwrap().join("content/a.md");
        assert_eq!(router.resolve(&absolute), Some(RebuildAction::Full));
        assert_eq!(
            router.resolve(Path::new("./content/a.md")),
            Some(RebuildAction::Full)
        );
    }

    #[test]
    fn test_builder_bindings() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("content/b")).unwrap();
        fs::write(root.join("content/index.md"), "# Home").unwrap();
        fs::write(root.join("content/a.md"), "# A").unwrap();
        fs::write(root.join("content/b/index.md"), "# B").unwrap();
        fs::write(root.join("docsmith.toml"), "").unwrap();

        let builder = Builder::new(SiteConfig {
            content_dir: root.join("content"),
            site_dir: root.join("site"),
            templates_dir: root.join("templates"),
            template: "website.html".to_owned(),
            threads: 1,
            tree: TreeOptions::default(),
            markdown: BTreeMap::new(),
            assets: AssetsConfig {
                roots: vec![root.to_path_buf()],
                dirs: vec!["css".to_owned(), "js".to_owned()],
            },
            live_reload: true,
            config_path: Some(root.join("docsmith.toml")),
        })
        .unwrap();

        let mut router = LiveReloadRouter::new();
        router.register_all(builder_bindings(&builder));
        let tree = builder.tree();

        assert_eq!(router.len(), 8);
        for &id in tree.pages() {
            let source = tree.node(id).source_path().unwrap();
            assert_eq!(router.resolve(source), Some(RebuildAction::Page(id)));
        }
        assert_eq!(
            router.resolve(&root.join("content/b/new.md")),
            Some(RebuildAction::Full)
        );
        assert_eq!(
            router.resolve(&root.join("docsmith.toml")),
            Some(RebuildAction::Full)
        );
        assert_eq!(
            router.resolve(&root.join("js/app.js")),
            Some(RebuildAction::Assets(0))
        );
        assert_eq!(router.resolve(&root.join("site/index.html")), None);
    }
}
