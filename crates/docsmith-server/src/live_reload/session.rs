//! Live preview session.
//!
//! A session owns the live [`Builder`] and a [`LiveReloadRouter`] bound to
//! it. A `notify` watcher records raw changes into an [`EventDebouncer`]; one
//! session thread drains settled changes and runs their rebuilds one at a
//! time, then tells browsers to reload.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use docsmith_site::{BuildError, Builder, NodeId, SiteConfig};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::broadcast;

use super::debouncer::{EventDebouncer, FsEvent, FsEventKind};
use super::router::{LiveReloadRouter, RebuildAction, RebuildTarget, builder_bindings};
use crate::error::ServerError;

/// How often the session thread looks for settled changes.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Message pushed to browsers after a successful rebuild.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    #[serde(rename = "type")]
    event_type: &'static str,
    /// URL of the rebuilt page, or `*` when the whole site changed.
    pub path: String,
}

impl ReloadEvent {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            event_type: "reload",
            path: path.into(),
        }
    }
}

/// Produces the site configuration for a full rebuild.
pub type ConfigLoader = Box<dyn FnMut() -> Result<SiteConfig, BuildError> + Send>;

/// The live builder plus a way to reload its configuration.
pub struct LiveSite {
    builder: Builder,
    load_config: ConfigLoader,
}

impl LiveSite {
    #[must_use]
    pub fn new(builder: Builder, load_config: ConfigLoader) -> Self {
        Self {
            builder,
            load_config,
        }
    }

    #[must_use]
    pub fn builder(&self) -> &Builder {
        &self.builder
    }
}

impl fmt::Debug for LiveSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSite")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl RebuildTarget for LiveSite {
    fn rebuild_page(&mut self, id: NodeId) -> Result<(), BuildError> {
        self.builder.rebuild_page(id)
    }

    fn rebuild_all(&mut self) -> Result<(), BuildError> {
        let config = (self.load_config)()?;
        self.builder.rebuild_all(config).map(drop)
    }

    fn sync_assets(&mut self, root: usize) -> Result<(), BuildError> {
        let report = self.builder.sync_assets(root)?;
        tracing::info!(root, files = report.files_copied, "Assets synced");
        Ok(())
    }

    fn bindings(&self) -> Vec<(PathBuf, RebuildAction)> {
        builder_bindings(&self.builder)
    }
}

/// Routes settled changes into rebuilds of one live site.
#[derive(Debug)]
pub struct Session {
    router: LiveReloadRouter,
    site: LiveSite,
    reloads: broadcast::Sender<ReloadEvent>,
}

impl Session {
    #[must_use]
    pub fn new(site: LiveSite, reloads: broadcast::Sender<ReloadEvent>) -> Self {
        Self {
            router: LiveReloadRouter::for_target(&site),
            site,
            reloads,
        }
    }

    #[must_use]
    pub fn router(&self) -> &LiveReloadRouter {
        &self.router
    }

    #[must_use]
    pub fn site(&self) -> &LiveSite {
        &self.site
    }

    /// Run the rebuild for one settled change.
    ///
    /// Returns the action that ran, or `None` for ignored and unmapped
    /// paths. A failed rebuild is logged and leaves the served output as it
    /// was; browsers are only told to reload after success.
    pub fn handle(&mut self, event: &FsEvent) -> Option<RebuildAction> {
        if is_ignored(&event.path) {
            return None;
        }
        let Some(mut action) = self.router.resolve(&event.path) else {
            tracing::trace!(path = %event.path.display(), "Unmapped change ignored");
            return None;
        };
        // A deleted page changes the tree, not just its own output.
        if event.kind == FsEventKind::Removed && matches!(action, RebuildAction::Page(_)) {
            action = RebuildAction::Full;
        }

        let reload_path = self.reload_path(action);
        let start = Instant::now();
        match self.router.run(action, &mut self.site) {
            Ok(()) => {
                tracing::info!(
                    path = %event.path.display(),
                    kind = ?event.kind,
                    ?action,
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Live reload rebuild finished"
                );
                // No subscribers is fine.
                let _ = self.reloads.send(ReloadEvent::new(reload_path));
            }
            Err(e) => {
                tracing::error!(
                    path = %event.path.display(),
                    ?action,
                    error = %e,
                    "Rebuild failed, keeping previous output"
                );
            }
        }
        Some(action)
    }

    fn reload_path(&self, action: RebuildAction) -> String {
        match action {
            RebuildAction::Page(id) => {
                format!("/{}", self.site.builder().tree().node(id).url_path())
            }
            RebuildAction::Full | RebuildAction::Assets(_) => "*".to_owned(),
        }
    }
}

/// Editor droppings and hidden files never trigger rebuilds.
fn is_ignored(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') || name.ends_with('~'))
}

/// Stops the live session when dropped.
///
/// Dropping only signals the session thread, which exits after the rebuild
/// it is running. [`stop`](Self::stop) also waits for that.
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop watching and wait for an in-flight rebuild to finish.
    pub fn stop(mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Live reload thread panicked");
        }
    }
}

/// Start watching everything `session` is bound to.
///
/// Changes are debounced over `debounce` before they are handled.
pub fn spawn(session: Session, debounce: Duration) -> Result<WatchHandle, ServerError> {
    let debouncer = Arc::new(EventDebouncer::new(debounce));
    let recorder = Arc::clone(&debouncer);

    let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        for change in FsEvent::from_notify(event) {
            recorder.record(change.path, change.kind);
        }
    })?;
    let mut watches = Watches {
        watcher,
        watched: BTreeMap::new(),
    };
    watches.sync(&session.router().watch_roots());

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let thread = thread::Builder::new()
        .name("docsmith-live-reload".to_owned())
        .spawn(move || run(session, &debouncer, watches, &shutdown_rx))
        .map_err(ServerError::Thread)?;

    Ok(WatchHandle {
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

fn run(
    mut session: Session,
    debouncer: &EventDebouncer,
    mut watches: Watches,
    shutdown: &mpsc::Receiver<()>,
) {
    loop {
        match shutdown.recv_timeout(POLL_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        for event in debouncer.drain_ready() {
            if !matches!(shutdown.try_recv(), Err(mpsc::TryRecvError::Empty)) {
                tracing::debug!("Live reload stopped with changes pending");
                return;
            }
            if session.handle(&event) == Some(RebuildAction::Full) {
                watches.sync(&session.router().watch_roots());
            }
        }
    }
    tracing::debug!("Live reload stopped");
}

/// Watcher plus the directories it currently watches.
struct Watches {
    watcher: RecommendedWatcher,
    watched: BTreeMap<PathBuf, RecursiveMode>,
}

impl Watches {
    /// Watch exactly what [`watch_targets`] asks for `roots`.
    fn sync(&mut self, roots: &[PathBuf]) {
        let wanted = watch_targets(roots);

        for (path, mode) in &self.watched {
            if wanted.get(path) == Some(mode) {
                continue;
            }
            if let Err(e) = self.watcher.unwatch(path) {
                tracing::debug!(path = %path.display(), error = %e, "Failed to unwatch");
            }
        }

        let mut watched = BTreeMap::new();
        for (path, mode) in wanted {
            if self.watched.get(&path) == Some(&mode) {
                watched.insert(path, mode);
                continue;
            }
            match self.watcher.watch(&path, mode) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), ?mode, "Watching");
                    watched.insert(path, mode);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to watch");
                }
            }
        }
        self.watched = watched;
    }
}

/// Directories to watch so every change under `roots` is reported.
///
/// Existing directories are watched recursively. Files and missing paths are
/// watched through their parent directory, non-recursively, so a file
/// replaced by rename or a directory created later is still seen. Parents
/// already inside a recursive watch are skipped.
fn watch_targets(roots: &[PathBuf]) -> BTreeMap<PathBuf, RecursiveMode> {
    let mut targets: BTreeMap<PathBuf, RecursiveMode> = roots
        .iter()
        .filter(|root| root.is_dir())
        .map(|root| (root.clone(), RecursiveMode::Recursive))
        .collect();

    for root in roots.iter().filter(|root| !root.is_dir()) {
        let Some(parent) = root.parent().filter(|parent| parent.is_dir()) else {
            continue;
        };
        let covered = targets
            .iter()
            .any(|(dir, mode)| *mode == RecursiveMode::Recursive && parent.starts_with(dir));
        if !covered {
            targets.insert(parent.to_path_buf(), RecursiveMode::NonRecursive);
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Mutex;

    use docsmith_config::AssetsConfig;
    use docsmith_site::{NodeTree, TreeOptions};
    use pretty_assertions::assert_eq;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Session: Send);
    assert_impl_all!(WatchHandle: Send);

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        config: Arc<Mutex<SiteConfig>>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().unwrap();
            let root = temp.path().to_path_buf();
            let fixture = Self {
                config: Arc::new(Mutex::new(SiteConfig {
                    content_dir: root.join("content"),
                    site_dir: root.join("site"),
                    templates_dir: root.join("templates"),
                    template: "website.html".to_owned(),
                    threads: 2,
                    tree: TreeOptions::default(),
                    markdown: BTreeMap::new(),
                    assets: AssetsConfig {
                        roots: vec![root.clone()],
                        dirs: vec!["css".to_owned()],
                    },
                    live_reload: true,
                    config_path: Some(root.join("docsmith.toml")),
                })),
                root,
                _temp: temp,
            };
            fixture.write("docsmith.toml", "");
            fixture.write("content/index.md", "# Home");
            fixture.write("content/a.md", "# A\n\nFirst.");
            fixture.write("content/b/index.md", "# B");
            fixture.write("content/b/c.md", "# C");
            fixture.write("css/site.css", "body {}");
            fixture
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn site_config(&self) -> SiteConfig {
            self.config.lock().unwrap().clone()
        }

        fn session(&self) -> (Session, broadcast::Receiver<ReloadEvent>) {
            let mut builder = Builder::new(self.site_config()).unwrap();
            builder.build().unwrap();

            let shared = Arc::clone(&self.config);
            let loader: ConfigLoader = Box::new(move || Ok(shared.lock().unwrap().clone()));
            let (tx, rx) = broadcast::channel(16);
            (Session::new(LiveSite::new(builder, loader), tx), rx)
        }

        fn output(&self, rel: &str) -> String {
            fs::read_to_string(self.root.join("site").join(rel)).unwrap()
        }

        /// Save `rel` the way editors do: write a temp file, rename it over.
        fn replace(&self, rel: &str, content: &str) {
            let temp = self.root.join(format!("{rel}.tmp"));
            fs::write(&temp, content).unwrap();
            fs::rename(temp, self.root.join(rel)).unwrap();
        }
    }

    fn next_reload(reloads: &mut broadcast::Receiver<ReloadEvent>) -> ReloadEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match reloads.try_recv() {
                Ok(event) => return event,
                Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                Err(e) => panic!("no reload before deadline: {e}"),
            }
        }
    }

    fn modified(path: PathBuf) -> FsEvent {
        FsEvent {
            path,
            kind: FsEventKind::Modified,
        }
    }

    /// Every file under `dir`, relative path to contents.
    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(base, &path, out);
                } else {
                    let rel = path.strip_prefix(base).unwrap().to_path_buf();
                    out.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(dir, dir, &mut out);
        out
    }

    #[test]
    fn test_reload_event_serialization() {
        let json = serde_json::to_value(ReloadEvent::new("/guide")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "reload", "path": "/guide"}));
    }

    #[test]
    fn test_page_change_rebuilds_only_that_page() {
        let fixture = Fixture::new();
        let (mut session, mut reloads) = fixture.session();
        let tree_before: NodeTree = session.site().builder().tree().clone();
        let site_before = snapshot(&fixture.root.join("site"));

        fixture.write("content/a.md", "# A\n\nSecond.");
        let source = fixture.root.join("content/a.md");
        let action = session.handle(&modified(source.clone()));

        let id = tree_before.find_by_source(&source).unwrap();
        assert_eq!(action, Some(RebuildAction::Page(id)));
        assert_eq!(session.site().builder().tree(), &tree_before);
        assert!(fixture.output("a/index.html").contains("Second."));

        let mut site_after = snapshot(&fixture.root.join("site"));
        let mut site_before = site_before;
        site_after.remove(Path::new("a/index.html"));
        site_before.remove(Path::new("a/index.html"));
        assert_eq!(site_after, site_before);

        assert_eq!(reloads.try_recv().unwrap(), ReloadEvent::new("/a"));
        assert!(reloads.try_recv().is_err());
    }

    #[test]
    fn test_config_change_matches_fresh_build() {
        let fixture = Fixture::new();
        let (mut session, mut reloads) = fixture.session();

        fixture.write("content/d.md", "# D\n\n## Part");
        fixture
            .config
            .lock()
            .unwrap()
            .markdown
            .insert("heading_ids".to_owned(), toml::Table::new());
        let action = session.handle(&modified(fixture.root.join("docsmith.toml")));
        assert_eq!(action, Some(RebuildAction::Full));
        assert_eq!(reloads.try_recv().unwrap(), ReloadEvent::new("*"));

        let fresh_dir = fixture.root.join("fresh");
        let mut fresh = Builder::new(fixture.site_config().with_site_dir(fresh_dir.clone())).unwrap();
        fresh.build().unwrap();

        assert_eq!(session.site().builder().tree(), fresh.tree());
        assert_eq!(snapshot(&fixture.root.join("site")), snapshot(&fresh_dir));
        assert!(fixture.output("d/index.html").contains(r#"<h2 id="part">"#));

        // The new page is bound after the rebuild.
        let d = fixture.root.join("content/d.md");
        assert!(matches!(
            session.router().resolve(&d),
            Some(RebuildAction::Page(_))
        ));
    }

    #[test]
    fn test_failed_full_rebuild_keeps_output() {
        let fixture = Fixture::new();
        let (mut session, mut reloads) = fixture.session();
        let before = snapshot(&fixture.root.join("site"));

        fixture
            .config
            .lock()
            .unwrap()
            .markdown
            .insert("no_such_extension".to_owned(), toml::Table::new());
        let action = session.handle(&modified(fixture.root.join("templates/page.html")));

        assert_eq!(action, Some(RebuildAction::Full));
        assert_eq!(snapshot(&fixture.root.join("site")), before);
        assert!(reloads.try_recv().is_err());
    }

    #[test]
    fn test_failed_page_rebuild_keeps_output() {
        let fixture = Fixture::new();
        let (mut session, mut reloads) = fixture.session();
        let before = fixture.output("a/index.html");

        fs::remove_file(fixture.root.join("content/a.md")).unwrap();
        let action = session.handle(&modified(fixture.root.join("content/a.md")));

        assert!(matches!(action, Some(RebuildAction::Page(_))));
        assert_eq!(fixture.output("a/index.html"), before);
        assert!(reloads.try_recv().is_err());
    }

    #[test]
    fn test_removed_page_triggers_full_rebuild() {
        let fixture = Fixture::new();
        let (mut session, _reloads) = fixture.session();

        let source = fixture.root.join("content/a.md");
        fs::remove_file(&source).unwrap();
        let action = session.handle(&FsEvent {
            path: source.clone(),
            kind: FsEventKind::Removed,
        });

        assert_eq!(action, Some(RebuildAction::Full));
        assert!(!fixture.root.join("site/a/index.html").exists());
        assert!(session.site().builder().tree().find_by_source(&source).is_none());
    }

    #[test]
    fn test_page_moved_out_of_content_triggers_full_rebuild() {
        let fixture = Fixture::new();
        let (mut session, _reloads) = fixture.session();

        let source = fixture.root.join("content/a.md");
        let archived = fixture.root.join("archive/a.md");
        fs::create_dir_all(archived.parent().unwrap()).unwrap();
        fs::rename(&source, &archived).unwrap();

        let event = notify::Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Name(
            notify::event::RenameMode::Both,
        )))
        .add_path(source.clone())
        .add_path(archived);
        let actions: Vec<_> = FsEvent::from_notify(event)
            .iter()
            .map(|change| session.handle(change))
            .collect();

        assert_eq!(actions, vec![Some(RebuildAction::Full), None]);
        assert!(session.site().builder().tree().find_by_source(&source).is_none());
        assert!(!fixture.root.join("site/a/index.html").exists());
        assert!(!fixture.output("index.html").contains(">A</a>"));
    }

    #[test]
    fn test_asset_change_resyncs_assets() {
        let fixture = Fixture::new();
        let (mut session, mut reloads) = fixture.session();

        fixture.write("css/site.css", "body { margin: 0 }");
        let action = session.handle(&modified(fixture.root.join("css/site.css")));

        assert_eq!(action, Some(RebuildAction::Assets(0)));
        assert_eq!(fixture.output("css/site.css"), "body { margin: 0 }");
        assert_eq!(reloads.try_recv().unwrap(), ReloadEvent::new("*"));
    }

    #[test]
    fn test_ignored_and_unmapped_changes() {
        let fixture = Fixture::new();
        let (mut session, mut reloads) = fixture.session();

        assert_eq!(
            session.handle(&modified(fixture.root.join("content/.a.md.swp"))),
            None
        );
        assert_eq!(session.handle(&modified(fixture.root.join("content/a.md~"))), None);
        assert_eq!(session.handle(&modified(fixture.root.join("notes.txt"))), None);
        assert!(reloads.try_recv().is_err());
    }

    #[test]
    fn test_watch_targets_cover_files_through_parent() {
        let fixture = Fixture::new();
        let content = fixture.root.join("content");
        let roots = vec![
            content.clone(),
            fixture.root.join("css"),
            fixture.root.join("docsmith.toml"),
            fixture.root.join("templates"),
            fixture.root.join("missing/deeper"),
        ];

        let targets = watch_targets(&roots);
        assert_eq!(
            targets,
            BTreeMap::from([
                (content.clone(), RecursiveMode::Recursive),
                (fixture.root.join("css"), RecursiveMode::Recursive),
                (fixture.root.clone(), RecursiveMode::NonRecursive),
            ])
        );

        // A file inside a recursive watch needs nothing extra.
        let nested = watch_targets(&[content.clone(), content.join("a.md")]);
        assert_eq!(nested, BTreeMap::from([(content, RecursiveMode::Recursive)]));
    }

    #[test]
    fn test_config_replaced_by_rename_keeps_triggering_rebuilds() {
        let fixture = Fixture::new();
        let (session, mut reloads) = fixture.session();
        let handle = spawn(session, Duration::from_millis(20)).unwrap();

        fixture.replace("docsmith.toml", "# first\n");
        assert_eq!(next_reload(&mut reloads), ReloadEvent::new("*"));
        while reloads.try_recv().is_ok() {}

        fixture.replace("docsmith.toml", "# second\n");
        assert_eq!(next_reload(&mut reloads), ReloadEvent::new("*"));

        handle.stop();
    }

    #[test]
    fn test_watch_handle_stop_joins_thread() {
        let fixture = Fixture::new();
        let (session, _reloads) = fixture.session();

        let handle = spawn(session, Duration::from_millis(10)).unwrap();
        handle.stop();
    }
}
