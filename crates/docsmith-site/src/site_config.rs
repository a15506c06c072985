//! Explicit configuration for one site build.

use std::collections::BTreeMap;
use std::path::PathBuf;

use docsmith_config::{AssetsConfig, Config};

use crate::tree::TreeOptions;

/// Everything a [`Builder`](crate::Builder) needs, resolved once and passed
/// by value. No build step looks anything up globally.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteConfig {
    /// Markdown source directory.
    pub content_dir: PathBuf,
    /// Output directory.
    pub site_dir: PathBuf,
    /// Directory holding page templates.
    pub templates_dir: PathBuf,
    /// Template file name inside `templates_dir`.
    pub template: String,
    /// Number of build workers (at least one).
    pub threads: usize,
    pub tree: TreeOptions,
    /// Markdown extensions with their options.
    pub markdown: BTreeMap<String, toml::Table>,
    pub assets: AssetsConfig,
    /// Inject the live reload client into pages.
    pub live_reload: bool,
    /// Configuration file the values came from, if any.
    pub config_path: Option<PathBuf>,
}

impl SiteConfig {
    /// Resolve a site configuration from loaded application config.
    ///
    /// Live reload starts disabled; `serve` enables it with
    /// [`with_live_reload`](Self::with_live_reload).
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let build = &config.build_resolved;
        Self {
            content_dir: build.content_dir.clone(),
            site_dir: build.site_dir.clone(),
            templates_dir: build.templates_dir.clone(),
            template: build.template.clone(),
            threads: build.effective_threads(),
            tree: TreeOptions::default(),
            markdown: config.markdown.extensions.clone(),
            assets: config.assets_resolved.clone(),
            live_reload: false,
            config_path: config.config_path.clone(),
        }
    }

    /// Write output to `site_dir` instead.
    #[must_use]
    pub fn with_site_dir(mut self, site_dir: PathBuf) -> Self {
        self.site_dir = site_dir;
        self
    }

    #[must_use]
    pub fn with_live_reload(mut self, enabled: bool) -> Self {
        self.live_reload = enabled;
        self
    }
}
