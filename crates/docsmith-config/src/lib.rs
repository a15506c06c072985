//! Configuration management for docsmith.
//!
//! Parses `docsmith.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Path Expansion
//!
//! Path values support `~` and environment variable expansion
//! (`$VAR`, `${VAR}`, `${VAR:-default}`). Relative paths are resolved
//! against the directory containing the config file.
//!
//! Expanded fields:
//! - `build.content_dir`
//! - `build.site_dir`
//! - `build.templates_dir`
//! - `assets.roots`

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override content source directory.
    pub content_dir: Option<PathBuf>,
    /// Override output directory.
    pub site_dir: Option<PathBuf>,
    /// Override number of build workers.
    pub threads: Option<usize>,
    /// Override page template file name.
    pub template: Option<String>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
}

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "docsmith.toml";

/// Asset subdirectories merged into the output when none are configured.
const DEFAULT_ASSET_DIRS: [&str; 4] = ["js", "css", "media", "fonts"];

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Build configuration (paths are relative strings from TOML).
    build: BuildConfigRaw,
    /// Static asset configuration (paths are relative strings from TOML).
    assets: AssetsConfigRaw,
    /// Markdown parser configuration.
    pub markdown: MarkdownConfig,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,

    /// Resolved build configuration (set after loading).
    #[serde(skip)]
    pub build_resolved: BuildConfig,
    /// Resolved asset configuration (set after loading).
    #[serde(skip)]
    pub assets_resolved: AssetsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Raw build configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BuildConfigRaw {
    content_dir: Option<String>,
    site_dir: Option<String>,
    templates_dir: Option<String>,
    template: Option<String>,
    threads: Option<usize>,
}

/// Resolved build configuration with absolute paths.
#[derive(Debug, Default)]
pub struct BuildConfig {
    /// Markdown source directory.
    pub content_dir: PathBuf,
    /// Output directory for `build`.
    pub site_dir: PathBuf,
    /// Directory holding page templates.
    pub templates_dir: PathBuf,
    /// Template file name inside `templates_dir`.
    pub template: String,
    /// Number of parallel build workers (0 = available parallelism).
    pub threads: usize,
    /// Project directory for docsmith data (`.docsmith/`).
    pub project_dir: PathBuf,
}

impl BuildConfig {
    /// Output directory used by `serve` (`.docsmith/site/`).
    #[must_use]
    pub fn preview_dir(&self) -> PathBuf {
        self.project_dir.join("site")
    }

    /// Worker count with `0` resolved to the available parallelism.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    /// Path to the configured page template.
    #[must_use]
    pub fn template_path(&self) -> PathBuf {
        self.templates_dir.join(&self.template)
    }
}

/// Raw asset configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AssetsConfigRaw {
    roots: Option<Vec<String>>,
    dirs: Option<Vec<String>>,
}

/// Resolved static asset configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssetsConfig {
    /// Asset source roots in priority order (later roots win).
    pub roots: Vec<PathBuf>,
    /// Subdirectory names merged from every root.
    pub dirs: Vec<String>,
}

/// Markdown parser configuration.
///
/// Maps extension names to extension-specific options. The mapping is
/// validated by the renderer when a site builder is constructed.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Enabled extensions with their options.
    pub extensions: BTreeMap<String, toml::Table>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        let extensions = ["tables", "footnotes", "strikethrough", "tasklists", "heading_ids"]
            .into_iter()
            .map(|name| (name.to_owned(), toml::Table::new()))
            .collect();
        Self { extensions }
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
    /// Debounce window for filesystem events in milliseconds.
    pub debounce_ms: u64,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 100,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`build.site_dir`").
        field: String,
        /// Error message.
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `docsmith.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The result is
    /// validated once all overrides are in place.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(content_dir) = &settings.content_dir {
            self.build_resolved.content_dir.clone_from(content_dir);
        }
        if let Some(site_dir) = &settings.site_dir {
            self.build_resolved.site_dir.clone_from(site_dir);
        }
        if let Some(threads) = settings.threads {
            self.build_resolved.threads = threads;
        }
        if let Some(template) = &settings.template {
            self.build_resolved.template.clone_from(template);
        }
        if let Some(live_reload_enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = live_reload_enabled;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            build: BuildConfigRaw::default(),
            assets: AssetsConfigRaw::default(),
            markdown: MarkdownConfig::default(),
            live_reload: LiveReloadConfig::default(),
            build_resolved: BuildConfig {
                content_dir: base.join("content"),
                site_dir: base.join("site"),
                templates_dir: base.join("templates"),
                template: "website.html".to_owned(),
                threads: 0,
                project_dir: base.join(".docsmith"),
            },
            assets_resolved: AssetsConfig {
                roots: vec![base.to_path_buf()],
                dirs: DEFAULT_ASSET_DIRS.map(str::to_owned).into(),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically by [`Config::load`] after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_build()?;
        self.validate_assets()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but it's
        // unlikely to be intentional in a config file
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate build configuration.
    ///
    /// The output directory must be disjoint from the content directory: a
    /// clean build removes the output directory, and an output directory
    /// inside the content tree would be scanned as content.
    fn validate_build(&self) -> Result<(), ConfigError> {
        let build = &self.build_resolved;
        require_non_empty(&build.template, "build.template")?;

        if build.site_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "build.site_dir cannot be empty".to_owned(),
            ));
        }
        if build.content_dir.starts_with(&build.site_dir)
            || build.site_dir.starts_with(&build.content_dir)
        {
            return Err(ConfigError::Validation(format!(
                "build.site_dir ({}) must not overlap build.content_dir ({})",
                build.site_dir.display(),
                build.content_dir.display()
            )));
        }

        Ok(())
    }

    /// Validate asset configuration.
    fn validate_assets(&self) -> Result<(), ConfigError> {
        for dir in &self.assets_resolved.dirs {
            require_non_empty(dir, "assets.dirs")?;
            if dir.contains('/') || dir.contains('\\') || dir == ".." || dir == "." {
                return Err(ConfigError::Validation(format!(
                    "assets.dirs entry '{dir}' must be a plain directory name"
                )));
            }
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let resolve = |path: Option<&str>, default: &str, field: &str| -> Result<PathBuf, ConfigError> {
            let value = expand::expand_path(path.unwrap_or(default), field)?;
            Ok(config_dir.join(value))
        };

        self.build_resolved = BuildConfig {
            content_dir: resolve(self.build.content_dir.as_deref(), "content", "build.content_dir")?,
            site_dir: resolve(self.build.site_dir.as_deref(), "site", "build.site_dir")?,
            templates_dir: resolve(
                self.build.templates_dir.as_deref(),
                "templates",
                "build.templates_dir",
            )?,
            template: self
                .build
                .template
                .clone()
                .unwrap_or_else(|| "website.html".to_owned()),
            threads: self.build.threads.unwrap_or(0),
            project_dir: config_dir.join(".docsmith"),
        };

        let roots = match &self.assets.roots {
            Some(roots) => roots
                .iter()
                .map(|root| resolve(Some(root.as_str()), ".", "assets.roots"))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![config_dir.to_path_buf()],
        };
        let dirs = self
            .assets
            .dirs
            .clone()
            .unwrap_or_else(|| DEFAULT_ASSET_DIRS.map(str::to_owned).into());
        self.assets_resolved = AssetsConfig { roots, dirs };

        Ok(())
    }
}
