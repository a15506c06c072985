//! `docsmith serve` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use docsmith_config::{CliSettings, Config};
use docsmith_server::{LiveSite, ServerConfig, config_loader, run_server};
use docsmith_site::{BuildError, Builder, SiteConfig};

use super::build::remove_output;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover docsmith.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Markdown source directory (overrides config).
    #[arg(long)]
    content_dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of build workers, 0 for one per CPU (overrides config).
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Page template file inside the templates directory (overrides config).
    #[arg(long)]
    pub(crate) template: Option<String>,

    /// Enable verbose output (rebuild timing logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// Builds the site into the preview directory, then serves it.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the content tree cannot be
    /// scanned, or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let live_reload_enabled = self.resolve_live_reload_enabled();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            content_dir: self.content_dir,
            threads: self.threads,
            template: self.template,
            live_reload_enabled,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let live_reload = config.live_reload.enabled;

        ensure_project_dir(&config.build_resolved.project_dir)?;
        let preview_dir = config.build_resolved.preview_dir();
        remove_output(&preview_dir)?;

        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!(
            "Content directory: {}",
            config.build_resolved.content_dir.display()
        ));
        output.info(if live_reload {
            "Live reload: enabled"
        } else {
            "Live reload: disabled"
        });

        let site = SiteConfig::from_config(&config)
            .with_site_dir(preview_dir.clone())
            .with_live_reload(live_reload);
        let mut builder = Builder::new(site)?;
        match builder.build() {
            Ok(report) => output.success(&format!("Built {} pages", report.pages)),
            // Broken pages get another chance once they are edited.
            Err(BuildError::Workers(failure)) => output.warning(&failure.to_string()),
            Err(e) => return Err(e.into()),
        }

        let loader = config_loader(
            config.config_path.clone(),
            cli_settings,
            preview_dir.clone(),
            live_reload,
        );
        let server_config = ServerConfig::from_config(&config, preview_dir);
        run_server(server_config, LiveSite::new(builder, loader)).await?;

        Ok(())
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}

/// Ensure the `.docsmith/` project directory exists with a `.gitignore`.
fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by docsmith\n*\n");
    }

    Ok(())
}
