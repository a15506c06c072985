//! `docsmith build` command implementation.

use std::io;
use std::path::{Path, PathBuf};

use clap::Args;
use docsmith_config::{CliSettings, Config};
use docsmith_site::{Builder, SiteConfig};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args, Debug)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover docsmith.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Markdown source directory (overrides config).
    #[arg(long)]
    content_dir: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short = 'o', long)]
    site_dir: Option<PathBuf>,

    /// Number of build workers, 0 for one per CPU (overrides config).
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Page template file inside the templates directory (overrides config).
    #[arg(long)]
    pub(crate) template: Option<String>,

    /// Remove the output directory before building.
    #[arg(long)]
    clean: bool,

    /// Enable verbose output (build timing logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid, the content tree cannot
    /// be scanned, or any page fails to build.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            content_dir: self.content_dir,
            site_dir: self.site_dir,
            threads: self.threads,
            template: self.template,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let site = SiteConfig::from_config(&config);

        if self.clean {
            remove_output(&site.site_dir)?;
        }
        output.info(&format!(
            "Building {} into {}",
            site.content_dir.display(),
            site.site_dir.display()
        ));

        let mut builder = Builder::new(site)?;
        let report = builder.build()?;

        output.success(&format!(
            "Built {} pages with {} workers in {:.2}s",
            report.pages,
            report.chunks,
            report.elapsed.as_secs_f64()
        ));
        Ok(())
    }
}

/// Delete a previous build output, if there is one.
pub(crate) fn remove_output(dir: &Path) -> Result<(), CliError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
