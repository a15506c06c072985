//! Live preview server for docsmith.
//!
//! Serves a built site over HTTP with axum and keeps it current while the
//! sources change:
//! - static pages and assets from the site directory via `tower-http`
//! - a `notify` watcher whose debounced changes are routed to page, asset
//!   or full rebuilds by [`LiveReloadRouter`]
//! - a WebSocket at [`LIVE_RELOAD_PATH`] telling browsers to reload
//!
//! ```text
//! source change ──► notify ──► EventDebouncer ──► Session thread
//!                                                   │
//!                        LiveReloadRouter::resolve ◄┘
//!                                   │
//!                Builder::{rebuild_page, rebuild_all, sync_assets}
//!                                   │
//!                 broadcast ReloadEvent ──► /__livereload ──► browser
//! ```

mod app;
mod error;
mod live_reload;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use docsmith_config::{CliSettings, Config};
use docsmith_site::SiteConfig;
use tokio::sync::broadcast;

pub use error::ServerError;
pub use live_reload::{
    ConfigLoader, EventDebouncer, FsEvent, FsEventKind, LIVE_RELOAD_PATH, LiveReloadRouter,
    LiveSite, RebuildAction, RebuildTarget, ReloadEvent, Session, WatchHandle, builder_bindings,
    spawn as spawn_session,
};
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Built site to serve.
    pub site_dir: PathBuf,
    /// Watch sources and rebuild on change.
    pub live_reload: bool,
    /// Quiet period before a change is handled.
    pub debounce: Duration,
}

impl ServerConfig {
    /// Server settings from loaded configuration, serving `site_dir`.
    #[must_use]
    pub fn from_config(config: &Config, site_dir: PathBuf) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            site_dir,
            live_reload: config.live_reload.enabled,
            debounce: Duration::from_millis(config.live_reload.debounce_ms),
        }
    }
}

/// Loader that re-reads the configuration file for full rebuilds.
///
/// The same CLI overrides are applied on every reload, and output keeps going
/// to `site_dir`.
#[must_use]
pub fn config_loader(
    config_path: Option<PathBuf>,
    cli: CliSettings,
    site_dir: PathBuf,
    live_reload: bool,
) -> ConfigLoader {
    Box::new(move || {
        let config = Config::load(config_path.as_deref(), Some(&cli))?;
        Ok(SiteConfig::from_config(&config)
            .with_site_dir(site_dir.clone())
            .with_live_reload(live_reload))
    })
}

/// Serve the site until Ctrl-C.
///
/// `site` must already be built into `config.site_dir`. With live reload
/// enabled it is handed to a watch session; otherwise it is only served.
pub async fn run_server(config: ServerConfig, site: LiveSite) -> Result<(), ServerError> {
    let (reloads, watch) = if config.live_reload {
        let (tx, _rx) = broadcast::channel::<ReloadEvent>(100);
        let session = Session::new(site, tx.clone());
        tracing::debug!(
            roots = ?session.router().watch_roots(),
            "Starting live reload"
        );
        let watch = spawn_session(session, config.debounce)?;
        (Some(tx), Some(watch))
    } else {
        (None, None)
    };

    let state = Arc::new(AppState {
        site_dir: config.site_dir.clone(),
        reloads,
    });
    let app = app::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(address = %addr, site = %config.site_dir.display(), "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    if let Some(watch) = watch
        && let Err(e) = tokio::task::spawn_blocking(move || watch.stop()).await
    {
        tracing::warn!(error = %e, "Live reload did not stop cleanly");
    }
    Ok(())
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
