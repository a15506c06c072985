//! Shared state for request handlers.

use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::live_reload::ReloadEvent;

pub(crate) struct AppState {
    /// Built site served as static files.
    pub(crate) site_dir: PathBuf,
    /// Reload broadcaster, `None` when live reload is off.
    pub(crate) reloads: Option<broadcast::Sender<ReloadEvent>>,
}
