//! Router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::live_reload::{self, LIVE_RELOAD_PATH};
use crate::state::AppState;

/// Static files from the site directory, plus the reload socket when enabled.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();
    if state.reloads.is_some() {
        router = router.route(LIVE_RELOAD_PATH, get(live_reload::ws_handler));
    }

    router
        .fallback_service(ServeDir::new(&state.site_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
