//! Rebuild-on-change for the preview server.

mod debouncer;
mod router;
mod session;
mod websocket;

pub use debouncer::{EventDebouncer, FsEvent, FsEventKind};
pub use router::{LiveReloadRouter, RebuildAction, RebuildTarget, builder_bindings};
pub use session::{ConfigLoader, LiveSite, ReloadEvent, Session, WatchHandle, spawn};
pub use websocket::LIVE_RELOAD_PATH;
pub(crate) use websocket::ws_handler;
