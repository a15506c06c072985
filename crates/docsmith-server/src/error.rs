//! Server error types.

use std::io;

use docsmith_site::BuildError;

/// Error starting or running the preview server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
    #[error("Failed to watch for changes: {0}")]
    Watch(#[from] notify::Error),
    #[error("Failed to start live reload thread: {0}")]
    Thread(#[source] io::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
}
