//! CLI error types.

use docsmith_config::ConfigError;
use docsmith_server::ServerError;
use docsmith_site::BuildError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
