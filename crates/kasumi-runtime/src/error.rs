//! Runtime error types.

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors raised while setting up or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global subscriber was already installed.
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),

    /// The requested bot cannot be set up.
    #[error("bot error: {0}")]
    Bot(String),

    /// Reading from a local transport failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
