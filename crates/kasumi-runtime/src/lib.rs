//! Kasumi Runtime - Orchestration layer for the Kasumi bot runtime.
//!
//! This crate provides:
//! - Layered configuration (`KasumiConfig`, `ConfigLoader`)
//! - Logging setup driven by that configuration (`LoggingBuilder`)
//! - The gateway applying raw transport events to a bot (`Gateway`)
//! - The event loop with signal handling (`Runtime`)
//! - A stdin/stdout transport for local use (`console`)
//!
//! ```ignore
//! use std::sync::Arc;
//! use kasumi_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let _guard = LoggingBuilder::from_config(&config.logging).try_init()?;
//!
//!     let api = Arc::new(ConsoleApi::new("kasumi"));
//!     let runtime = Runtime::new(&config, "main", api.clone())?;
//!     runtime.bot().include_registered();
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(64);
//!     console::spawn_reader(api, tx);
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, KasumiConfig, LogLevel, load_config,
};
pub use console::ConsoleApi;
pub use error::{RuntimeError, RuntimeResult};
pub use gateway::{Gateway, RawEvent, ReactionData};
pub use logging::{LoggingBuilder, LoggingGuard, SpanEvents};
pub use runtime::Runtime;

/// Startup types and the logging macros, for binaries and modules.
pub mod prelude {
    pub use crate::config::{KasumiConfig, load_config};
    pub use crate::console::{self, ConsoleApi};
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::logging::LoggingBuilder;
    pub use crate::runtime::Runtime;
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
