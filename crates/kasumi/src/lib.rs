//! # Kasumi
//!
//! An in-process chat bot runtime: an identity-preserving entity cache, a
//! filtered event bus and a command pipeline with reaction-driven
//! interactive components.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────┐     ┌───────────┐     ┌──────────────────────────┐
//! │ Transport │────▶│ Gateway │────▶│ BotCache  │     │ callback (own task)      │
//! │ (RawEvent)│     │         │────▶│ EventBus  │────▶│ command pipeline (task)  │──▶ command body
//! └───────────┘     └─────────┘     └───────────┘────▶│ paginator buttons (task) │
//!                                                     └──────────────────────────┘
//! ```
//!
//! - **Gateway**: applies raw events to the cache, then publishes typed events
//! - **BotCache**: one live instance per entity id, remote fetch on miss
//! - **EventBus**: callbacks matched by filter, each run isolated
//! - **Commands**: prefix, tokenizer, typed arguments and access checks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kasumi::prelude::*;
//!
//! #[kasumi::framework::linkme::distributed_slice(MODULES)]
//! #[linkme(crate = kasumi::framework::linkme)]
//! static GREET: ModuleEntry = ModuleEntry::new("greet", |bot: &Bot| {
//!     bot.command("hello")
//!         .handler(|ctx, _| async move { format!("Hello, {}!", ctx.author().username()) });
//! });
//! ```

pub use kasumi_core as core;
pub use kasumi_framework as framework;
pub use kasumi_runtime as runtime;

pub mod modules;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use kasumi::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use kasumi_runtime::{ConsoleApi, KasumiConfig, LoggingBuilder, Runtime, load_config};

    // Bot, commands and modules
    pub use kasumi_framework::{
        Args, ArgCount, ArgMode, ArgType, Bot, BoxError, CommandContext, Halt, MODULES, Module,
        ModuleEntry,
    };

    // Events and interactive components
    pub use kasumi_core::{Entity, Filter, Snowflake};
    pub use kasumi_framework::events::*;
    pub use kasumi_framework::interaction::{AutoCancel, Gesture, PaginateOptions, Pagination};
}
