//! # Kasumi Framework
//!
//! Event dispatch, commands and interactive components on top of
//! [`kasumi_core`].
//!
//! This layer provides:
//! - [`EventBus`]: typed events matched against [`Filter`](kasumi_core::Filter)s,
//!   one isolated task per matching callback
//! - The command pipeline: prefix, tokenizer, typed arguments, arity and
//!   access checks as tower filters in front of the command body
//! - [`Bot`]: one account's cache, bus and command tables
//! - Reaction [`Buttons`](interaction::Buttons) and
//!   [`Pagination`](interaction::Pagination)
//! - [`Module`]s, installed explicitly or collected at link time
//!
//! Unhandled failures in any task are logged, passed to the exception hook
//! and re-published as [`ExceptionEvent`](events::ExceptionEvent).

pub mod bot;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod hook;
pub mod interaction;
pub mod module;
pub mod runner;

pub use linkme;

pub use bot::{Bot, BotSettings, CommandBuilder, DEFAULT_PAGINATE_TIMEOUT};
pub use command::{
    Arg, ArgCount, ArgMode, ArgType, Args, Command, CommandAttributes, CommandContext,
    CommandGroup, Prefix, ReplyTemplates,
};
pub use dispatcher::{CallbackId, EventBus, EventDispatcher};
pub use error::{
    AccessError, ArgumentError, BoxError, CommandError, Halt, InteractionError, SyntaxError,
};
pub use hook::{Exception, ExceptionHook, ExceptionSource};
pub use interaction::{PaginateOptions, Pagination};
pub use module::{MODULES, Module, ModuleEntry};
pub use runner::TaskRunner;
