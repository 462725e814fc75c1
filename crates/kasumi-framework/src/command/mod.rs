//! The command pipeline.
//!
//! Commands are registered on a [`Bot`](crate::Bot) with a name, aliases,
//! [`CommandAttributes`] and an async body:
//!
//! ```rust,ignore
//! use kasumi_framework::command::{ArgMode, ArgType, Args, CommandContext};
//!
//! bot.command("roll")
//!     .aliases(["dice"])
//!     .arg_count(1..=2)
//!     .arg_types([ArgType::Integer])
//!     .usage("roll <sides> [count]")
//!     .handler(|_ctx: CommandContext, args: Args| async move {
//!         let sides = args.int(0).unwrap_or(6);
//!         format!("rolled a d{sides}")
//!     });
//! ```
//!
//! Every posted message runs through [`pipeline::handle_message`], which
//! strips the prefix, resolves the command, tokenizes and coerces the
//! arguments and calls the command's tower service. Arity and access checks
//! are [`tower::filter`] layers of that service, see [`layer`].

pub mod context;
pub mod definition;
pub mod layer;
pub mod parse;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use context::CommandContext;
pub use definition::{
    ArgCount, ArgMode, Command, CommandAttributes, CommandGroup, CommandService, DEFAULT_GROUP,
};
pub use layer::{AccessCheck, ArityCheck, CommandResponse, HandlerService, Invocation, command_service};
pub use pipeline::{Prefix, ReplyTemplates};
pub use registry::{CommandRegistry, PermissionRegistry};
pub use types::{Arg, ArgType, Args, CoerceContext, FromArgument, Ratio};
