//! Feature modules.
//!
//! A module bundles commands and event callbacks and installs them on a
//! [`Bot`]. Modules can be included explicitly with [`Bot::include`], or
//! contributed to the [`MODULES`] registry from any crate linked into the
//! binary and installed together with [`Bot::include_registered`]:
//!
//! ```rust,ignore
//! use kasumi_framework::{Bot, module::{MODULES, ModuleEntry}};
//!
//! #[kasumi_framework::linkme::distributed_slice(MODULES)]
//! #[linkme(crate = kasumi_framework::linkme)]
//! static PING: ModuleEntry = ModuleEntry::new("ping", |bot: &Bot| {
//!     bot.command("ping").handler(|_ctx, _args| async { "pong" });
//! });
//! ```

use std::fmt;

use linkme::distributed_slice;

use crate::bot::Bot;

/// Something that installs commands and callbacks on a bot.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    fn install(&self, bot: &Bot);
}

/// Function pointer form of a module, used by the [`MODULES`] registry.
#[derive(Clone, Copy)]
pub struct ModuleEntry {
    name: &'static str,
    install: fn(&Bot),
}

impl ModuleEntry {
    pub const fn new(name: &'static str, install: fn(&Bot)) -> Self {
        Self { name, install }
    }
}

impl Module for ModuleEntry {
    fn name(&self) -> &str {
        self.name
    }

    fn install(&self, bot: &Bot) {
        (self.install)(bot);
    }
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry").field("name", &self.name).finish()
    }
}

/// Registry of modules linked into the binary.
#[distributed_slice]
pub static MODULES: [ModuleEntry];
