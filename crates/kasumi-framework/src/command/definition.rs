//! Command definitions, attributes and groups.

use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeToInclusive};
use std::sync::Arc;
use std::time::Duration;

use kasumi_core::Permissions;
use tower::BoxError;
use tower::util::BoxCloneSyncService;

use super::layer::Invocation;
use super::parse;
use crate::error::SyntaxError;

/// Default group of commands that name none.
pub const DEFAULT_GROUP: &str = "Generic";

// =============================================================================
// Attributes
// =============================================================================

/// Inclusive range of accepted argument counts. `max = None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgCount {
    pub min: usize,
    pub max: Option<usize>,
}

impl ArgCount {
    pub const ANY: Self = Self { min: 0, max: None };

    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }
}

impl From<usize> for ArgCount {
    fn from(n: usize) -> Self {
        Self::exactly(n)
    }
}

impl From<RangeInclusive<usize>> for ArgCount {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self {
            min: *range.start(),
            max: Some(*range.end()),
        }
    }
}

impl From<Range<usize>> for ArgCount {
    fn from(range: Range<usize>) -> Self {
        Self {
            min: range.start,
            max: Some(range.end.saturating_sub(1)),
        }
    }
}

impl From<RangeFrom<usize>> for ArgCount {
    fn from(range: RangeFrom<usize>) -> Self {
        Self {
            min: range.start,
            max: None,
        }
    }
}

impl From<RangeToInclusive<usize>> for ArgCount {
    fn from(range: RangeToInclusive<usize>) -> Self {
        Self {
            min: 0,
            max: Some(range.end),
        }
    }
}

impl From<RangeFull> for ArgCount {
    fn from(_: RangeFull) -> Self {
        Self::ANY
    }
}

/// A user-supplied tokenizer.
pub type TokenizeFn = Arc<dyn Fn(&str) -> Result<Vec<String>, SyntaxError> + Send + Sync>;

/// How the raw argument text is split into tokens.
#[derive(Clone, Default)]
pub enum ArgMode {
    /// The whole text is one argument.
    Concat,
    /// Quote-aware whitespace splitting.
    #[default]
    Words,
    Custom(TokenizeFn),
}

impl ArgMode {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<String>, SyntaxError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<String>, SyntaxError> {
        match self {
            Self::Concat => Ok(parse::concat(input)),
            Self::Words => parse::words(input),
            Self::Custom(f) => f(input),
        }
    }
}

impl fmt::Debug for ArgMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concat => f.write_str("Concat"),
            Self::Words => f.write_str("Words"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Everything about a command except its body.
#[derive(Debug, Clone)]
pub struct CommandAttributes {
    pub group: String,
    pub arg_count: ArgCount,
    pub arg_mode: ArgMode,
    pub arg_types: Vec<super::ArgType>,
    pub owner_only: bool,
    pub permissions: Permissions,
    pub usage: Option<String>,
    pub description: Option<String>,
    pub hide_help: bool,
}

impl Default for CommandAttributes {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_owned(),
            arg_count: ArgCount::ANY,
            arg_mode: ArgMode::Words,
            arg_types: Vec::new(),
            owner_only: false,
            permissions: Permissions::new(),
            usage: None,
            description: None,
            hide_help: false,
        }
    }
}

impl CommandAttributes {
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn arg_count(mut self, count: impl Into<ArgCount>) -> Self {
        self.arg_count = count.into();
        self
    }

    pub fn arg_mode(mut self, mode: ArgMode) -> Self {
        self.arg_mode = mode;
        self
    }

    pub fn arg_types(mut self, types: impl IntoIterator<Item = super::ArgType>) -> Self {
        self.arg_types = types.into_iter().collect();
        self
    }

    pub fn owner_only(mut self, owner_only: bool) -> Self {
        self.owner_only = owner_only;
        self
    }

    pub fn permissions<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = flags.into_iter().collect();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hide_help(mut self, hide: bool) -> Self {
        self.hide_help = hide;
        self
    }
}

// =============================================================================
// Command
// =============================================================================

/// The composed, type-erased body of a command: validation layers plus
/// the handler.
pub type CommandService = BoxCloneSyncService<Invocation, (), BoxError>;

/// A registered command.
pub struct Command {
    name: String,
    aliases: Vec<String>,
    attributes: CommandAttributes,
    service: CommandService,
}

impl Command {
    /// Names are stored lower-cased since lookup is case-insensitive.
    pub fn new(
        name: impl Into<String>,
        aliases: impl IntoIterator<Item = impl Into<String>>,
        attributes: CommandAttributes,
        service: CommandService,
    ) -> Self {
        Self {
            name: name.into().to_lowercase(),
            aliases: aliases.into_iter().map(|a| a.into().to_lowercase()).collect(),
            attributes,
            service,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn attributes(&self) -> &CommandAttributes {
        &self.attributes
    }

    /// A fresh handle to the command's service.
    pub fn service(&self) -> CommandService {
        self.service.clone()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Groups
// =============================================================================

/// Shared defaults of a named set of commands.
#[derive(Debug, Clone, Default)]
pub struct CommandGroup {
    pub name: String,
    /// Suggested pause between uses, shown in help.
    pub delay: Option<Duration>,
    pub permissions: Permissions,
    pub owner_only: bool,
}

impl CommandGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn permissions<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = flags.into_iter().collect();
        self
    }

    pub fn owner_only(mut self, owner_only: bool) -> Self {
        self.owner_only = owner_only;
        self
    }
}
