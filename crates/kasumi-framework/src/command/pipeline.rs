//! From a posted message to a running command.
//!
//! ```text
//! PrefixCheck ─▶ Lookup ─▶ Tokenize ─▶ TypeCoerce ─▶ ArityCheck ─▶ AccessCheck ─▶ Invoke
//! ```
//!
//! Lookup failures and validation errors are answered with a templated
//! reply; anything else the body raises goes to the exception hook.

use std::fmt;
use std::sync::Arc;

use kasumi_core::Entity;
use serde::{Deserialize, Serialize};
use tower::{BoxError, ServiceExt};
use tracing::{debug, info_span, trace};

use super::context::CommandContext;
use super::definition::Command;
use super::layer::Invocation;
use super::parse;
use super::types::{CoerceContext, coerce_all};
use crate::bot::Bot;
use crate::error::{AccessError, ArgumentError, CommandError, SyntaxError};
use crate::events::{MessageCreate, MessageLike};
use crate::hook::ExceptionSource;

// =============================================================================
// Prefix
// =============================================================================

/// A prefix predicate: returns the text after the prefix on a match.
pub type PrefixFn = Arc<dyn Fn(&str, &MessageCreate) -> Option<String> + Send + Sync>;

/// What marks a message as a command.
#[derive(Clone)]
pub enum Prefix {
    Literal(String),
    /// Tried in order; the first match wins.
    List(Vec<Prefix>),
    Custom(PrefixFn),
}

impl Prefix {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &MessageCreate) -> Option<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Strips the prefix from `text`, or `None` when it does not apply.
    pub fn strip(&self, text: &str, event: &MessageCreate) -> Option<String> {
        match self {
            Self::Literal(prefix) => text.strip_prefix(prefix.as_str()).map(str::to_owned),
            Self::List(prefixes) => prefixes.iter().find_map(|p| p.strip(text, event)),
            Self::Custom(f) => f(text, event),
        }
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self::Literal("!".to_owned())
    }
}

impl From<&str> for Prefix {
    fn from(prefix: &str) -> Self {
        Self::Literal(prefix.to_owned())
    }
}

impl From<Vec<String>> for Prefix {
    fn from(prefixes: Vec<String>) -> Self {
        Self::List(prefixes.into_iter().map(Self::Literal).collect())
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(p) => f.debug_tuple("Literal").field(p).finish(),
            Self::List(ps) => f.debug_tuple("List").field(ps).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// =============================================================================
// Reply Templates
// =============================================================================

/// Replies for pipeline failures.
///
/// Placeholders: `{cmd}`, `{usage}`, `{err}` and `{index}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTemplates {
    pub unknown_command: String,
    pub syntax: String,
    pub arg_parse: String,
    pub too_few: String,
    pub too_many: String,
    pub owner: String,
    pub permissions: String,
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self {
            unknown_command: "Unknown command `{cmd}`.".into(),
            syntax: "Invalid syntax for `{cmd}`: {err}.\nUsage: {usage}".into(),
            arg_parse: "Argument {index} of `{cmd}` is invalid.\nUsage: {usage}".into(),
            too_few: "Not enough arguments for `{cmd}`.\nUsage: {usage}".into(),
            too_many: "Too many arguments for `{cmd}`.\nUsage: {usage}".into(),
            owner: "`{cmd}` is reserved for the bot owners.".into(),
            permissions: "You lack the permissions required by `{cmd}`.".into(),
        }
    }
}

impl ReplyTemplates {
    /// Renders the reply for `err` raised by command `cmd`.
    pub fn render(&self, err: &CommandError, cmd: &str, usage: &str) -> String {
        let (template, index) = match err {
            CommandError::UnknownCommand(_) => (&self.unknown_command, None),
            CommandError::Syntax(SyntaxError::ArgParse { index }) => (&self.arg_parse, Some(*index)),
            CommandError::Syntax(SyntaxError::BadQuotes) => (&self.syntax, None),
            CommandError::Argument(ArgumentError::TooFew) => (&self.too_few, None),
            CommandError::Argument(ArgumentError::TooMany) => (&self.too_many, None),
            CommandError::Access(AccessError::Owner) => (&self.owner, None),
            CommandError::Access(AccessError::Permissions) => (&self.permissions, None),
        };
        template
            .replace("{cmd}", cmd)
            .replace("{usage}", usage)
            .replace("{err}", &err.to_string())
            .replace("{index}", &index.map(|i| i.to_string()).unwrap_or_default())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs the command pipeline for one posted message.
///
/// Returns once the command task has been started; the body itself runs as
/// its own task on the bot's runner.
pub async fn handle_message(bot: Bot, event: Arc<MessageCreate>) -> Result<(), BoxError> {
    let content = event.content();
    let settings = bot.settings();
    let Some(stripped) = settings.prefix.strip(content.trim(), &event) else {
        return Ok(());
    };
    let Some((name, raw)) = parse::split_invocation(&stripped) else {
        trace!("empty command");
        return Ok(());
    };

    let name = name.to_lowercase();
    let Some(command) = bot.commands().lookup(&name) else {
        debug!(command = %name, "unknown command");
        let err = CommandError::UnknownCommand(name.clone());
        bot.send_message(event.channel.id(), &settings.templates.render(&err, &name, ""))
            .await?;
        return Ok(());
    };

    debug!(command = %command.name(), invoked_as = %name, "command matched");
    let raw = raw.to_owned();
    let span = info_span!("command", name = %command.name());
    let ctx = CommandContext::new(bot.clone(), event, Arc::clone(&command), name);
    bot.runner().spawn(
        ExceptionSource::Command,
        command.name().to_owned(),
        span,
        run_command(ctx, command, raw),
    );
    Ok(())
}

async fn run_command(ctx: CommandContext, command: Arc<Command>, raw: String) -> Result<(), BoxError> {
    let err = match invoke(ctx.clone(), &command, &raw).await {
        Ok(()) => return Ok(()),
        Err(err) => err.downcast::<CommandError>()?,
    };
    debug!(kind = err.kind(), "command rejected");
    let usage = command.attributes().usage.as_deref().unwrap_or_default();
    let reply = ctx
        .bot()
        .settings()
        .templates
        .render(&err, ctx.invoked_as(), usage);
    ctx.reply(&reply).await?;
    Ok(())
}

async fn invoke(ctx: CommandContext, command: &Command, raw: &str) -> Result<(), BoxError> {
    let attributes = command.attributes();
    let tokens = attributes
        .arg_mode
        .tokenize(raw)
        .map_err(CommandError::from)?;
    let coerce = CoerceContext {
        cache: ctx.cache(),
        server: ctx.server().await?,
    };
    let args = coerce_all(tokens, &attributes.arg_types, &coerce)
        .await
        .map_err(CommandError::from)?;
    command.service().oneshot(Invocation { ctx, args }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fill_placeholders() {
        let templates = ReplyTemplates::default();
        let err = CommandError::from(SyntaxError::ArgParse { index: 2 });
        assert_eq!(
            templates.render(&err, "roll", "roll <dice>"),
            "Argument 2 of `roll` is invalid.\nUsage: roll <dice>"
        );
        let err = CommandError::UnknownCommand("nope".into());
        assert_eq!(templates.render(&err, "nope", ""), "Unknown command `nope`.");
    }
}
