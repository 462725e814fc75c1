use std::fmt;
use std::sync::Arc;

use kasumi_core::{BotCache, CacheResult, Channel, Entity, Message, Server, Snowflake, User};

use super::definition::Command;
use crate::bot::Bot;
use crate::events::MessageCreate;

/// Everything a command body gets to see besides its arguments.
#[derive(Clone)]
pub struct CommandContext {
    bot: Bot,
    event: Arc<MessageCreate>,
    command: Arc<Command>,
    invoked_as: String,
}

impl CommandContext {
    pub fn new(
        bot: Bot,
        event: Arc<MessageCreate>,
        command: Arc<Command>,
        invoked_as: impl Into<String>,
    ) -> Self {
        Self {
            bot,
            event,
            command,
            invoked_as: invoked_as.into(),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn cache(&self) -> &BotCache {
        self.bot.cache()
    }

    pub fn event(&self) -> &Arc<MessageCreate> {
        &self.event
    }

    pub fn message(&self) -> &Arc<Message> {
        &self.event.message
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.event.channel
    }

    pub fn author(&self) -> &Arc<User> {
        &self.event.author
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// The name or alias the user typed, lower-cased.
    pub fn invoked_as(&self) -> &str {
        &self.invoked_as
    }

    /// The server of the invoking channel; `None` in private channels.
    pub async fn server(&self) -> CacheResult<Option<Arc<Server>>> {
        match self.channel().server_id() {
            Some(id) => self.cache().get_server(id, false).await,
            None => Ok(None),
        }
    }

    /// Role ids of the invoking member; empty outside servers.
    pub async fn member_roles(&self) -> CacheResult<Vec<Snowflake>> {
        let Some(server) = self.server().await? else {
            return Ok(Vec::new());
        };
        let member = self
            .cache()
            .get_member(&server, self.author().id(), false)
            .await?;
        Ok(member.map(|m| m.roles()).unwrap_or_default())
    }

    /// Sends `text` to the invoking channel.
    pub async fn reply(&self, text: &str) -> CacheResult<Arc<Message>> {
        self.bot.send_message(self.channel().id(), text).await
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.command.name())
            .field("invoked_as", &self.invoked_as)
            .field("channel", &self.channel().id())
            .field("author", &self.author().id())
            .finish()
    }
}
