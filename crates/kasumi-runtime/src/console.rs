//! A local transport: stdin in, stdout out.
//!
//! Every line typed becomes a message from the console user in the single
//! console channel. A few slash lines act on the last message the bot sent:
//!
//! ```text
//! /react <emoji|first|prev|next|last|stop>
//! /unreact <emoji|...>
//! /delete
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use kasumi_core::{ApiError, ApiResult, Emoji, MessageData, RemoteApi, Snowflake, UserData};
use kasumi_framework::interaction::Gesture;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::RuntimeResult;
use crate::gateway::{RawEvent, ReactionData};

pub const CONSOLE_BOT: Snowflake = Snowflake(1);
pub const CONSOLE_USER: Snowflake = Snowflake(2);
pub const CONSOLE_SERVER: Snowflake = Snowflake(100);
pub const CONSOLE_CHANNEL: Snowflake = Snowflake(101);

const FIRST_MESSAGE_ID: u64 = 1_000;

/// [`RemoteApi`] over the terminal.
#[derive(Debug)]
pub struct ConsoleApi {
    bot_name: String,
    echo: bool,
    next_id: AtomicU64,
    messages: Mutex<HashMap<Snowflake, Value>>,
    last_sent: Mutex<Option<Snowflake>>,
    transcript: Mutex<Vec<String>>,
}

impl ConsoleApi {
    /// A console printing the bot's output to stdout.
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            echo: true,
            next_id: AtomicU64::new(FIRST_MESSAGE_ID),
            messages: Mutex::new(HashMap::new()),
            last_sent: Mutex::new(None),
            transcript: Mutex::new(Vec::new()),
        }
    }

    /// A console that only records its output.
    pub fn silent(bot_name: impl Into<String>) -> Self {
        Self {
            echo: false,
            ..Self::new(bot_name)
        }
    }

    /// Everything the bot has printed so far.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().clone()
    }

    /// The message the bot sent last.
    pub fn last_sent(&self) -> Option<Snowflake> {
        *self.last_sent.lock()
    }

    pub fn bot_user(&self) -> Value {
        json!({ "id": CONSOLE_BOT.to_string(), "username": self.bot_name, "bot": true })
    }

    pub fn console_user(&self) -> Value {
        json!({ "id": CONSOLE_USER.to_string(), "username": "console" })
    }

    /// The event a transport delivers on connect.
    pub fn ready_event(&self) -> RuntimeResult<RawEvent> {
        let user: UserData = serde_json::from_value(self.bot_user()).map_err(decode_error)?;
        let server = serde_json::from_value(self.server()).map_err(decode_error)?;
        Ok(RawEvent::Ready {
            user,
            servers: vec![server],
        })
    }

    /// Turns one input line into an event. `None` for blank lines and
    /// commands with nothing to act on.
    pub fn parse_line(&self, line: &str) -> Option<RawEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head {
            "/react" | "/unreact" if !rest.is_empty() => {
                let data = ReactionData {
                    message_id: self.last_sent()?,
                    channel_id: CONSOLE_CHANNEL,
                    user_id: CONSOLE_USER,
                    emoji: Emoji::unicode(reaction_emoji(rest)),
                };
                Some(if head == "/react" {
                    RawEvent::ReactionAdd(data)
                } else {
                    RawEvent::ReactionRemove(data)
                })
            }
            "/delete" => {
                let id = self.last_sent.lock().take()?;
                self.messages.lock().remove(&id);
                Some(RawEvent::MessageDelete {
                    id,
                    channel_id: CONSOLE_CHANNEL,
                })
            }
            _ => {
                let (_, value) = self.store(self.console_user(), line);
                // Our own payload always decodes.
                let data: MessageData = serde_json::from_value(value).ok()?;
                Some(RawEvent::MessageCreate(data))
            }
        }
    }

    fn server(&self) -> Value {
        json!({
            "id": CONSOLE_SERVER.to_string(),
            "name": "console",
            "channels": [self.channel()],
        })
    }

    fn channel(&self) -> Value {
        json!({
            "id": CONSOLE_CHANNEL.to_string(),
            "type": 0,
            "name": "console",
            "guild_id": CONSOLE_SERVER.to_string(),
        })
    }

    fn store(&self, author: Value, content: &str) -> (Snowflake, Value) {
        let id = Snowflake(self.next_id.fetch_add(1, Ordering::Relaxed));
        let value = json!({
            "id": id.to_string(),
            "channel_id": CONSOLE_CHANNEL.to_string(),
            "author": author,
            "content": content,
        });
        self.messages.lock().insert(id, value.clone());
        (id, value)
    }

    fn print(&self, line: String) {
        if self.echo {
            println!("{line}");
        }
        self.transcript.lock().push(line);
    }

    fn check_channel(channel: Snowflake) -> ApiResult<()> {
        if channel == CONSOLE_CHANNEL {
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}

fn reaction_emoji(name: &str) -> String {
    let gesture = match name.to_ascii_lowercase().as_str() {
        "first" => Some(Gesture::First),
        "prev" | "previous" | "back" => Some(Gesture::Previous),
        "next" => Some(Gesture::Next),
        "last" => Some(Gesture::Last),
        "stop" => Some(Gesture::Stop),
        _ => None,
    };
    gesture.map_or_else(|| name.to_owned(), |g| g.emoji().to_owned())
}

fn decode_error(err: serde_json::Error) -> crate::error::RuntimeError {
    crate::error::RuntimeError::Bot(format!("invalid console payload: {err}"))
}

#[async_trait]
impl RemoteApi for ConsoleApi {
    async fn resolve_server(&self, id: Snowflake) -> ApiResult<Value> {
        if id == CONSOLE_SERVER {
            Ok(self.server())
        } else {
            Err(ApiError::NotFound)
        }
    }

    async fn resolve_channel(&self, id: Snowflake) -> ApiResult<Value> {
        Self::check_channel(id)?;
        Ok(self.channel())
    }

    async fn resolve_user(&self, id: Snowflake) -> ApiResult<Value> {
        match id {
            CONSOLE_BOT => Ok(self.bot_user()),
            CONSOLE_USER => Ok(self.console_user()),
            _ => Err(ApiError::NotFound),
        }
    }

    async fn resolve_member(&self, server: Snowflake, user: Snowflake) -> ApiResult<Value> {
        if server != CONSOLE_SERVER {
            return Err(ApiError::NotFound);
        }
        let user = self.resolve_user(user).await?;
        Ok(json!({ "user": user, "roles": [] }))
    }

    async fn resolve_message(&self, channel: Snowflake, id: Snowflake) -> ApiResult<Value> {
        Self::check_channel(channel)?;
        self.messages.lock().get(&id).cloned().ok_or(ApiError::NotFound)
    }

    async fn create_pm(&self, _user: Snowflake) -> ApiResult<Value> {
        Err(ApiError::PermissionDenied)
    }

    async fn send_message(&self, channel: Snowflake, content: &str) -> ApiResult<Value> {
        Self::check_channel(channel)?;
        let (id, value) = self.store(self.bot_user(), content);
        *self.last_sent.lock() = Some(id);
        self.print(format!("[{}] {content}", self.bot_name));
        Ok(value)
    }

    async fn edit_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
        content: &str,
    ) -> ApiResult<Value> {
        Self::check_channel(channel)?;
        let mut messages = self.messages.lock();
        let value = messages.get_mut(&message).ok_or(ApiError::NotFound)?;
        value["content"] = Value::from(content);
        let value = value.clone();
        drop(messages);
        self.print(format!("[{} edited #{message}] {content}", self.bot_name));
        Ok(value)
    }

    async fn delete_message(&self, channel: Snowflake, message: Snowflake) -> ApiResult<()> {
        Self::check_channel(channel)?;
        self.messages
            .lock()
            .remove(&message)
            .ok_or(ApiError::NotFound)?;
        self.print(format!("[message #{message} deleted]"));
        Ok(())
    }

    async fn add_reaction(&self, channel: Snowflake, message: Snowflake, emoji: &str) -> ApiResult<()> {
        Self::check_channel(channel)?;
        self.print(format!("[#{message} +{emoji}]"));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: &str,
        user: Option<Snowflake>,
    ) -> ApiResult<()> {
        Self::check_channel(channel)?;
        // The console user's own reactions are not shown, so only the bot's
        // removals are worth printing.
        if user.is_none() {
            self.print(format!("[#{message} -{emoji}]"));
        }
        Ok(())
    }

    async fn clear_reactions(&self, channel: Snowflake, message: Snowflake) -> ApiResult<()> {
        Self::check_channel(channel)?;
        self.print(format!("[#{message} reactions cleared]"));
        Ok(())
    }
}

/// Feeds stdin into `events` until end of input or until the receiver goes
/// away. Sends the ready event first.
pub fn spawn_reader(api: Arc<ConsoleApi>, events: mpsc::Sender<RawEvent>) -> JoinHandle<RuntimeResult<()>> {
    tokio::spawn(async move {
        if events.send(api.ready_event()?).await.is_err() {
            return Ok(());
        }
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(event) = api.parse_line(&line) else {
                continue;
            };
            debug!(event = event.name(), "console input");
            if events.send(event).await.is_err() {
                break;
            }
        }
        info!("Console input closed");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Gateway;
    use kasumi_core::CacheSettings;
    use kasumi_framework::interaction::AutoCancel;
    use kasumi_framework::{Bot, BotSettings, BoxError, PaginateOptions};
    use tokio_test::assert_ok;

    fn console() -> (Arc<ConsoleApi>, Gateway) {
        let api = Arc::new(ConsoleApi::silent("kasumi"));
        let bot = Bot::new("console", api.clone(), BotSettings::default(), CacheSettings::default());
        (api, Gateway::new(bot))
    }

    #[test]
    fn lines_become_events() {
        let api = ConsoleApi::silent("kasumi");
        assert!(api.parse_line("   ").is_none());
        // Nothing to react to yet.
        assert!(api.parse_line("/react next").is_none());

        match api.parse_line("hello there") {
            Some(RawEvent::MessageCreate(data)) => {
                assert_eq!(data.content, "hello there");
                assert_eq!(data.author.id, CONSOLE_USER);
                assert_eq!(data.channel_id, CONSOLE_CHANNEL);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gesture_names_map_to_emoji() {
        assert_eq!(reaction_emoji("NEXT"), Gesture::Next.emoji());
        assert_eq!(reaction_emoji("prev"), Gesture::Previous.emoji());
        assert_eq!(reaction_emoji("\u{1F44D}"), "\u{1F44D}");
    }

    #[tokio::test]
    async fn commands_answer_on_the_console() {
        let (api, gw) = console();
        gw.bot().command("ping").handler(|_, _| async { "pong" });

        assert_ok!(gw.handle(assert_ok!(api.ready_event())).await);
        let event = api.parse_line("!ping").unwrap();
        assert_ok!(gw.handle(event).await);
        gw.bot().drain().await;

        assert_eq!(api.transcript(), vec!["[kasumi] pong".to_owned()]);
        assert!(api.last_sent().is_some());
    }

    #[tokio::test]
    async fn reactions_page_through_a_paginator() {
        let (api, gw) = console();
        gw.bot().command("pages").handler(|ctx, _| async move {
            let message = ctx.reply("...").await?;
            let (bot, target) = (ctx.bot().clone(), Arc::clone(&message));
            let render = move |page: usize| {
                let (bot, target) = (bot.clone(), Arc::clone(&target));
                async move {
                    bot.edit_message(&target, &format!("page {page}")).await?;
                    Ok::<_, BoxError>(())
                }
            };
            let options = PaginateOptions::default()
                .owner(CONSOLE_USER)
                .auto_cancel(AutoCancel::Never);
            ctx.bot().paginate(&message, 3, render, options).await?;
            Ok::<_, BoxError>(())
        });

        assert_ok!(gw.handle(assert_ok!(api.ready_event())).await);
        assert_ok!(gw.handle(api.parse_line("!pages").unwrap()).await);
        gw.bot().drain().await;

        assert_ok!(gw.handle(api.parse_line("/react next").unwrap()).await);
        gw.bot().drain().await;
        assert!(api.transcript().iter().any(|line| line.ends_with("page 2")));

        assert_ok!(gw.handle(api.parse_line("/react stop").unwrap()).await);
        gw.bot().drain().await;
        assert!(api.transcript().last().is_some_and(|line| line.ends_with("deleted]")));
    }
}
