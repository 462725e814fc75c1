//! From raw transport events to cache updates and bus events.
//!
//! Every raw event is applied to the cache first, so callbacks observe the
//! state the event describes. Events that only concern the cache (servers,
//! channels) are not published.
//!
//! [`Gateway::handle`] never waits on the remote. An event for a channel that
//! is not cached yet is handed to the bot's runner, which resolves the channel
//! and publishes the event once it is known.

use std::sync::Arc;

use kasumi_core::{
    CacheResult, Channel, ChannelData, Emoji, Entity, MessageData, Presence, ServerData,
    Snowflake, Status, User, UserData,
};
use kasumi_framework::{Bot, BoxError, ExceptionSource};
use kasumi_framework::events::{
    Connect, Disconnect, MessageCreate, MessageDelete, MessageUpdate, PresenceUpdate, ReactionAdd,
    ReactionRemove, Ready,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, trace, warn};

/// Reaction payload shared by add and remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionData {
    pub message_id: Snowflake,
    pub channel_id: Snowflake,
    pub user_id: Snowflake,
    pub emoji: Emoji,
}

/// An inbound event as delivered by a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum RawEvent {
    Ready {
        user: UserData,
        #[serde(default)]
        servers: Vec<ServerData>,
    },
    Connect,
    Disconnect {
        #[serde(default)]
        reason: Option<String>,
    },
    ServerCreate(ServerData),
    ServerUpdate(ServerData),
    ServerDelete {
        id: Snowflake,
    },
    ChannelCreate(ChannelData),
    ChannelUpdate(ChannelData),
    ChannelDelete {
        id: Snowflake,
    },
    MessageCreate(MessageData),
    MessageUpdate(MessageData),
    MessageDelete {
        id: Snowflake,
        channel_id: Snowflake,
    },
    ReactionAdd(ReactionData),
    ReactionRemove(ReactionData),
    PresenceUpdate {
        user: UserData,
        #[serde(default)]
        server_id: Option<Snowflake>,
        #[serde(default)]
        status: Status,
        #[serde(default)]
        activity: Option<String>,
    },
}

/// The part of a [`RawEvent`] that needs its channel to be published.
#[derive(Debug)]
enum ChannelEvent {
    MessageCreate(MessageData),
    MessageUpdate(MessageData),
    MessageDelete(Snowflake),
    ReactionAdd(ReactionData),
    ReactionRemove(ReactionData),
}

impl ChannelEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::MessageCreate(_) => "message_create",
            Self::MessageUpdate(_) => "message_update",
            Self::MessageDelete(_) => "message_delete",
            Self::ReactionAdd(_) => "reaction_add",
            Self::ReactionRemove(_) => "reaction_remove",
        }
    }
}

impl RawEvent {
    /// Splits off channel-scoped events, together with their channel id.
    fn into_channel_event(self) -> Result<(Snowflake, ChannelEvent), Self> {
        Ok(match self {
            Self::MessageCreate(data) => (data.channel_id, ChannelEvent::MessageCreate(data)),
            Self::MessageUpdate(data) => (data.channel_id, ChannelEvent::MessageUpdate(data)),
            Self::MessageDelete { id, channel_id } => (channel_id, ChannelEvent::MessageDelete(id)),
            Self::ReactionAdd(data) => (data.channel_id, ChannelEvent::ReactionAdd(data)),
            Self::ReactionRemove(data) => (data.channel_id, ChannelEvent::ReactionRemove(data)),
            other => return Err(other),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Connect => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::ServerCreate(_) => "server_create",
            Self::ServerUpdate(_) => "server_update",
            Self::ServerDelete { .. } => "server_delete",
            Self::ChannelCreate(_) => "channel_create",
            Self::ChannelUpdate(_) => "channel_update",
            Self::ChannelDelete { .. } => "channel_delete",
            Self::MessageCreate(_) => "message_create",
            Self::MessageUpdate(_) => "message_update",
            Self::MessageDelete { .. } => "message_delete",
            Self::ReactionAdd(_) => "reaction_add",
            Self::ReactionRemove(_) => "reaction_remove",
            Self::PresenceUpdate { .. } => "presence_update",
        }
    }
}

/// Applies raw events to one bot.
#[derive(Debug, Clone)]
pub struct Gateway {
    bot: Bot,
    ignore_bots: bool,
    ignore_self: bool,
}

impl Gateway {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            ignore_bots: true,
            ignore_self: true,
        }
    }

    /// Whether messages written by bots reach the bus.
    pub fn ignore_bots(mut self, ignore: bool) -> Self {
        self.ignore_bots = ignore;
        self
    }

    /// Whether messages written by this bot reach the bus.
    pub fn ignore_self(mut self, ignore: bool) -> Self {
        self.ignore_self = ignore;
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Applies `event`. Returns the number of callbacks started.
    ///
    /// Events for channels missing from the cache return `0` here and are
    /// published by a runner task after the channel resolves.
    pub async fn handle(&self, event: RawEvent) -> CacheResult<usize> {
        trace!(event = event.name(), "raw event");
        let event = match event.into_channel_event() {
            Ok((channel_id, event)) => return self.handle_in_channel(channel_id, event).await,
            Err(event) => event,
        };
        let cache = self.bot.cache();
        let started = match event {
            RawEvent::Ready { user, servers } => {
                cache.reset();
                let profile = cache.set_profile(user);
                for server in servers {
                    cache.put_server(server, true);
                }
                info!(user = %profile.username(), "ready");
                self.bot.trigger::<Ready>(Ready { profile })
            }
            RawEvent::Connect => self.bot.trigger::<Connect>(Connect),
            RawEvent::Disconnect { reason } => {
                let started = self.bot.trigger::<Disconnect>(Disconnect { reason });
                cache.reset();
                started
            }
            RawEvent::ServerCreate(data) | RawEvent::ServerUpdate(data) => {
                cache.put_server(data, true);
                0
            }
            RawEvent::ServerDelete { id } => {
                cache.remove_server(id);
                0
            }
            RawEvent::ChannelCreate(data) | RawEvent::ChannelUpdate(data) => {
                cache.put_channel(data, true);
                0
            }
            RawEvent::ChannelDelete { id } => {
                cache.remove_channel(id);
                0
            }
            RawEvent::PresenceUpdate {
                user,
                server_id,
                status,
                activity,
            } => {
                let user = cache.put_user(user, true);
                let presence = Presence { status, activity };
                user.update_presence(presence.clone());
                self.bot.trigger::<PresenceUpdate>(PresenceUpdate {
                    user,
                    server_id,
                    presence,
                })
            }
            RawEvent::MessageCreate(_)
            | RawEvent::MessageUpdate(_)
            | RawEvent::MessageDelete { .. }
            | RawEvent::ReactionAdd(_)
            | RawEvent::ReactionRemove(_) => 0,
        };
        Ok(started)
    }

    async fn handle_in_channel(&self, id: Snowflake, event: ChannelEvent) -> CacheResult<usize> {
        if let Some(channel) = self.bot.cache().get_channel(id, true).await? {
            return Ok(self.publish(channel, event));
        }
        debug!(channel = %id, event = event.name(), "channel not cached, resolving in the background");
        let gateway = self.clone();
        let runner = self.bot.runner();
        let shutdown = runner.shutdown_token().clone();
        let span = info_span!("resolve_channel", channel = %id);
        runner.spawn(ExceptionSource::Event, event.name(), span, async move {
            let channel = tokio::select! {
                biased;
                channel = gateway.bot.cache().get_channel(id, false) => channel?,
                () = shutdown.cancelled() => {
                    debug!(channel = %id, "shut down before the channel resolved");
                    return Ok(());
                }
            };
            match channel {
                Some(channel) => {
                    gateway.publish(channel, event);
                }
                None => warn!(channel = %id, "event for unknown channel dropped"),
            }
            Ok::<_, BoxError>(())
        });
        Ok(0)
    }

    fn publish(&self, channel: Arc<Channel>, event: ChannelEvent) -> usize {
        match event {
            ChannelEvent::MessageCreate(data) => match self.ingest_message(&channel, data) {
                Some((message, author)) => self
                    .bot
                    .trigger::<MessageCreate>(MessageCreate::new(message, channel, author)),
                None => 0,
            },
            ChannelEvent::MessageUpdate(data) => match self.ingest_message(&channel, data) {
                Some((message, author)) => self
                    .bot
                    .trigger::<MessageUpdate>(MessageUpdate::new(message, channel, author)),
                None => 0,
            },
            ChannelEvent::MessageDelete(id) => {
                let message = self.bot.cache().remove_message(&channel, id);
                self.bot.trigger::<MessageDelete>(MessageDelete {
                    id,
                    channel,
                    message,
                })
            }
            ChannelEvent::ReactionAdd(data) => self.bot.trigger::<ReactionAdd>(ReactionAdd {
                message_id: data.message_id,
                channel,
                user_id: data.user_id,
                emoji: data.emoji,
            }),
            ChannelEvent::ReactionRemove(data) => {
                self.bot.trigger::<ReactionRemove>(ReactionRemove {
                    message_id: data.message_id,
                    channel,
                    user_id: data.user_id,
                    emoji: data.emoji,
                })
            }
        }
    }

    /// Caches a created or edited message. `None` when it must not be
    /// published.
    fn ingest_message(
        &self,
        channel: &Arc<Channel>,
        data: MessageData,
    ) -> Option<(Arc<kasumi_core::Message>, Arc<User>)> {
        let cache = self.bot.cache();
        let author = cache.put_user(data.author.clone(), true);
        let message = cache.put_message(channel, data, true);

        let is_self = cache.profile().is_some_and(|p| p.id() == author.id());
        if (self.ignore_self && is_self) || (self.ignore_bots && author.is_bot() && !is_self) {
            debug!(author = %author.id(), "message suppressed");
            return None;
        }
        Some((message, author))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasumi_core::testing::{
        ApiCall, MockApi, bot_user_json, channel_json, server_json, user_json,
    };
    use kasumi_core::{CacheSettings, Filter};
    use kasumi_framework::BotSettings;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn gateway() -> (Arc<MockApi>, Gateway) {
        let api = Arc::new(MockApi::new());
        api.insert_channel(channel_json(10, None, "lobby"));
        let bot = Bot::new("test", api.clone(), BotSettings::default(), CacheSettings::default());
        bot.cache()
            .put_channel(serde_json::from_value(channel_json(10, None, "lobby")).unwrap(), true);
        (api, Gateway::new(bot))
    }

    fn message(id: u64, author: serde_json::Value, content: &str) -> RawEvent {
        message_in(10, id, author, content)
    }

    fn message_in(channel: u64, id: u64, author: serde_json::Value, content: &str) -> RawEvent {
        RawEvent::MessageCreate(
            serde_json::from_value(kasumi_core::testing::message_json(id, channel, author, content))
                .unwrap(),
        )
    }

    fn counter<E: kasumi_core::Event>(bot: &Bot) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bot.register_event(Filter::new(), move |_: Arc<E>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {}
        });
        hits
    }

    #[tokio::test]
    async fn messages_are_cached_then_published() {
        let (_api, gw) = gateway();
        let created = counter::<MessageCreate>(gw.bot());

        let started = gw.handle(message(500, user_json(42, "alice"), "hi")).await.unwrap();
        gw.bot().drain().await;

        // The pipeline callback and ours.
        assert_eq!(started, 2);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        let channel = gw.bot().cache().get_channel(Snowflake(10), true).await.unwrap().unwrap();
        let cached = gw.bot().cache().get_message(&channel, Snowflake(500), true).await.unwrap();
        assert_eq!(cached.map(|m| m.content()), Some("hi".to_owned()));
    }

    #[tokio::test]
    async fn bot_and_self_messages_are_suppressed() {
        let (_api, gw) = gateway();
        let ready = RawEvent::Ready {
            user: serde_json::from_value(bot_user_json()).unwrap(),
            servers: Vec::new(),
        };
        gw.handle(ready).await.unwrap();
        let lobby = serde_json::from_value(channel_json(10, None, "lobby")).unwrap();
        gw.handle(RawEvent::ChannelCreate(lobby)).await.unwrap();

        let other_bot = json!({ "id": "77", "username": "robot", "bot": true });
        assert_eq!(gw.handle(message(1, bot_user_json(), "me")).await.unwrap(), 0);
        assert_eq!(gw.handle(message(2, other_bot.clone(), "beep")).await.unwrap(), 0);

        let lenient = gw.clone().ignore_bots(false);
        assert_eq!(lenient.handle(message(3, other_bot, "beep")).await.unwrap(), 1);
        assert_eq!(lenient.handle(message(4, bot_user_json(), "me")).await.unwrap(), 0);

        // Suppressed messages are still cached.
        let channel = gw.bot().cache().get_channel(Snowflake(10), true).await.unwrap().unwrap();
        assert!(gw.bot().cache().get_message(&channel, Snowflake(1), true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deletes_remove_from_the_cache() {
        let (_api, gw) = gateway();
        let deleted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&deleted);
        gw.bot().register_event(Filter::new(), move |event: Arc<MessageDelete>| {
            if event.message.is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            async {}
        });

        gw.handle(message(9, user_json(42, "alice"), "oops")).await.unwrap();
        gw.handle(RawEvent::MessageDelete {
            id: Snowflake(9),
            channel_id: Snowflake(10),
        })
        .await
        .unwrap();
        gw.bot().drain().await;

        assert_eq!(deleted.load(Ordering::SeqCst), 1);
        let channel = gw.bot().cache().get_channel(Snowflake(10), true).await.unwrap().unwrap();
        assert!(gw.bot().cache().get_message(&channel, Snowflake(9), true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ready_and_disconnect_reset_the_cache() {
        let (_api, gw) = gateway();
        let disconnects = counter::<Disconnect>(gw.bot());
        gw.handle(RawEvent::ChannelCreate(
            serde_json::from_value(channel_json(20, None, "extra")).unwrap(),
        ))
        .await
        .unwrap();
        assert!(gw.bot().cache().get_channel(Snowflake(20), true).await.unwrap().is_some());

        gw.handle(RawEvent::Disconnect { reason: None }).await.unwrap();
        gw.bot().drain().await;
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(gw.bot().cache().get_channel(Snowflake(20), true).await.unwrap().is_none());

        let ready = RawEvent::Ready {
            user: serde_json::from_value(bot_user_json()).unwrap(),
            servers: vec![serde_json::from_value(server_json(5, "guild")).unwrap()],
        };
        gw.handle(ready).await.unwrap();
        assert!(gw.bot().cache().profile().is_some());
        assert!(gw.bot().cache().get_server(Snowflake(5), true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn presence_updates_the_user() {
        let (_api, gw) = gateway();
        let raw: RawEvent = serde_json::from_value(json!({
            "op": "presence_update",
            "d": { "user": user_json(42, "alice"), "status": "dnd", "activity": "coding" },
        }))
        .unwrap();
        assert_eq!(raw.name(), "presence_update");

        gw.handle(raw).await.unwrap();
        let user = gw.bot().cache().get_user(Snowflake(42), true).await.unwrap().unwrap();
        assert_eq!(user.presence().status, Status::Dnd);
        assert_eq!(user.presence().activity.as_deref(), Some("coding"));
    }

    #[tokio::test]
    async fn events_for_unknown_channels_are_dropped() {
        let (api, gw) = gateway();
        let reactions = counter::<ReactionAdd>(gw.bot());
        let raw = RawEvent::ReactionAdd(ReactionData {
            message_id: Snowflake(1),
            channel_id: Snowflake(999),
            user_id: Snowflake(42),
            emoji: Emoji::unicode("\u{25B6}"),
        });
        assert_eq!(gw.handle(raw).await.unwrap(), 0);
        gw.bot().drain().await;
        assert_eq!(api.count(|c| *c == ApiCall::ResolveChannel(Snowflake(999))), 1);
        assert_eq!(reactions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn uncached_channels_resolve_in_the_background() {
        let (api, gw) = gateway();
        api.insert_channel(channel_json(11, None, "annex"));
        let created = counter::<MessageCreate>(gw.bot());

        let started = gw.handle(message_in(11, 600, user_json(42, "alice"), "late")).await;
        assert_eq!(tokio_test::assert_ok!(started), 0);
        gw.bot().drain().await;

        assert_eq!(created.load(Ordering::SeqCst), 1);
        let channel = gw.bot().cache().get_channel(Snowflake(11), true).await.unwrap().unwrap();
        let cached = gw.bot().cache().get_message(&channel, Snowflake(600), true).await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn a_stalled_channel_lookup_does_not_hold_back_later_events() {
        let (api, gw) = gateway();
        api.stall_channel(Snowflake(999));
        let connects = counter::<Connect>(gw.bot());

        let stalled = gw.handle(message_in(999, 700, user_json(42, "alice"), "stuck"));
        let started = tokio::time::timeout(Duration::from_secs(5), stalled).await;
        assert_eq!(tokio_test::assert_ok!(tokio_test::assert_ok!(started)), 0);

        let connect = tokio::time::timeout(Duration::from_secs(5), gw.handle(RawEvent::Connect));
        assert_eq!(tokio_test::assert_ok!(tokio_test::assert_ok!(connect.await)), 1);

        gw.bot().runner().shutdown();
        tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(5), gw.bot().drain()).await);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }
}
