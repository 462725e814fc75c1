//! The typed events published on a bot's [`EventBus`](crate::EventBus).
//!
//! Each event declares its filter dimensions through
//! [`Event::filter_table`]. Message-shaped and reaction-shaped events share
//! rule groups, composed with [`FilterTable::merge`].
//!
//! | Event | Dimensions |
//! |---|---|
//! | [`MessageCreate`], [`MessageUpdate`] | `content`, `starts_with`, `channel`, `server`, `author`, `from_bot`, `private` |
//! | [`MessageDelete`] | `message`, `channel`, `server` |
//! | [`ReactionAdd`], [`ReactionRemove`] | `message`, `channel`, `server`, `user`, `emoji` |
//! | [`PresenceUpdate`] | `user`, `server`, `status` |
//! | [`ExceptionEvent`] | `type` |

use std::sync::Arc;

use kasumi_core::{
    Accept, Channel, Cmp, Emoji, Entity, Event, FilterTable, FilterValue, Message, Presence,
    Snowflake, User, ValueKind,
};

use crate::hook::Exception;

fn text(value: impl Into<String>) -> Option<FilterValue> {
    Some(FilterValue::Text(value.into()))
}

fn starts_with() -> Cmp {
    Cmp::predicate(|field, expected| match (field.and_then(FilterValue::as_str), expected.as_str()) {
        (Some(field), Some(prefix)) => field.starts_with(prefix),
        _ => false,
    })
}

// =============================================================================
// Message Events
// =============================================================================

/// Accessors shared by events that carry a full message.
pub trait MessageLike: Send + Sync + 'static {
    fn message(&self) -> &Arc<Message>;
    fn channel(&self) -> &Arc<Channel>;
    fn author(&self) -> &Arc<User>;

    fn content(&self) -> String {
        self.message().content()
    }

    fn server_id(&self) -> Option<Snowflake> {
        self.channel().server_id()
    }
}

/// Rules of every message-shaped event.
pub fn message_rules<E: MessageLike>() -> FilterTable<E> {
    FilterTable::new()
        .rule("content", Accept::Kind(ValueKind::Text), |e: &E| text(e.content()), Cmp::Eq)
        .rule("content", Accept::Kind(ValueKind::Pattern), |e: &E| text(e.content()), Cmp::Case)
        .rule("starts_with", Accept::Kind(ValueKind::Text), |e: &E| text(e.content()), starts_with())
        .rule("channel", Accept::IdLike, |e: &E| Some(e.channel().id().into()), Cmp::Eq)
        .rule(
            "channel",
            Accept::Kind(ValueKind::Text),
            |e: &E| e.channel().name().map(FilterValue::Text),
            Cmp::predicate(|field, expected| {
                let wanted = expected.as_str().map(|s| s.trim_start_matches('#'));
                field.and_then(FilterValue::as_str).is_some_and(|name| Some(name) == wanted)
            }),
        )
        .rule("server", Accept::IdLike, |e: &E| Some(e.server_id()?.into()), Cmp::Eq)
        .rule("author", Accept::IdLike, |e: &E| Some(e.author().id().into()), Cmp::Eq)
        .rule("author", Accept::Kind(ValueKind::Text), |e: &E| text(e.author().username()), Cmp::Eq)
        .rule("from_bot", Accept::Kind(ValueKind::Bool), |e: &E| Some(e.author().is_bot().into()), Cmp::Eq)
        .rule("private", Accept::Kind(ValueKind::Bool), |e: &E| Some(e.channel().is_pm().into()), Cmp::Eq)
}

macro_rules! message_event {
    ($(#[$doc:meta])* $name:ident, $event_name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub message: Arc<Message>,
            pub channel: Arc<Channel>,
            pub author: Arc<User>,
        }

        impl $name {
            pub fn new(message: Arc<Message>, channel: Arc<Channel>, author: Arc<User>) -> Self {
                Self { message, channel, author }
            }
        }

        impl MessageLike for $name {
            fn message(&self) -> &Arc<Message> {
                &self.message
            }

            fn channel(&self) -> &Arc<Channel> {
                &self.channel
            }

            fn author(&self) -> &Arc<User> {
                &self.author
            }
        }

        impl Event for $name {
            const NAME: &'static str = $event_name;

            fn filter_table() -> FilterTable<Self> {
                message_rules()
            }
        }
    };
}

message_event!(
    /// A message was posted.
    MessageCreate,
    "message_create"
);

message_event!(
    /// A message was edited.
    MessageUpdate,
    "message_update"
);

/// A message was deleted. `message` is set when it was still cached.
#[derive(Debug, Clone)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel: Arc<Channel>,
    pub message: Option<Arc<Message>>,
}

impl Event for MessageDelete {
    const NAME: &'static str = "message_delete";

    fn filter_table() -> FilterTable<Self> {
        FilterTable::new()
            .rule("message", Accept::IdLike, |e: &Self| Some(e.id.into()), Cmp::Eq)
            .rule("channel", Accept::IdLike, |e: &Self| Some(e.channel.id().into()), Cmp::Eq)
            .rule("server", Accept::IdLike, |e: &Self| Some(e.channel.server_id()?.into()), Cmp::Eq)
    }
}

// =============================================================================
// Reaction Events
// =============================================================================

/// Accessors shared by reaction events.
pub trait ReactionLike: Send + Sync + 'static {
    fn message_id(&self) -> Snowflake;
    fn channel(&self) -> &Arc<Channel>;
    fn user_id(&self) -> Snowflake;
    fn emoji(&self) -> &Emoji;
}

/// Rules of every reaction-shaped event.
///
/// `emoji` matches a text value against the emoji name, its reaction key
/// or its mention form, and an id value against a custom emoji's id.
pub fn reaction_rules<E: ReactionLike>() -> FilterTable<E> {
    FilterTable::new()
        .rule("message", Accept::IdLike, |e: &E| Some(e.message_id().into()), Cmp::Eq)
        .rule("channel", Accept::IdLike, |e: &E| Some(e.channel().id().into()), Cmp::Eq)
        .rule("server", Accept::IdLike, |e: &E| Some(e.channel().server_id()?.into()), Cmp::Eq)
        .rule("user", Accept::IdLike, |e: &E| Some(e.user_id().into()), Cmp::Eq)
        .rule("emoji", Accept::Kind(ValueKind::Text), |e: &E| text(e.emoji().name.clone()), Cmp::Eq)
        .rule("emoji", Accept::Kind(ValueKind::Text), |e: &E| text(e.emoji().reaction_key()), Cmp::Eq)
        .rule("emoji", Accept::Kind(ValueKind::Text), |e: &E| text(e.emoji().to_string()), Cmp::Eq)
        .rule("emoji", Accept::IdLike, |e: &E| Some(e.emoji().id?.into()), Cmp::Eq)
}

macro_rules! reaction_event {
    ($(#[$doc:meta])* $name:ident, $event_name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub message_id: Snowflake,
            pub channel: Arc<Channel>,
            pub user_id: Snowflake,
            pub emoji: Emoji,
        }

        impl ReactionLike for $name {
            fn message_id(&self) -> Snowflake {
                self.message_id
            }

            fn channel(&self) -> &Arc<Channel> {
                &self.channel
            }

            fn user_id(&self) -> Snowflake {
                self.user_id
            }

            fn emoji(&self) -> &Emoji {
                &self.emoji
            }
        }

        impl Event for $name {
            const NAME: &'static str = $event_name;

            fn filter_table() -> FilterTable<Self> {
                reaction_rules()
            }
        }
    };
}

reaction_event!(
    /// A user reacted to a message.
    ReactionAdd,
    "reaction_add"
);

reaction_event!(
    /// A user took back a reaction.
    ReactionRemove,
    "reaction_remove"
);

// =============================================================================
// Presence & Lifecycle
// =============================================================================

/// A user's presence changed.
#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub user: Arc<User>,
    pub server_id: Option<Snowflake>,
    pub presence: Presence,
}

impl Event for PresenceUpdate {
    const NAME: &'static str = "presence_update";

    fn filter_table() -> FilterTable<Self> {
        FilterTable::new()
            .rule("user", Accept::IdLike, |e: &Self| Some(e.user.id().into()), Cmp::Eq)
            .rule("server", Accept::IdLike, |e: &Self| Some(e.server_id?.into()), Cmp::Eq)
            .rule(
                "status",
                Accept::Kind(ValueKind::Symbol),
                |e: &Self| Some(FilterValue::symbol(e.presence.status.as_str())),
                Cmp::Eq,
            )
            .rule(
                "status",
                Accept::Kind(ValueKind::Text),
                |e: &Self| text(e.presence.status.as_str()),
                Cmp::Eq,
            )
    }
}

/// The session is established; `profile` is the bot's own user.
#[derive(Debug, Clone)]
pub struct Ready {
    pub profile: Arc<User>,
}

impl Event for Ready {
    const NAME: &'static str = "ready";
}

/// The transport connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Connect;

impl Event for Connect {
    const NAME: &'static str = "connect";
}

/// The transport lost its connection.
#[derive(Debug, Clone, Default)]
pub struct Disconnect {
    pub reason: Option<String>,
}

impl Event for Disconnect {
    const NAME: &'static str = "disconnect";
}

// =============================================================================
// Exception Event
// =============================================================================

/// An unhandled failure, re-published by the bot's exception hook.
///
/// Filter `type` with a symbol (`"event"`, `"command"`, `"interaction"`) to
/// select a source, or with a class tag to select an error class. The class
/// `Exception` matches every failure.
#[derive(Debug, Clone)]
pub struct ExceptionEvent {
    pub exception: Exception,
}

impl Event for ExceptionEvent {
    const NAME: &'static str = "exception";

    fn filter_table() -> FilterTable<Self> {
        FilterTable::new()
            .rule(
                "type",
                Accept::Kind(ValueKind::Symbol),
                |e: &Self| Some(FilterValue::symbol(e.exception.source.as_str())),
                Cmp::Eq,
            )
            .rule(
                "type",
                Accept::Kind(ValueKind::Class),
                |e: &Self| Some(FilterValue::class(e.exception.class)),
                Cmp::predicate(|field, expected| {
                    let class = field.and_then(FilterValue::as_str);
                    expected
                        .as_str()
                        .is_some_and(|wanted| wanted == crate::hook::ROOT_CLASS || Some(wanted) == class)
                }),
            )
    }
}

impl From<Exception> for ExceptionEvent {
    fn from(exception: Exception) -> Self {
        Self { exception }
    }
}
