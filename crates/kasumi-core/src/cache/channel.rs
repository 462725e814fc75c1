//! Per-channel message tier.

use std::sync::Arc;

use super::CacheSettings;
use super::tier::BoundedTier;
use crate::foundation::snowflake::Snowflake;
use crate::model::{Message, MessageData};

/// The bounded message tier of one channel.
#[derive(Debug)]
pub struct ChannelCache {
    channel_id: Snowflake,
    settings: CacheSettings,
    messages: BoundedTier<Message>,
}

impl ChannelCache {
    pub(crate) fn new(channel_id: Snowflake, settings: CacheSettings) -> Self {
        Self {
            channel_id,
            messages: BoundedTier::new(settings.message_limit),
            settings,
        }
    }

    pub fn channel_id(&self) -> Snowflake {
        self.channel_id
    }

    /// Local message lookup; see [`BotCache::get_message`] for remote fallback.
    ///
    /// [`BotCache::get_message`]: super::BotCache::get_message
    pub fn message(&self, id: Snowflake) -> Option<Arc<Message>> {
        self.messages.get(id)
    }

    pub fn put_message(&self, data: MessageData, update: bool) -> Arc<Message> {
        self.messages.put(data, update, &self.settings)
    }

    pub fn remove_message(&self, id: Snowflake) -> Option<Arc<Message>> {
        self.messages.remove(id)
    }

    /// Cached messages, oldest first.
    pub fn messages(&self) -> Vec<Arc<Message>> {
        self.messages.list()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn reset(&self) {
        self.messages.clear();
    }
}
