use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Entity;
use super::user::UserData;
use crate::cache::CacheSettings;
use crate::foundation::snowflake::{Snowflake, ToId};

/// Message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageData {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub author: UserData,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug)]
struct MessageState {
    content: String,
    timestamp: Option<DateTime<Utc>>,
    edited_timestamp: Option<DateTime<Utc>>,
    pinned: bool,
}

/// A message in a channel's bounded tier.
#[derive(Debug)]
pub struct Message {
    id: Snowflake,
    channel_id: Snowflake,
    author_id: Snowflake,
    state: RwLock<MessageState>,
}

impl Message {
    pub fn channel_id(&self) -> Snowflake {
        self.channel_id
    }

    pub fn author_id(&self) -> Snowflake {
        self.author_id
    }

    pub fn content(&self) -> String {
        self.state.read().content.clone()
    }

    /// Send time; falls back to the time embedded in the id.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.state.read().timestamp.unwrap_or_else(|| self.id.created_at())
    }

    pub fn edited_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().edited_timestamp
    }

    pub fn is_pinned(&self) -> bool {
        self.state.read().pinned
    }
}

impl Entity for Message {
    type Data = MessageData;
    const KIND: &'static str = "message";

    fn id(&self) -> Snowflake {
        self.id
    }

    fn data_id(data: &MessageData) -> Snowflake {
        data.id
    }

    fn create(data: MessageData, _settings: &CacheSettings) -> Self {
        Self {
            id: data.id,
            channel_id: data.channel_id,
            author_id: data.author.id,
            state: RwLock::new(MessageState {
                content: data.content,
                timestamp: data.timestamp,
                edited_timestamp: data.edited_timestamp,
                pinned: data.pinned,
            }),
        }
    }

    fn update(&self, data: MessageData) {
        let mut state = self.state.write();
        state.content = data.content;
        state.edited_timestamp = data.edited_timestamp.or(state.edited_timestamp);
        state.pinned = data.pinned;
    }
}

impl ToId for Message {
    fn to_id(&self) -> Snowflake {
        self.id
    }
}
