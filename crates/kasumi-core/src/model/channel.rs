use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Entity;
use super::user::UserData;
use crate::cache::{CacheSettings, ChannelCache};
use crate::foundation::snowflake::{Snowflake, ToId};

/// Channel type, encoded on the wire as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelKind {
    #[default]
    Text,
    Pm,
    Voice,
    Group,
    Category,
}

impl From<u8> for ChannelKind {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Pm,
            2 => Self::Voice,
            3 => Self::Group,
            4 => Self::Category,
            _ => Self::Text,
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Text => 0,
            ChannelKind::Pm => 1,
            ChannelKind::Voice => 2,
            ChannelKind::Group => 3,
            ChannelKind::Category => 4,
        }
    }
}

/// Channel payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelData {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "guild_id")]
    pub server_id: Option<Snowflake>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub recipients: Vec<UserData>,
}

#[derive(Debug)]
struct ChannelState {
    name: Option<String>,
    server_id: Option<Snowflake>,
    topic: Option<String>,
    position: i64,
    recipients: Vec<Snowflake>,
}

/// A channel, owning its bounded message tier.
#[derive(Debug)]
pub struct Channel {
    id: Snowflake,
    kind: ChannelKind,
    state: RwLock<ChannelState>,
    cache: ChannelCache,
}

impl Channel {
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn name(&self) -> Option<String> {
        self.state.read().name.clone()
    }

    /// The owning server; `None` for private and group channels.
    pub fn server_id(&self) -> Option<Snowflake> {
        self.state.read().server_id
    }

    pub fn topic(&self) -> Option<String> {
        self.state.read().topic.clone()
    }

    pub fn position(&self) -> i64 {
        self.state.read().position
    }

    pub fn recipients(&self) -> Vec<Snowflake> {
        self.state.read().recipients.clone()
    }

    pub fn is_pm(&self) -> bool {
        self.kind == ChannelKind::Pm
    }

    /// The remote peer of a private channel.
    pub fn pm_peer(&self) -> Option<Snowflake> {
        if !self.is_pm() {
            return None;
        }
        self.state.read().recipients.first().copied()
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }

    /// The bounded message tier.
    pub fn cache(&self) -> &ChannelCache {
        &self.cache
    }
}

impl Entity for Channel {
    type Data = ChannelData;
    const KIND: &'static str = "channel";

    fn id(&self) -> Snowflake {
        self.id
    }

    fn data_id(data: &ChannelData) -> Snowflake {
        data.id
    }

    fn create(data: ChannelData, settings: &CacheSettings) -> Self {
        Self {
            id: data.id,
            kind: data.kind,
            state: RwLock::new(ChannelState {
                name: data.name,
                server_id: data.server_id,
                topic: data.topic,
                position: data.position,
                recipients: data.recipients.iter().map(|u| u.id).collect(),
            }),
            cache: ChannelCache::new(data.id, settings.clone()),
        }
    }

    fn update(&self, data: ChannelData) {
        let mut state = self.state.write();
        state.name = data.name;
        state.topic = data.topic;
        state.position = data.position;
        if data.server_id.is_some() {
            state.server_id = data.server_id;
        }
        if !data.recipients.is_empty() {
            state.recipients = data.recipients.iter().map(|u| u.id).collect();
        }
    }
}

impl ToId for Channel {
    fn to_id(&self) -> Snowflake {
        self.id
    }
}
