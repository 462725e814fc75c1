use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::cache::CacheSettings;
use crate::foundation::snowflake::{Snowflake, ToId};

/// User payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

/// Online status reported by presence updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    #[default]
    Offline,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Offline => "offline",
        }
    }
}

/// A user's last known presence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
    pub status: Status,
    pub activity: Option<String>,
}

/// A platform user.
#[derive(Debug)]
pub struct User {
    id: Snowflake,
    data: RwLock<UserData>,
    presence: RwLock<Presence>,
}

impl User {
    pub fn username(&self) -> String {
        self.data.read().username.clone()
    }

    /// `username#discriminator`, or just the username when there is none.
    pub fn distinct(&self) -> String {
        let data = self.data.read();
        match &data.discriminator {
            Some(d) => format!("{}#{d}", data.username),
            None => data.username.clone(),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.data.read().bot
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Snapshot of the current attributes.
    pub fn data(&self) -> UserData {
        self.data.read().clone()
    }

    pub fn presence(&self) -> Presence {
        self.presence.read().clone()
    }

    pub fn update_presence(&self, presence: Presence) {
        *self.presence.write() = presence;
    }
}

impl Entity for User {
    type Data = UserData;
    const KIND: &'static str = "user";

    fn id(&self) -> Snowflake {
        self.id
    }

    fn data_id(data: &UserData) -> Snowflake {
        data.id
    }

    fn create(data: UserData, _settings: &CacheSettings) -> Self {
        Self {
            id: data.id,
            data: RwLock::new(data),
            presence: RwLock::new(Presence::default()),
        }
    }

    fn update(&self, data: UserData) {
        *self.data.write() = data;
    }
}

impl ToId for User {
    fn to_id(&self) -> Snowflake {
        self.id
    }
}
