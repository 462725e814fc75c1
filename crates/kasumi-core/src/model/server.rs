use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Entity;
use super::channel::ChannelData;
use super::member::{MemberData, RoleData};
use crate::cache::{CacheSettings, ServerCache};
use crate::foundation::snowflake::{Snowflake, ToId};

/// Server payload.
///
/// `channels` and `members` are consumed by the bot-wide cache when the
/// server is put; they are not stored on the server itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerData {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub roles: Vec<RoleData>,
    #[serde(default)]
    pub members: Vec<MemberData>,
    #[serde(default)]
    pub channels: Vec<ChannelData>,
}

#[derive(Debug)]
struct ServerState {
    name: String,
    owner_id: Option<Snowflake>,
}

/// A server, owning the per-server member and role tiers.
#[derive(Debug)]
pub struct Server {
    id: Snowflake,
    state: RwLock<ServerState>,
    cache: ServerCache,
}

impl Server {
    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn owner_id(&self) -> Option<Snowflake> {
        self.state.read().owner_id
    }

    /// The per-server member and role tiers.
    pub fn cache(&self) -> &ServerCache {
        &self.cache
    }

    fn absorb(&self, roles: Vec<RoleData>, members: Vec<MemberData>) {
        for role in roles {
            self.cache.put_role(role, true);
        }
        for member in members {
            self.cache.put_member(member, true);
        }
    }
}

impl Entity for Server {
    type Data = ServerData;
    const KIND: &'static str = "server";

    fn id(&self) -> Snowflake {
        self.id
    }

    fn data_id(data: &ServerData) -> Snowflake {
        data.id
    }

    fn create(data: ServerData, settings: &CacheSettings) -> Self {
        let server = Self {
            id: data.id,
            state: RwLock::new(ServerState {
                name: data.name,
                owner_id: data.owner_id,
            }),
            cache: ServerCache::new(data.id, settings.clone()),
        };
        server.absorb(data.roles, data.members);
        server
    }

    fn update(&self, data: ServerData) {
        {
            let mut state = self.state.write();
            state.name = data.name;
            state.owner_id = data.owner_id;
        }
        self.absorb(data.roles, data.members);
    }
}

impl ToId for Server {
    fn to_id(&self) -> Snowflake {
        self.id
    }
}
