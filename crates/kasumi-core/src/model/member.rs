use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Entity;
use super::user::UserData;
use crate::cache::CacheSettings;
use crate::foundation::snowflake::{Snowflake, ToId};

// ─── Member ───

/// Server member payload. Keyed by the member's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberData {
    pub user: UserData,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

#[derive(Debug)]
struct MemberState {
    nick: Option<String>,
    roles: Vec<Snowflake>,
}

/// A user's membership in one server.
///
/// The user itself lives in the bot-wide user tier; the member only carries
/// server-scoped attributes.
#[derive(Debug)]
pub struct Member {
    user_id: Snowflake,
    state: RwLock<MemberState>,
}

impl Member {
    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    pub fn nick(&self) -> Option<String> {
        self.state.read().nick.clone()
    }

    /// Ids of the roles granted to this member.
    pub fn roles(&self) -> Vec<Snowflake> {
        self.state.read().roles.clone()
    }

    pub fn has_role(&self, role: Snowflake) -> bool {
        self.state.read().roles.contains(&role)
    }
}

impl Entity for Member {
    type Data = MemberData;
    const KIND: &'static str = "member";

    fn id(&self) -> Snowflake {
        self.user_id
    }

    fn data_id(data: &MemberData) -> Snowflake {
        data.user.id
    }

    fn create(data: MemberData, _settings: &CacheSettings) -> Self {
        Self {
            user_id: data.user.id,
            state: RwLock::new(MemberState {
                nick: data.nick,
                roles: data.roles,
            }),
        }
    }

    fn update(&self, data: MemberData) {
        let mut state = self.state.write();
        state.nick = data.nick;
        state.roles = data.roles;
    }
}

impl ToId for Member {
    fn to_id(&self) -> Snowflake {
        self.user_id
    }
}

// ─── Role ───

/// Role payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleData {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub mentionable: bool,
}

/// A server role.
#[derive(Debug)]
pub struct Role {
    id: Snowflake,
    data: RwLock<RoleData>,
}

impl Role {
    pub fn name(&self) -> String {
        self.data.read().name.clone()
    }

    pub fn position(&self) -> i64 {
        self.data.read().position
    }

    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

impl Entity for Role {
    type Data = RoleData;
    const KIND: &'static str = "role";

    fn id(&self) -> Snowflake {
        self.id
    }

    fn data_id(data: &RoleData) -> Snowflake {
        data.id
    }

    fn create(data: RoleData, _settings: &CacheSettings) -> Self {
        Self {
            id: data.id,
            data: RwLock::new(data),
        }
    }

    fn update(&self, data: RoleData) {
        *self.data.write() = data;
    }
}

impl ToId for Role {
    fn to_id(&self) -> Snowflake {
        self.id
    }
}
