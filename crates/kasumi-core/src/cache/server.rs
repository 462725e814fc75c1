//! Per-server member and role tiers.

use std::sync::Arc;

use super::CacheSettings;
use super::tier::Tier;
use crate::foundation::snowflake::Snowflake;
use crate::model::{Member, MemberData, Role, RoleData};

/// Members and roles scoped to one server.
///
/// Channels are deliberately absent: a server's channel list is a filtered
/// view over the bot-wide channel tier, see [`BotCache::server_channels`].
///
/// [`BotCache::server_channels`]: super::BotCache::server_channels
#[derive(Debug)]
pub struct ServerCache {
    server_id: Snowflake,
    settings: CacheSettings,
    members: Tier<Member>,
    roles: Tier<Role>,
}

impl ServerCache {
    pub(crate) fn new(server_id: Snowflake, settings: CacheSettings) -> Self {
        Self {
            server_id,
            settings,
            members: Tier::new(),
            roles: Tier::new(),
        }
    }

    pub fn server_id(&self) -> Snowflake {
        self.server_id
    }

    // ─── Members ───

    /// Local member lookup; see [`BotCache::get_member`] for remote fallback.
    ///
    /// [`BotCache::get_member`]: super::BotCache::get_member
    pub fn member(&self, user: Snowflake) -> Option<Arc<Member>> {
        self.members.get(user)
    }

    pub fn put_member(&self, data: MemberData, update: bool) -> Arc<Member> {
        self.members.put(data, update, &self.settings)
    }

    pub fn remove_member(&self, user: Snowflake) -> Option<Arc<Member>> {
        self.members.remove(user)
    }

    pub fn members(&self) -> Vec<Arc<Member>> {
        self.members.list()
    }

    // ─── Roles ───

    pub fn role(&self, id: Snowflake) -> Option<Arc<Role>> {
        self.roles.get(id)
    }

    pub fn put_role(&self, data: RoleData, update: bool) -> Arc<Role> {
        self.roles.put(data, update, &self.settings)
    }

    pub fn remove_role(&self, id: Snowflake) -> Option<Arc<Role>> {
        self.roles.remove(id)
    }

    /// Roles ordered by position, highest first.
    pub fn roles(&self) -> Vec<Arc<Role>> {
        let mut roles = self.roles.list();
        roles.sort_by_key(|r| std::cmp::Reverse(r.position()));
        roles
    }

    pub fn reset(&self) {
        self.members.clear();
        self.roles.clear();
    }
}
