//! The entity cache.
//!
//! [`BotCache`] mediates every read of remote state. Lookups prefer memory
//! and fall back to the [`RemoteApi`] collaborator; the result is stored so
//! later lookups share the same `Arc`.
//!
//! ```text
//! BotCache
//! ├── servers ── Server ── ServerCache { members, roles }
//! ├── channels ─ Channel ─ ChannelCache { messages (bounded, FIFO) }
//! │   └── pm index (peer user id → channel)
//! ├── users
//! └── restricted (channels the remote refused)
//! ```
//!
//! # Failure semantics
//!
//! - Remote `NotFound` becomes `Ok(None)`.
//! - Remote `PermissionDenied` on a channel is remembered; later lookups of
//!   that channel fail with [`CacheError::PermissionDenied`] without a
//!   remote round trip until [`BotCache::reset`].
//! - Every other remote error is returned unchanged.
//!
//! No lock is held while awaiting the remote.
//!
//! [`RemoteApi`]: crate::integration::RemoteApi

mod channel;
mod server;
mod tier;

pub use channel::ChannelCache;
pub use server::ServerCache;
pub use tier::{BoundedTier, Tier};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::foundation::error::{ApiError, ApiResult, CacheError, CacheResult};
use crate::foundation::snowflake::Snowflake;
use crate::integration::BoxedApi;
use crate::model::{
    Channel, ChannelData, Entity, Member, MemberData, Message, MessageData, Role, Server,
    ServerData, User, UserData,
};

/// Default capacity of a channel's message tier.
pub const DEFAULT_MESSAGE_LIMIT: usize = 200;

/// Cache tuning shared by every tier of a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of messages kept per channel.
    pub message_limit: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

// Channels and their private-message index change together.
#[derive(Default)]
struct ChannelIndex {
    by_id: HashMap<Snowflake, Arc<Channel>>,
    pm_by_peer: HashMap<Snowflake, Arc<Channel>>,
}

/// The bot-wide cache.
pub struct BotCache {
    api: BoxedApi,
    settings: CacheSettings,
    servers: Tier<Server>,
    users: Tier<User>,
    channels: RwLock<ChannelIndex>,
    restricted: RwLock<HashSet<Snowflake>>,
    profile: RwLock<Option<Arc<User>>>,
}

impl BotCache {
    pub fn new(api: BoxedApi, settings: CacheSettings) -> Self {
        Self {
            api,
            settings,
            servers: Tier::new(),
            users: Tier::new(),
            channels: RwLock::new(ChannelIndex::default()),
            restricted: RwLock::new(HashSet::new()),
            profile: RwLock::new(None),
        }
    }

    /// The remote API this cache resolves through.
    pub fn api(&self) -> &BoxedApi {
        &self.api
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// The bot's own user, known once the session is ready.
    pub fn profile(&self) -> Option<Arc<User>> {
        self.profile.read().clone()
    }

    /// Records the bot's own user.
    pub fn set_profile(&self, data: UserData) -> Arc<User> {
        let user = self.put_user(data, true);
        *self.profile.write() = Some(Arc::clone(&user));
        user
    }

    // =========================================================================
    // Servers
    // =========================================================================

    pub async fn get_server(&self, id: Snowflake, local: bool) -> CacheResult<Option<Arc<Server>>> {
        if let Some(server) = self.servers.get(id) {
            return Ok(Some(server));
        }
        if local {
            return Ok(None);
        }
        debug!(kind = "server", %id, "cache miss, resolving remotely");
        match recover_not_found(self.api.resolve_server(id).await)? {
            Some(value) => Ok(Some(self.put_server(decode(value)?, false))),
            None => Ok(None),
        }
    }

    /// Upserts a server. Embedded channels go to the bot-wide channel tier
    /// and embedded members' users to the user tier.
    pub fn put_server(&self, mut data: ServerData, update: bool) -> Arc<Server> {
        let channels = std::mem::take(&mut data.channels);
        for member in &data.members {
            self.put_user(member.user.clone(), false);
        }
        let server_id = data.id;
        let server = self.servers.put(data, update, &self.settings);
        for mut channel in channels {
            channel.server_id.get_or_insert(server_id);
            self.put_channel(channel, update);
        }
        server
    }

    /// Drops the server entry only. Its channels stay in the bot-wide channel
    /// tier and remain reachable through [`get_channel`](Self::get_channel)
    /// and [`server_channels`](Self::server_channels).
    pub fn remove_server(&self, id: Snowflake) -> Option<Arc<Server>> {
        self.servers.remove(id)
    }

    pub fn servers(&self) -> Vec<Arc<Server>> {
        self.servers.list()
    }

    /// Channels belonging to `server`, ordered by position.
    ///
    /// A filtered view over the bot-wide channel tier, so it keeps listing a
    /// server's channels after [`remove_server`](Self::remove_server).
    pub fn server_channels(&self, server: Snowflake) -> Vec<Arc<Channel>> {
        let mut channels: Vec<_> = self
            .channels
            .read()
            .by_id
            .values()
            .filter(|c| c.server_id() == Some(server))
            .cloned()
            .collect();
        channels.sort_by_key(|c| (c.position(), c.id()));
        channels
    }

    // =========================================================================
    // Channels
    // =========================================================================

    pub async fn get_channel(
        &self,
        id: Snowflake,
        local: bool,
    ) -> CacheResult<Option<Arc<Channel>>> {
        let cached = self.channels.read().by_id.get(&id).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        if self.is_restricted(id) {
            trace!(channel = %id, "channel is restricted, skipping lookup");
            return Err(CacheError::PermissionDenied { channel: id });
        }
        if local {
            return Ok(None);
        }
        debug!(kind = "channel", %id, "cache miss, resolving remotely");
        match self.api.resolve_channel(id).await {
            Ok(value) => Ok(Some(self.put_channel(decode(value)?, false))),
            Err(ApiError::NotFound) => Ok(None),
            Err(ApiError::PermissionDenied) => {
                debug!(channel = %id, "channel access denied, remembering");
                self.restricted.write().insert(id);
                Err(CacheError::PermissionDenied { channel: id })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Upserts a channel, its recipients, and its private-message index entry.
    pub fn put_channel(&self, data: ChannelData, update: bool) -> Arc<Channel> {
        for recipient in &data.recipients {
            self.put_user(recipient.clone(), false);
        }

        let id = data.id;
        let mut guard = self.channels.write();
        let index = &mut *guard;
        let channel = match index.by_id.get(&id) {
            Some(existing) => {
                if update {
                    existing.update(data);
                }
                Arc::clone(existing)
            }
            None => {
                let channel = Arc::new(Channel::create(data, &self.settings));
                index.by_id.insert(id, Arc::clone(&channel));
                channel
            }
        };
        if let Some(peer) = channel.pm_peer() {
            index.pm_by_peer.insert(peer, Arc::clone(&channel));
        }
        channel
    }

    /// Removes a channel and its private-message index entry.
    pub fn remove_channel(&self, id: Snowflake) -> Option<Arc<Channel>> {
        let mut guard = self.channels.write();
        let index = &mut *guard;
        let channel = index.by_id.remove(&id)?;
        if let Some(peer) = channel.pm_peer()
            && index.pm_by_peer.get(&peer).is_some_and(|c| c.id() == id)
        {
            index.pm_by_peer.remove(&peer);
        }
        Some(channel)
    }

    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.read().by_id.values().cloned().collect()
    }

    /// The private channel with `user`, opening one remotely on a miss.
    pub async fn get_pm_channel(
        &self,
        user: Snowflake,
        local: bool,
    ) -> CacheResult<Option<Arc<Channel>>> {
        let cached = self.channels.read().pm_by_peer.get(&user).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        if local {
            return Ok(None);
        }
        debug!(%user, "opening private channel");
        match recover_not_found(self.api.create_pm(user).await)? {
            Some(value) => Ok(Some(self.put_channel(decode(value)?, false))),
            None => Ok(None),
        }
    }

    /// Whether the remote refused access to `channel` earlier.
    pub fn is_restricted(&self, channel: Snowflake) -> bool {
        self.restricted.read().contains(&channel)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_user(&self, id: Snowflake, local: bool) -> CacheResult<Option<Arc<User>>> {
        if let Some(user) = self.users.get(id) {
            return Ok(Some(user));
        }
        if local {
            return Ok(None);
        }
        debug!(kind = "user", %id, "cache miss, resolving remotely");
        match recover_not_found(self.api.resolve_user(id).await)? {
            Some(value) => Ok(Some(self.put_user(decode(value)?, false))),
            None => Ok(None),
        }
    }

    pub fn put_user(&self, data: UserData, update: bool) -> Arc<User> {
        self.users.put(data, update, &self.settings)
    }

    pub fn remove_user(&self, id: Snowflake) -> Option<Arc<User>> {
        self.users.remove(id)
    }

    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.list()
    }

    // =========================================================================
    // Members & Roles
    // =========================================================================

    pub async fn get_member(
        &self,
        server: &Server,
        user: Snowflake,
        local: bool,
    ) -> CacheResult<Option<Arc<Member>>> {
        if let Some(member) = server.cache().member(user) {
            return Ok(Some(member));
        }
        if local {
            return Ok(None);
        }
        debug!(kind = "member", server = %server.id(), %user, "cache miss, resolving remotely");
        match recover_not_found(self.api.resolve_member(server.id(), user).await)? {
            Some(value) => Ok(Some(self.put_member(server, decode(value)?, false))),
            None => Ok(None),
        }
    }

    pub fn put_member(&self, server: &Server, data: MemberData, update: bool) -> Arc<Member> {
        self.put_user(data.user.clone(), false);
        server.cache().put_member(data, update)
    }

    pub fn remove_member(&self, server: &Server, user: Snowflake) -> Option<Arc<Member>> {
        server.cache().remove_member(user)
    }

    /// Roles have no remote resolve call; this is always a local lookup.
    pub fn get_role(&self, server: &Server, id: Snowflake) -> Option<Arc<Role>> {
        server.cache().role(id)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub async fn get_message(
        &self,
        channel: &Channel,
        id: Snowflake,
        local: bool,
    ) -> CacheResult<Option<Arc<Message>>> {
        if let Some(message) = channel.cache().message(id) {
            return Ok(Some(message));
        }
        if local {
            return Ok(None);
        }
        debug!(kind = "message", channel = %channel.id(), %id, "cache miss, resolving remotely");
        match recover_not_found(self.api.resolve_message(channel.id(), id).await)? {
            Some(value) => Ok(Some(self.put_message(channel, decode(value)?, false))),
            None => Ok(None),
        }
    }

    /// Stores a message in its channel's tier, along with its author.
    pub fn put_message(&self, channel: &Channel, data: MessageData, update: bool) -> Arc<Message> {
        self.put_user(data.author.clone(), false);
        channel.cache().put_message(data, update)
    }

    pub fn remove_message(&self, channel: &Channel, id: Snowflake) -> Option<Arc<Message>> {
        channel.cache().remove_message(id)
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Forgets everything, including restricted channels and the profile.
    pub fn reset(&self) {
        self.servers.clear();
        self.users.clear();
        {
            let mut index = self.channels.write();
            index.by_id.clear();
            index.pm_by_peer.clear();
        }
        self.restricted.write().clear();
        *self.profile.write() = None;
        debug!("cache reset");
    }
}

impl fmt::Debug for BotCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.read();
        f.debug_struct("BotCache")
            .field("servers", &self.servers.len())
            .field("channels", &channels.by_id.len())
            .field("pm_channels", &channels.pm_by_peer.len())
            .field("users", &self.users.len())
            .field("restricted", &self.restricted.read().len())
            .finish()
    }
}

fn recover_not_found(result: ApiResult<Value>) -> CacheResult<Option<Value>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::NotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> CacheResult<T> {
    Ok(serde_json::from_value(value)?)
}
