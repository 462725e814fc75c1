//! In-memory [`RemoteApi`] for tests.
//!
//! [`MockApi`] serves whatever payloads it was seeded with, answers
//! `NotFound` for everything else, and records every call so tests can
//! assert on remote traffic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::foundation::error::{ApiError, ApiResult};
use crate::foundation::snowflake::Snowflake;
use crate::integration::RemoteApi;

/// Id of the user the mock sends messages as.
pub const BOT_USER_ID: Snowflake = Snowflake(1);

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ResolveServer(Snowflake),
    ResolveChannel(Snowflake),
    ResolveUser(Snowflake),
    ResolveMember(Snowflake, Snowflake),
    ResolveMessage(Snowflake, Snowflake),
    CreatePm(Snowflake),
    SendMessage {
        channel: Snowflake,
        content: String,
    },
    EditMessage {
        channel: Snowflake,
        message: Snowflake,
        content: String,
    },
    DeleteMessage {
        channel: Snowflake,
        message: Snowflake,
    },
    AddReaction {
        channel: Snowflake,
        message: Snowflake,
        emoji: String,
    },
    RemoveReaction {
        channel: Snowflake,
        message: Snowflake,
        emoji: String,
        user: Option<Snowflake>,
    },
    ClearReactions {
        channel: Snowflake,
        message: Snowflake,
    },
}

#[derive(Default)]
struct Store {
    servers: HashMap<Snowflake, Value>,
    channels: HashMap<Snowflake, Value>,
    users: HashMap<Snowflake, Value>,
    members: HashMap<(Snowflake, Snowflake), Value>,
    messages: HashMap<(Snowflake, Snowflake), Value>,
    denied: HashSet<Snowflake>,
    stalled: HashSet<Snowflake>,
    reactions_left: Option<usize>,
}

/// A scripted in-memory remote.
pub struct MockApi {
    store: Mutex<Store>,
    calls: Mutex<Vec<ApiCall>>,
    next_id: AtomicU64,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(900_000),
        }
    }

    pub fn insert_server(&self, data: Value) {
        let id = id_of(&data);
        self.store.lock().servers.insert(id, data);
    }

    pub fn insert_channel(&self, data: Value) {
        let id = id_of(&data);
        self.store.lock().channels.insert(id, data);
    }

    pub fn insert_user(&self, data: Value) {
        let id = id_of(&data);
        self.store.lock().users.insert(id, data);
    }

    pub fn insert_member(&self, server: Snowflake, data: Value) {
        let user = data.get("user").map(id_of).unwrap_or_default();
        self.store.lock().members.insert((server, user), data);
    }

    pub fn insert_message(&self, data: Value) {
        let id = id_of(&data);
        let channel = data.get("channel_id").map(|v| parse_id(v)).unwrap_or_default();
        self.store.lock().messages.insert((channel, id), data);
    }

    /// Makes channel resolution answer `PermissionDenied` for `id`.
    pub fn deny_channel(&self, id: Snowflake) {
        self.store.lock().denied.insert(id);
    }

    /// Makes channel resolution for `id` never complete.
    pub fn stall_channel(&self, id: Snowflake) {
        self.store.lock().stalled.insert(id);
    }

    /// Lets `n` more reactions succeed; later ones fail with a transport error.
    pub fn fail_reactions_after(&self, n: usize) {
        self.store.lock().reactions_left = Some(n);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Contents of every sent message, in order.
    pub fn sent(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ApiCall::SendMessage { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn resolve_server(&self, id: Snowflake) -> ApiResult<Value> {
        self.record(ApiCall::ResolveServer(id));
        self.store.lock().servers.get(&id).cloned().ok_or(ApiError::NotFound)
    }

    async fn resolve_channel(&self, id: Snowflake) -> ApiResult<Value> {
        self.record(ApiCall::ResolveChannel(id));
        let result = {
            let store = self.store.lock();
            if store.stalled.contains(&id) {
                None
            } else if store.denied.contains(&id) {
                Some(Err(ApiError::PermissionDenied))
            } else {
                Some(store.channels.get(&id).cloned().ok_or(ApiError::NotFound))
            }
        };
        match result {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn resolve_user(&self, id: Snowflake) -> ApiResult<Value> {
        self.record(ApiCall::ResolveUser(id));
        self.store.lock().users.get(&id).cloned().ok_or(ApiError::NotFound)
    }

    async fn resolve_member(&self, server: Snowflake, user: Snowflake) -> ApiResult<Value> {
        self.record(ApiCall::ResolveMember(server, user));
        self.store
            .lock()
            .members
            .get(&(server, user))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn resolve_message(&self, channel: Snowflake, id: Snowflake) -> ApiResult<Value> {
        self.record(ApiCall::ResolveMessage(channel, id));
        self.store
            .lock()
            .messages
            .get(&(channel, id))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_pm(&self, user: Snowflake) -> ApiResult<Value> {
        self.record(ApiCall::CreatePm(user));
        let recipient = self
            .store
            .lock()
            .users
            .get(&user)
            .cloned()
            .unwrap_or_else(|| user_json(user.get(), "user"));
        Ok(json!({
            "id": (user.get() + 500_000).to_string(),
            "type": 1,
            "recipients": [recipient],
        }))
    }

    async fn send_message(&self, channel: Snowflake, content: &str) -> ApiResult<Value> {
        self.record(ApiCall::SendMessage {
            channel,
            content: content.to_owned(),
        });
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = message_json(id, channel.get(), bot_user_json(), content);
        self.insert_message(message.clone());
        Ok(message)
    }

    async fn edit_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
        content: &str,
    ) -> ApiResult<Value> {
        self.record(ApiCall::EditMessage {
            channel,
            message,
            content: content.to_owned(),
        });
        Ok(message_json(message.get(), channel.get(), bot_user_json(), content))
    }

    async fn delete_message(&self, channel: Snowflake, message: Snowflake) -> ApiResult<()> {
        self.record(ApiCall::DeleteMessage { channel, message });
        self.store.lock().messages.remove(&(channel, message));
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: &str,
    ) -> ApiResult<()> {
        self.record(ApiCall::AddReaction {
            channel,
            message,
            emoji: emoji.to_owned(),
        });
        match &mut self.store.lock().reactions_left {
            Some(0) => Err(ApiError::transport("reaction rejected")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn remove_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: &str,
        user: Option<Snowflake>,
    ) -> ApiResult<()> {
        self.record(ApiCall::RemoveReaction {
            channel,
            message,
            emoji: emoji.to_owned(),
            user,
        });
        Ok(())
    }

    async fn clear_reactions(&self, channel: Snowflake, message: Snowflake) -> ApiResult<()> {
        self.record(ApiCall::ClearReactions { channel, message });
        Ok(())
    }
}

fn parse_id(value: &Value) -> Snowflake {
    match value {
        Value::String(s) => s.parse().unwrap_or_default(),
        Value::Number(n) => Snowflake(n.as_u64().unwrap_or_default()),
        _ => Snowflake::default(),
    }
}

fn id_of(data: &Value) -> Snowflake {
    data.get("id").map(parse_id).unwrap_or_default()
}

// ─── Payload builders ───

pub fn user_json(id: u64, name: &str) -> Value {
    json!({ "id": id.to_string(), "username": name })
}

pub fn bot_user_json() -> Value {
    json!({ "id": BOT_USER_ID.to_string(), "username": "kasumi", "bot": true })
}

pub fn server_json(id: u64, name: &str) -> Value {
    json!({ "id": id.to_string(), "name": name })
}

pub fn channel_json(id: u64, server: Option<u64>, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "type": 0,
        "name": name,
        "guild_id": server.map(|s| s.to_string()),
    })
}

pub fn pm_json(id: u64, peer: Value) -> Value {
    json!({ "id": id.to_string(), "type": 1, "recipients": [peer] })
}

pub fn member_json(user: Value, roles: &[u64]) -> Value {
    let roles: Vec<String> = roles.iter().map(u64::to_string).collect();
    json!({ "user": user, "roles": roles })
}

pub fn message_json(id: u64, channel: u64, author: Value, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel.to_string(),
        "author": author,
        "content": content,
    })
}
