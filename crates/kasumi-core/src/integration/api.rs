//! Remote API trait.
//!
//! The transport collaborator implements [`RemoteApi`]. The core calls it to
//! resolve entities it does not hold yet and to perform the handful of
//! mutations commands and interactive components need. Payloads are raw JSON
//! values; decoding into entity data is done by the cache.
//!
//! Implementations classify failures into [`ApiError`]: `NotFound` and
//! `PermissionDenied` carry meaning for the cache, everything else is passed
//! through to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::foundation::error::ApiResult;
use crate::foundation::snowflake::Snowflake;

/// Type-erased remote API handle.
pub type BoxedApi = Arc<dyn RemoteApi>;

/// Request/response access to the platform.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    // ─── Resolution ───

    /// Fetches a server.
    async fn resolve_server(&self, id: Snowflake) -> ApiResult<Value>;

    /// Fetches a channel.
    async fn resolve_channel(&self, id: Snowflake) -> ApiResult<Value>;

    /// Fetches a user.
    async fn resolve_user(&self, id: Snowflake) -> ApiResult<Value>;

    /// Fetches a server member.
    async fn resolve_member(&self, server: Snowflake, user: Snowflake) -> ApiResult<Value>;

    /// Fetches a message of a channel.
    async fn resolve_message(&self, channel: Snowflake, id: Snowflake) -> ApiResult<Value>;

    /// Opens (or returns the existing) private channel with a user.
    async fn create_pm(&self, user: Snowflake) -> ApiResult<Value>;

    // ─── Mutation ───

    /// Sends a text message, returning the created message.
    async fn send_message(&self, channel: Snowflake, content: &str) -> ApiResult<Value>;

    /// Replaces a message's content, returning the updated message.
    async fn edit_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
        content: &str,
    ) -> ApiResult<Value>;

    async fn delete_message(&self, channel: Snowflake, message: Snowflake) -> ApiResult<()>;

    /// Adds the bot's reaction to a message.
    async fn add_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: &str,
    ) -> ApiResult<()>;

    /// Removes a reaction: the bot's own when `user` is `None`.
    async fn remove_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: &str,
        user: Option<Snowflake>,
    ) -> ApiResult<()>;

    /// Removes every reaction from a message.
    async fn clear_reactions(&self, channel: Snowflake, message: Snowflake) -> ApiResult<()>;
}
