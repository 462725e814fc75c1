//! # Kasumi Core
//!
//! The data layer of the Kasumi bot runtime.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Identifiers**: [`Snowflake`] ids shared by every entity kind
//! - **Errors**: [`ApiError`] and [`CacheError`]
//! - **Event Filters**: [`Event`], [`FilterTable`], [`Filter`]
//!
//! ### Model & Cache
//!
//! - **Entities**: [`User`], [`Server`], [`Channel`], [`Member`], [`Role`], [`Message`]
//! - **Cache Engine**: [`BotCache`] with per-server and per-channel tiers
//!
//! ### Integration Layer
//!
//! - **Remote API**: the [`RemoteApi`] trait implemented by transports
//!
//! ## Lookup Flow
//!
//! ```text
//! ┌──────────┐  get(id)   ┌──────────┐  miss   ┌───────────┐
//! │  caller  │───────────▶│ BotCache │────────▶│ RemoteApi │
//! └──────────┘◀───────────└──────────┘◀────────└───────────┘
//!               Arc<E>        put(data)
//! ```

pub mod cache;
pub mod foundation;
pub mod integration;
pub mod model;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cache::{BotCache, BoundedTier, CacheSettings, ChannelCache, ServerCache, Tier};
pub use foundation::{
    Accept, ApiError, ApiResult, CacheError, CacheResult, Cmp, Event, Filter, FilterTable,
    FilterValue, Rule, Snowflake, ToId, ValueKind,
};
pub use integration::{BoxedApi, RemoteApi};
pub use model::{
    Channel, ChannelData, ChannelKind, Emoji, Entity, Member, MemberData, Message, MessageData,
    Permissions, Presence, Role, RoleData, Server, ServerData, Status, User, UserData,
};
