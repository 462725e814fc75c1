//! Cacheable entities.
//!
//! Each entity pairs an immutable id with attributes behind a lock. Updates
//! are applied in place so that every `Arc` handed out by the cache keeps
//! observing the latest state.
//!
//! Only the attributes the runtime itself reads are modelled; wire payloads
//! may carry more and the extra fields are ignored on decode.

mod channel;
mod emoji;
mod member;
mod message;
mod permissions;
mod server;
mod user;

pub use channel::{Channel, ChannelData, ChannelKind};
pub use emoji::Emoji;
pub use member::{Member, MemberData, Role, RoleData};
pub use message::{Message, MessageData};
pub use permissions::Permissions;
pub use server::{Server, ServerData};
pub use user::{Presence, Status, User, UserData};

use serde::de::DeserializeOwned;

use crate::cache::CacheSettings;
use crate::foundation::snowflake::Snowflake;

/// A cacheable remote object.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Raw attribute payload.
    type Data: DeserializeOwned + Send;

    /// Kind name used in logs.
    const KIND: &'static str;

    /// The entity's id.
    fn id(&self) -> Snowflake;

    /// The id a payload describes.
    fn data_id(data: &Self::Data) -> Snowflake;

    /// Builds a fresh entity from its payload.
    fn create(data: Self::Data, settings: &CacheSettings) -> Self;

    /// Applies a payload to this entity in place.
    fn update(&self, data: Self::Data);
}
