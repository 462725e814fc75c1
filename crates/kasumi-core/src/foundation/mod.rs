//! Foundation layer - identifiers, errors and the event filter engine.
//!
//! - Snowflake ids shared by every entity kind
//! - Error taxonomy for remote calls and cache lookups
//! - Typed events with declarative filter tables

pub mod error;
pub mod event;
pub mod snowflake;

pub use error::{ApiError, ApiResult, CacheError, CacheResult};
pub use event::{Accept, Cmp, Event, FieldFn, Filter, FilterTable, FilterValue, Rule, ValueKind};
pub use snowflake::{Snowflake, ToId};
