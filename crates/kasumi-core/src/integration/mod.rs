//! Integration layer - the boundary to the platform transport.

pub mod api;

pub use api::{BoxedApi, RemoteApi};
