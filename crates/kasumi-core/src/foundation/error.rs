//! Unified error types for the Kasumi core.
//!
//! Remote failures are classified once, at the [`RemoteApi`] boundary, so the
//! cache can decide which ones it recovers from (`NotFound`), which ones it
//! memoizes (`PermissionDenied`) and which ones it passes through untouched.
//!
//! [`RemoteApi`]: crate::integration::RemoteApi

use thiserror::Error;

use super::snowflake::Snowflake;

// =============================================================================
// Remote API Errors
// =============================================================================

/// Errors returned by the remote API collaborator.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The remote has no such entity.
    #[error("remote entity not found")]
    NotFound,

    /// The remote refused access to the entity.
    #[error("remote access denied")]
    PermissionDenied,

    /// The request failed on the way to or from the remote.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with something that could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Anything else the API implementation wants to surface.
    #[error("api error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an internal API error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors surfaced by cache lookups.
///
/// Remote not-found results never show up here; they become `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Access to the channel was denied, either just now or remembered from
    /// an earlier lookup.
    #[error("no permission to access channel {channel}")]
    PermissionDenied {
        /// The channel that was refused.
        channel: Snowflake,
    },

    /// Remote data did not match the entity shape.
    #[error("malformed entity data: {0}")]
    Decode(String),

    /// Unclassified remote failure, passed through unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for remote API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for cache lookups.
pub type CacheResult<T> = Result<T, CacheError>;
