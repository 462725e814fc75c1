//! Error types for the Kasumi framework.

use kasumi_core::CacheError;
use thiserror::Error;

pub use tower::BoxError;

/// Returned by a callback to stop early without it counting as a failure.
///
/// The task runner recognises this error and drops it silently. All other
/// errors are reported to the exception hook.
#[derive(Debug, Clone, Copy, Error)]
#[error("callback halted")]
pub struct Halt;

// =============================================================================
// Command Errors
// =============================================================================

/// The command text could not be tokenized or coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// A quote or code fence was left open.
    #[error("malformed quotes")]
    BadQuotes,

    /// The argument at `index` (1-based) did not fit its declared type.
    #[error("argument {index} could not be parsed")]
    ArgParse {
        /// 1-based argument position.
        index: usize,
    },
}

/// The argument count is outside the command's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("too few arguments")]
    TooFew,
    #[error("too many arguments")]
    TooMany,
}

/// The invoking user may not run the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The command is reserved for bot owners.
    #[error("command is restricted to owners")]
    Owner,
    /// The user or one of their roles lacks a required permission.
    #[error("missing permissions")]
    Permissions,
}

/// A validation failure of the command pipeline.
///
/// Always recovered at the pipeline boundary and rendered as a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No command answers to this name.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

impl CommandError {
    /// Dotted kind name, e.g. `arguments.too_few` or `access.owner`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "invalid",
            Self::Syntax(_) => "syntax",
            Self::Argument(ArgumentError::TooFew) => "arguments.too_few",
            Self::Argument(ArgumentError::TooMany) => "arguments.too_many",
            Self::Access(AccessError::Owner) => "access.owner",
            Self::Access(AccessError::Permissions) => "access.permissions",
        }
    }
}

/// A token did not coerce into the requested argument type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CoerceError(String);

impl CoerceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

// =============================================================================
// Interaction Errors
// =============================================================================

/// Failures of reaction-driven interactions.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// A pagination was started without pages.
    #[error("pagination needs at least one page")]
    NoPages,

    /// The requested start page is not one of the pages.
    #[error("start page {start} is outside 1..={pages}")]
    StartOutOfRange { start: usize, pages: usize },

    /// Adding, removing or clearing reactions failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The caller's render callback failed.
    #[error("render failed: {0}")]
    Render(BoxError),
}

/// Result type for command validation.
pub type CommandResult<T> = Result<T, CommandError>;

/// Result type for argument coercion.
pub type CoerceResult<T> = Result<T, CoerceError>;

/// Result type for interactions.
pub type InteractionResult<T> = Result<T, InteractionError>;
