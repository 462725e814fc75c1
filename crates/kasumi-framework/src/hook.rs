//! Process-wide exception reporting.
//!
//! Every unhandled failure of a callback or command task ends up as an
//! [`Exception`] handed to the installed [`ExceptionHook`].

use std::error::Error;
use std::fmt;

use kasumi_core::{ApiError, CacheError};

use crate::error::{BoxError, CommandError, CoerceError};

/// Where an unhandled failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionSource {
    /// An event bus callback.
    Event,
    /// A command body.
    Command,
    /// An interactive component (buttons, pagination).
    Interaction,
}

impl ExceptionSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Command => "command",
            Self::Interaction => "interaction",
        }
    }
}

impl fmt::Display for ExceptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root class every exception belongs to.
pub const ROOT_CLASS: &str = "Exception";

/// Class of a caught panic.
pub const PANIC_CLASS: &str = "Panic";

/// A reported failure.
#[derive(Debug, Clone)]
pub struct Exception {
    pub source: ExceptionSource,
    /// Event name or command name the failure happened in.
    pub context: String,
    /// Error class, see [`classify`].
    pub class: &'static str,
    pub message: String,
}

impl Exception {
    pub fn from_error(source: ExceptionSource, context: impl Into<String>, err: &BoxError) -> Self {
        Self {
            source,
            context: context.into(),
            class: classify(err.as_ref()),
            message: err.to_string(),
        }
    }

    pub fn from_panic(source: ExceptionSource, context: impl Into<String>, message: String) -> Self {
        Self {
            source,
            context: context.into(),
            class: PANIC_CLASS,
            message,
        }
    }

    /// Whether this exception belongs to `class`; every exception belongs to
    /// [`ROOT_CLASS`].
    pub fn is_a(&self, class: &str) -> bool {
        class == ROOT_CLASS || class == self.class
    }
}

/// Receives unhandled failures.
pub trait ExceptionHook: Send + Sync + 'static {
    fn report(&self, exception: &Exception);
}

impl<F> ExceptionHook for F
where
    F: Fn(&Exception) + Send + Sync + 'static,
{
    fn report(&self, exception: &Exception) {
        self(exception)
    }
}

/// Names the class of a known error type.
pub fn classify(err: &(dyn Error + Send + Sync + 'static)) -> &'static str {
    if err.is::<ApiError>() {
        "ApiError"
    } else if err.is::<CacheError>() {
        "CacheError"
    } else if err.is::<CommandError>() {
        "CommandError"
    } else if err.is::<CoerceError>() {
        "CoerceError"
    } else {
        "Error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_errors() {
        let err: BoxError = Box::new(ApiError::NotFound);
        let exc = Exception::from_error(ExceptionSource::Command, "ping", &err);
        assert_eq!(exc.class, "ApiError");
        assert!(exc.is_a("ApiError"));
        assert!(exc.is_a(ROOT_CLASS));
        assert!(!exc.is_a("CacheError"));

        let err: BoxError = "plain".into();
        assert_eq!(classify(err.as_ref()), "Error");
    }
}
