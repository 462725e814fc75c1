//! Tower layers that validate an invocation before the command body runs.
//!
//! A command's service is built as
//!
//! ```text
//! ArityCheck ─▶ AccessCheck ─▶ HandlerService
//! ```
//!
//! Both checks reject with a boxed [`CommandError`], which the pipeline
//! turns into a templated reply.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use kasumi_core::{Entity, Permissions};
use tower::filter::{AsyncPredicate, Predicate};
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceBuilder};
use tracing::debug;

use super::context::CommandContext;
use super::definition::{ArgCount, CommandAttributes, CommandService};
use super::types::Args;
use crate::error::{AccessError, ArgumentError, CommandError};

/// A command call that passed tokenizing and coercion.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub ctx: CommandContext,
    pub args: Args,
}

// =============================================================================
// Checks
// =============================================================================

/// Rejects invocations whose argument count is out of range.
#[derive(Debug, Clone, Copy)]
pub struct ArityCheck {
    count: ArgCount,
}

impl ArityCheck {
    pub fn new(count: ArgCount) -> Self {
        Self { count }
    }

    pub fn verify(&self, len: usize) -> Result<(), ArgumentError> {
        if len < self.count.min {
            return Err(ArgumentError::TooFew);
        }
        if self.count.max.is_some_and(|max| len > max) {
            return Err(ArgumentError::TooMany);
        }
        Ok(())
    }
}

impl Predicate<Invocation> for ArityCheck {
    type Request = Invocation;

    fn check(&mut self, request: Invocation) -> Result<Invocation, BoxError> {
        match self.verify(request.args.len()) {
            Ok(()) => Ok(request),
            Err(err) => Err(CommandError::from(err).into()),
        }
    }
}

/// Rejects invocations by users lacking owner status or permissions.
///
/// The user's own grants and the grants of each of their roles must each
/// cover the required set.
#[derive(Debug, Clone)]
pub struct AccessCheck {
    owner_only: bool,
    required: Arc<Permissions>,
}

impl AccessCheck {
    pub fn new(owner_only: bool, required: Permissions) -> Self {
        Self {
            owner_only,
            required: Arc::new(required),
        }
    }

    pub async fn verify(&self, ctx: &CommandContext) -> Result<Result<(), AccessError>, BoxError> {
        let bot = ctx.bot();
        let user = ctx.author().id();
        if self.owner_only && !bot.is_owner(user) {
            debug!(%user, "owner-only command denied");
            return Ok(Err(AccessError::Owner));
        }
        if self.required.is_empty() {
            return Ok(Ok(()));
        }

        let grants = bot.permissions();
        if !grants.user(user).is_superset(&self.required) {
            return Ok(Err(AccessError::Permissions));
        }
        for role in ctx.member_roles().await? {
            if !grants.role(role).is_superset(&self.required) {
                debug!(%user, %role, "role lacks required permissions");
                return Ok(Err(AccessError::Permissions));
            }
        }
        Ok(Ok(()))
    }
}

impl AsyncPredicate<Invocation> for AccessCheck {
    type Future = BoxFuture<'static, Result<Invocation, BoxError>>;
    type Request = Invocation;

    fn check(&mut self, request: Invocation) -> Self::Future {
        let this = self.clone();
        async move {
            match this.verify(&request.ctx).await? {
                Ok(()) => Ok(request),
                Err(err) => Err(CommandError::from(err).into()),
            }
        }
        .boxed()
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Values a command body may return.
#[async_trait]
pub trait CommandResponse: Send + 'static {
    /// Performs the response's side effects, such as replying.
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError>;
}

#[async_trait]
impl CommandResponse for () {
    async fn respond(self, _ctx: &CommandContext) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Replies with the text.
#[async_trait]
impl CommandResponse for String {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        ctx.reply(&self).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandResponse for &'static str {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        ctx.reply(self).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: CommandResponse> CommandResponse for Option<T> {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        match self {
            Some(inner) => inner.respond(ctx).await,
            None => Ok(()),
        }
    }
}

/// `Err` becomes an unhandled failure of the command.
#[async_trait]
impl<T, E> CommandResponse for Result<T, E>
where
    T: CommandResponse,
    E: Into<BoxError> + Send + 'static,
{
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        match self {
            Ok(inner) => inner.respond(ctx).await,
            Err(err) => Err(err.into()),
        }
    }
}

// =============================================================================
// HandlerService
// =============================================================================

/// A tower [`Service`] running a command body.
pub struct HandlerService<F> {
    handler: Arc<F>,
}

impl<F> HandlerService<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl<F> Clone for HandlerService<F> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<F, Fut> Service<Invocation> for HandlerService<F>
where
    F: Fn(CommandContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: CommandResponse,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        async move {
            let Invocation { ctx, args } = invocation;
            let response = handler(ctx.clone(), args).await;
            response.respond(&ctx).await
        }
        .boxed()
    }
}

/// Stacks the validation layers over `handler`.
pub fn command_service<F, Fut>(attributes: &CommandAttributes, handler: F) -> CommandService
where
    F: Fn(CommandContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: CommandResponse,
{
    let service = ServiceBuilder::new()
        .filter(ArityCheck::new(attributes.arg_count))
        .filter_async(AccessCheck::new(
            attributes.owner_only,
            attributes.permissions.clone(),
        ))
        .service(HandlerService::new(handler));
    BoxCloneSyncService::new(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_bounds() {
        let check = ArityCheck::new(ArgCount::from(1..=2));
        assert_eq!(check.verify(0), Err(ArgumentError::TooFew));
        assert_eq!(check.verify(1), Ok(()));
        assert_eq!(check.verify(2), Ok(()));
        assert_eq!(check.verify(3), Err(ArgumentError::TooMany));

        let open = ArityCheck::new(ArgCount::from(1..));
        assert_eq!(open.verify(100), Ok(()));
    }
}
