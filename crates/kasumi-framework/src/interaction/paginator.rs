//! Reaction-driven pagination.
//!
//! A [`Pagination`] keeps a 1-based page number for a message and moves it
//! in response to five control reactions. The caller owns the content: each
//! transition calls its render callback with the target page, which usually
//! edits the bound message.
//!
//! ```rust,ignore
//! let message = ctx.reply(&pages[0]).await?;
//! let bot = ctx.bot().clone();
//! let target = Arc::clone(&message);
//! bot.paginate(&message, pages.len(), move |page| {
//!     let (bot, target, text) = (bot.clone(), Arc::clone(&target), pages[page - 1].clone());
//!     async move { Ok(bot.edit_message(&target, &text).await?) }
//! }, PaginateOptions::default().owner(ctx.author().id())).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use kasumi_core::{CacheResult, Entity, Message, Snowflake};
use tracing::{debug, warn};

use super::buttons::Buttons;
use crate::bot::Bot;
use crate::error::{BoxError, InteractionError, InteractionResult};

/// The control reactions of a pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    First,
    Previous,
    Next,
    Last,
    Stop,
}

impl Gesture {
    /// In the order the reactions are added.
    pub const ALL: [Gesture; 5] = [Self::First, Self::Previous, Self::Next, Self::Last, Self::Stop];

    pub const fn emoji(self) -> &'static str {
        match self {
            Self::First => "\u{23EE}",
            Self::Previous => "\u{25C0}",
            Self::Next => "\u{25B6}",
            Self::Last => "\u{23ED}",
            Self::Stop => "\u{23F9}",
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.emoji() == emoji)
    }

    /// Page reached from `current`; edges are fixed points.
    fn target(self, current: usize, pages: usize) -> usize {
        match self {
            Self::First => 1,
            Self::Previous => current.saturating_sub(1).max(1),
            Self::Next => (current + 1).min(pages),
            Self::Last => pages,
            Self::Stop => current,
        }
    }
}

/// Outcome of one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The page changed and was rendered.
    Moved(usize),
    /// The gesture had no effect at the current page.
    Unchanged,
    /// This gesture ended the session.
    Stopped,
    /// The session had already ended.
    Closed,
}

/// When a session ends on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoCancel {
    /// Use the bot's configured `paginate_timeout`.
    #[default]
    Default,
    Never,
    After(Duration),
}

#[derive(Debug, Clone)]
pub struct PaginateOptions {
    /// Delete the message on stop instead of just clearing the reactions.
    pub delete_on_stop: bool,
    /// Only this user's reactions are honored.
    pub owner: Option<Snowflake>,
    pub auto_cancel: AutoCancel,
    /// 1-based page shown first.
    pub start: usize,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self {
            delete_on_stop: true,
            owner: None,
            auto_cancel: AutoCancel::Default,
            start: 1,
        }
    }
}

impl PaginateOptions {
    pub fn delete_on_stop(mut self, delete: bool) -> Self {
        self.delete_on_stop = delete;
        self
    }

    pub fn owner(mut self, owner: Snowflake) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn auto_cancel(mut self, auto_cancel: AutoCancel) -> Self {
        self.auto_cancel = auto_cancel;
        self
    }

    pub fn start(mut self, page: usize) -> Self {
        self.start = page;
        self
    }
}

type RenderFn = Arc<dyn Fn(usize) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A running pagination session.
pub struct Pagination {
    buttons: Arc<Buttons>,
    pages: usize,
    page: tokio::sync::Mutex<usize>,
    render: RenderFn,
    delete_on_stop: bool,
}

impl Pagination {
    /// Renders the start page, adds the control reactions and starts the
    /// auto-cancel timer.
    pub async fn start<F, Fut>(
        bot: &Bot,
        message: &Message,
        pages: usize,
        render: F,
        options: PaginateOptions,
    ) -> InteractionResult<Arc<Self>>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        if pages == 0 {
            return Err(InteractionError::NoPages);
        }
        if !(1..=pages).contains(&options.start) {
            return Err(InteractionError::StartOutOfRange {
                start: options.start,
                pages,
            });
        }
        let render: RenderFn = Arc::new(move |page| render(page).boxed());
        render(options.start).await.map_err(InteractionError::Render)?;

        let pagination = Arc::new(Self {
            buttons: Buttons::attach(bot, message, options.owner),
            pages,
            page: tokio::sync::Mutex::new(options.start),
            render,
            delete_on_stop: options.delete_on_stop,
        });
        // A half-built session must not keep listening.
        if let Err(err) = pagination.add_controls().await {
            if let Err(cleanup) = pagination.buttons.teardown(true).await {
                warn!(message = %message.id(), error = %cleanup, "failed to clear reactions");
            }
            return Err(err.into());
        }

        let timeout = match options.auto_cancel {
            AutoCancel::Default => bot.settings().paginate_timeout,
            AutoCancel::Never => None,
            AutoCancel::After(after) => Some(after),
        };
        if let Some(after) = timeout {
            pagination.buttons.auto_cancel(after);
        }
        debug!(message = %message.id(), pages, start = options.start, "pagination started");
        Ok(pagination)
    }

    async fn add_controls(self: &Arc<Self>) -> CacheResult<()> {
        for gesture in Gesture::ALL {
            let this = Arc::clone(self);
            self.buttons
                .add(gesture.emoji(), move |_press| {
                    let this = Arc::clone(&this);
                    async move {
                        this.press(gesture).await?;
                        Ok::<_, BoxError>(())
                    }
                })
                .await?;
        }
        Ok(())
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Current 1-based page.
    pub async fn page(&self) -> usize {
        *self.page.lock().await
    }

    pub fn buttons(&self) -> &Arc<Buttons> {
        &self.buttons
    }

    pub fn is_closed(&self) -> bool {
        self.buttons.is_closed()
    }

    /// Applies one gesture. Gestures are serialized per session.
    pub async fn press(&self, gesture: Gesture) -> InteractionResult<Transition> {
        if gesture == Gesture::Stop {
            return self.stop().await;
        }
        let mut page = self.page.lock().await;
        if self.is_closed() {
            return Ok(Transition::Closed);
        }
        let target = gesture.target(*page, self.pages);
        if target == *page {
            return Ok(Transition::Unchanged);
        }
        (self.render)(target).await.map_err(InteractionError::Render)?;
        *page = target;
        Ok(Transition::Moved(target))
    }

    /// Ends the session, deleting the message when configured to.
    pub async fn stop(&self) -> InteractionResult<Transition> {
        let stopped = if self.delete_on_stop {
            let stopped = self.buttons.teardown(false).await?;
            if stopped {
                self.buttons.delete_message().await?;
            }
            stopped
        } else {
            self.buttons.cancel().await?
        };
        Ok(if stopped {
            Transition::Stopped
        } else {
            Transition::Closed
        })
    }
}

impl fmt::Debug for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pagination")
            .field("pages", &self.pages)
            .field("buttons", &self.buttons)
            .field("delete_on_stop", &self.delete_on_stop)
            .finish_non_exhaustive()
    }
}
