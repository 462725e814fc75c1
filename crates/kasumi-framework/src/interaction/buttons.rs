//! Reaction buttons on a message.
//!
//! [`Buttons`] turns reactions on one message into calls of per-emoji
//! handlers. It backs [`Pagination`](super::Pagination) and can be used on
//! its own for confirmation prompts and other menus:
//!
//! ```rust,ignore
//! let buttons = Buttons::attach(ctx.bot(), &message, Some(ctx.author().id()));
//! buttons.add(CHECK, |_press| async move { do_it().await }).await?;
//! buttons.add(CROSS, move |_press| { let b = b.clone(); async move { b.cancel().await } }).await?;
//! buttons.auto_cancel(Duration::from_secs(30));
//! ```
//!
//! Teardown happens once, whichever comes first: [`Buttons::cancel`], the
//! auto-cancel timer, or deletion of the bound message.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use kasumi_core::{CacheResult, Emoji, Entity, Filter, Message, Snowflake};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, warn};

use crate::bot::Bot;
use crate::dispatcher::CallbackId;
use crate::error::BoxError;
use crate::events::{MessageDelete, ReactionAdd};
use crate::hook::ExceptionSource;

/// ❎
pub const CROSS: &str = "\u{274E}";
/// ✅
pub const CHECK: &str = "\u{2705}";

/// A reaction honored as a button press.
#[derive(Debug, Clone)]
pub struct ButtonPress {
    pub user: Snowflake,
    pub emoji: Emoji,
}

type ButtonFn = Arc<dyn Fn(ButtonPress) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Reaction handlers bound to one message.
pub struct Buttons {
    bot: Bot,
    channel: Snowflake,
    message: Snowflake,
    owner: Option<Snowflake>,
    handlers: Mutex<HashMap<String, ButtonFn>>,
    subscriptions: Mutex<Option<(CallbackId, CallbackId)>>,
    closed: AtomicBool,
    timer_started: AtomicBool,
    token: CancellationToken,
}

impl Buttons {
    /// Starts listening for reactions on `message`.
    ///
    /// With an `owner`, only that user's reactions are honored; everybody
    /// else's are left alone.
    pub fn attach(bot: &Bot, message: &Message, owner: Option<Snowflake>) -> Arc<Self> {
        let buttons = Arc::new(Self {
            bot: bot.clone(),
            channel: message.channel_id(),
            message: message.id(),
            owner,
            handlers: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(None),
            closed: AtomicBool::new(false),
            timer_started: AtomicBool::new(false),
            token: CancellationToken::new(),
        });

        let filter = Filter::new().with("message", message.id());
        let this = Arc::clone(&buttons);
        let on_reaction = bot.register_event(filter.clone(), move |event: Arc<ReactionAdd>| {
            let this = Arc::clone(&this);
            async move { this.on_reaction(&event).await }
        });
        let this = Arc::clone(&buttons);
        let on_delete = bot.register_event(filter, move |_: Arc<MessageDelete>| {
            let this = Arc::clone(&this);
            async move {
                this.teardown(false).await?;
                Ok::<_, BoxError>(())
            }
        });
        *buttons.subscriptions.lock() = Some((on_reaction, on_delete));
        debug!(message = %buttons.message, owner = ?owner, "buttons attached");
        buttons
    }

    pub fn message_id(&self) -> Snowflake {
        self.message
    }

    pub fn channel_id(&self) -> Snowflake {
        self.channel
    }

    pub fn owner(&self) -> Option<Snowflake> {
        self.owner
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Binds `handler` to `emoji` and adds the reaction to the message.
    pub async fn add<F, Fut>(&self, emoji: &str, handler: F) -> CacheResult<()>
    where
        F: Fn(ButtonPress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let handler: ButtonFn = Arc::new(move |press| handler(press).boxed());
        self.handlers.lock().insert(emoji.to_owned(), handler);
        self.bot
            .cache()
            .api()
            .add_reaction(self.channel, self.message, emoji)
            .await?;
        Ok(())
    }

    /// Unbinds `emoji` and takes back the bot's reaction.
    pub async fn remove(&self, emoji: &str) -> CacheResult<bool> {
        if self.handlers.lock().remove(emoji).is_none() {
            return Ok(false);
        }
        self.bot
            .cache()
            .api()
            .remove_reaction(self.channel, self.message, emoji, None)
            .await?;
        Ok(true)
    }

    /// Stops listening and clears every reaction from the message.
    ///
    /// Returns `false` when the buttons were already torn down.
    pub async fn cancel(&self) -> CacheResult<bool> {
        self.teardown(true).await
    }

    /// Cancels the buttons after `after`, counted from the first call.
    ///
    /// Later calls are ignored, and the timer never restarts.
    pub fn auto_cancel(self: &Arc<Self>, after: Duration) {
        if self.timer_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let this = Arc::clone(self);
        let shutdown = self.bot.runner().shutdown_token().clone();
        let span = info_span!("auto_cancel", message = %self.message);
        self.bot.runner().spawn(
            ExceptionSource::Interaction,
            "auto_cancel",
            span,
            async move {
                tokio::select! {
                    _ = this.token.cancelled() => {}
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(after) => {
                        debug!(message = %this.message, "buttons timed out");
                        this.cancel().await?;
                    }
                }
                Ok::<_, BoxError>(())
            },
        );
    }

    /// Tears everything down exactly once.
    ///
    /// `clear` removes the reactions; skipped when the message is gone.
    pub(crate) async fn teardown(&self, clear: bool) -> CacheResult<bool> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.token.cancel();
        if let Some((on_reaction, on_delete)) = self.subscriptions.lock().take() {
            self.bot.remove_event::<ReactionAdd>(on_reaction);
            self.bot.remove_event::<MessageDelete>(on_delete);
        }
        self.handlers.lock().clear();
        debug!(message = %self.message, "buttons torn down");
        if clear {
            self.bot
                .cache()
                .api()
                .clear_reactions(self.channel, self.message)
                .await?;
        }
        Ok(true)
    }

    pub(crate) async fn delete_message(&self) -> CacheResult<()> {
        self.bot
            .cache()
            .api()
            .delete_message(self.channel, self.message)
            .await?;
        Ok(())
    }

    async fn on_reaction(&self, event: &ReactionAdd) -> Result<(), BoxError> {
        if self.is_closed() {
            return Ok(());
        }
        let profile = self.bot.cache().profile().map(|p| p.id());
        if Some(event.user_id) == profile {
            return Ok(());
        }
        if self.owner.is_some_and(|owner| owner != event.user_id) {
            trace!(user = %event.user_id, "reaction from non-owner ignored");
            return Ok(());
        }
        let key = event.emoji.reaction_key();
        let Some(handler) = self.handlers.lock().get(&key).cloned() else {
            return Ok(());
        };

        if let Err(err) = self
            .bot
            .cache()
            .api()
            .remove_reaction(self.channel, self.message, &key, Some(event.user_id))
            .await
        {
            warn!(error = %err, emoji = %key, "could not remove reaction");
        }

        let press = ButtonPress {
            user: event.user_id,
            emoji: event.emoji.clone(),
        };
        let span = info_span!("button", message = %self.message, emoji = %key);
        self.bot
            .runner()
            .spawn(ExceptionSource::Interaction, key, span, handler(press));
        Ok(())
    }
}

impl fmt::Debug for Buttons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buttons")
            .field("message", &self.message)
            .field("owner", &self.owner)
            .field("buttons", &self.handlers.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::BotSettings;
    use kasumi_core::testing::{ApiCall, MockApi, bot_user_json, channel_json};
    use kasumi_core::{CacheSettings, Channel};
    use std::sync::atomic::AtomicUsize;
    use tokio_test::assert_ok;

    async fn fixture() -> (Arc<MockApi>, Bot, Arc<Channel>, Arc<Message>) {
        let api = Arc::new(MockApi::new());
        api.insert_channel(channel_json(10, None, "lobby"));
        let bot = Bot::new("test", api.clone(), BotSettings::default(), CacheSettings::default());
        bot.cache()
            .set_profile(serde_json::from_value(bot_user_json()).unwrap());
        let message = bot.send_message(Snowflake(10), "confirm?").await.unwrap();
        let channel = bot.cache().get_channel(Snowflake(10), true).await.unwrap().unwrap();
        api.clear_calls();
        (api, bot, channel, message)
    }

    fn press(bot: &Bot, channel: &Arc<Channel>, message: &Message, user: u64, emoji: &str) {
        bot.trigger::<ReactionAdd>(ReactionAdd {
            message_id: message.id(),
            channel: Arc::clone(channel),
            user_id: Snowflake(user),
            emoji: Emoji::unicode(emoji),
        });
    }

    #[tokio::test]
    async fn honored_press_runs_handler() {
        let (api, bot, channel, message) = fixture().await;
        let buttons = Buttons::attach(&bot, &message, None);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        assert_ok!(
            buttons
                .add(CHECK, move |press: ButtonPress| {
                    assert_eq!(press.user, Snowflake(7));
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, BoxError>(()) }
                })
                .await
        );

        press(&bot, &channel, &message, 7, CHECK);
        press(&bot, &channel, &message, 7, CROSS);
        bot.drain().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(api.count(|c| matches!(c, ApiCall::AddReaction { .. })), 1);
        assert_eq!(api.count(|c| matches!(c, ApiCall::RemoveReaction { user: Some(_), .. })), 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (api, bot, channel, message) = fixture().await;
        let buttons = Buttons::attach(&bot, &message, None);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        buttons
            .add(CHECK, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BoxError>(()) }
            })
            .await
            .unwrap();

        assert!(buttons.cancel().await.unwrap());
        assert!(!buttons.cancel().await.unwrap());
        press(&bot, &channel, &message, 7, CHECK);
        bot.drain().await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(api.count(|c| matches!(c, ApiCall::ClearReactions { .. })), 1);
        assert_eq!(bot.bus().dispatcher::<ReactionAdd>().len(), 0);
    }

    #[tokio::test]
    async fn removed_button_stops_answering() {
        let (api, bot, channel, message) = fixture().await;
        let buttons = Buttons::attach(&bot, &message, None);
        buttons.add(CROSS, |_| async { Ok::<_, BoxError>(()) }).await.unwrap();

        assert!(buttons.remove(CROSS).await.unwrap());
        assert!(!buttons.remove(CROSS).await.unwrap());
        press(&bot, &channel, &message, 7, CROSS);
        bot.drain().await;

        assert_eq!(
            api.count(|c| matches!(c, ApiCall::RemoveReaction { user: None, .. })),
            1
        );
        assert_eq!(api.count(|c| matches!(c, ApiCall::RemoveReaction { user: Some(_), .. })), 0);
    }
}
