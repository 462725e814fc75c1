//! The bot: cache, event bus and command tables of one account.
//!
//! ```rust,ignore
//! let bot = Bot::new("main", api, BotSettings::default(), CacheSettings::default());
//!
//! bot.command("ping").handler(|_ctx, _args| async { "pong" });
//! bot.register_event(Filter::new().with("content", "hello"), |e: Arc<MessageCreate>| async move {
//!     tracing::info!(author = %e.author.username(), "greeted");
//! });
//! ```
//!
//! Creating a bot installs two things on its bus: the command pipeline as a
//! [`MessageCreate`] callback, and an exception hook that re-publishes
//! every unhandled failure as an [`ExceptionEvent`].

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use kasumi_core::{
    ApiError, BotCache, BoxedApi, CacheError, CacheResult, CacheSettings, Entity, Event, Filter,
    Message, MessageData, Permissions, Snowflake,
};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::command::pipeline::{self, Prefix, ReplyTemplates};
use crate::command::{
    ArgCount, ArgMode, ArgType, Args, Command, CommandAttributes, CommandContext, CommandGroup,
    CommandRegistry, CommandResponse, PermissionRegistry, command_service,
};
use crate::dispatcher::{CallbackId, CallbackResult, EventBus};
use crate::error::{BoxError, InteractionResult};
use crate::events::{ExceptionEvent, MessageCreate};
use crate::hook::{Exception, ExceptionHook, ExceptionSource};
use crate::interaction::{Buttons, PaginateOptions, Pagination};
use crate::module::{MODULES, Module};
use crate::runner::TaskRunner;

/// Default auto-cancel delay of pagination sessions.
pub const DEFAULT_PAGINATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-bot behavior settings.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub prefix: Prefix,
    /// Users allowed to run owner-only commands. Empty means nobody.
    pub owners: HashSet<Snowflake>,
    pub templates: ReplyTemplates,
    /// Auto-cancel delay of pagination sessions; `None` disables it.
    pub paginate_timeout: Option<Duration>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: Prefix::default(),
            owners: HashSet::new(),
            templates: ReplyTemplates::default(),
            paginate_timeout: Some(DEFAULT_PAGINATE_TIMEOUT),
        }
    }
}

type HookSlot = Arc<RwLock<Option<Arc<dyn ExceptionHook>>>>;

/// Re-publishes unhandled failures on the bus.
///
/// Failures of [`ExceptionEvent`] callbacks themselves are not re-published.
struct ExceptionRelay {
    bus: Weak<EventBus>,
    next: HookSlot,
}

impl ExceptionHook for ExceptionRelay {
    fn report(&self, exception: &Exception) {
        let next = self.next.read().clone();
        if let Some(next) = next {
            next.report(exception);
        }
        if exception.source == ExceptionSource::Event && exception.context == ExceptionEvent::NAME {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.trigger::<ExceptionEvent>(exception.clone());
        }
    }
}

struct BotInner {
    name: String,
    cache: BotCache,
    bus: Arc<EventBus>,
    commands: CommandRegistry,
    permissions: PermissionRegistry,
    settings: RwLock<Arc<BotSettings>>,
    hook: HookSlot,
}

/// A bot instance. Cheap to clone.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    pub fn new(
        name: impl Into<String>,
        api: BoxedApi,
        settings: BotSettings,
        cache_settings: CacheSettings,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let hook: HookSlot = Arc::default();
        bus.set_hook(ExceptionRelay {
            bus: Arc::downgrade(&bus),
            next: Arc::clone(&hook),
        });

        let bot = Self {
            inner: Arc::new(BotInner {
                name: name.into(),
                cache: BotCache::new(api, cache_settings),
                bus,
                commands: CommandRegistry::new(),
                permissions: PermissionRegistry::new(),
                settings: RwLock::new(Arc::new(settings)),
                hook,
            }),
        };

        let weak = Arc::downgrade(&bot.inner);
        bot.inner
            .bus
            .add_callback(Filter::new(), move |event: Arc<MessageCreate>| {
                let bot = weak.upgrade().map(|inner| Bot { inner });
                async move {
                    match bot {
                        Some(bot) => pipeline::handle_message(bot, event).await,
                        None => Ok(()),
                    }
                }
            });
        info!(bot = %bot.inner.name, "bot created");
        bot
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn cache(&self) -> &BotCache {
        &self.inner.cache
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn runner(&self) -> &TaskRunner {
        self.inner.bus.runner()
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.inner.commands
    }

    pub fn permissions(&self) -> &PermissionRegistry {
        &self.inner.permissions
    }

    pub fn settings(&self) -> Arc<BotSettings> {
        Arc::clone(&self.inner.settings.read())
    }

    /// Applies `f` to a copy of the settings and swaps it in.
    pub fn update_settings(&self, f: impl FnOnce(&mut BotSettings)) {
        let mut guard = self.inner.settings.write();
        let mut next = BotSettings::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    pub fn is_owner(&self, user: Snowflake) -> bool {
        self.inner.settings.read().owners.contains(&user)
    }

    /// Installs a hook that sees every unhandled failure before it is
    /// re-published as an [`ExceptionEvent`].
    pub fn set_exception_hook(&self, hook: impl ExceptionHook) {
        *self.inner.hook.write() = Some(Arc::new(hook));
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Starts building a command.
    pub fn command(&self, name: impl Into<String>) -> CommandBuilder<'_> {
        CommandBuilder {
            bot: self,
            name: name.into(),
            aliases: Vec::new(),
            attributes: CommandAttributes::default(),
        }
    }

    /// Registers a command; the first name is canonical, the rest are
    /// aliases.
    ///
    /// When the command's group is registered, the group's owner
    /// restriction and permissions are added to the command's own.
    pub fn register_command<N, S, F, Fut>(
        &self,
        names: N,
        attributes: CommandAttributes,
        handler: F,
    ) -> Option<Arc<Command>>
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(CommandContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CommandResponse,
    {
        let mut names = names.into_iter().map(Into::into);
        let name: String = names.next()?;
        Some(self.install(name, names.collect(), attributes, handler))
    }

    fn install<F, Fut>(
        &self,
        name: String,
        aliases: Vec<String>,
        mut attributes: CommandAttributes,
        handler: F,
    ) -> Arc<Command>
    where
        F: Fn(CommandContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CommandResponse,
    {
        if let Some(group) = self.inner.commands.group(&attributes.group) {
            attributes.owner_only |= group.owner_only;
            let merged: Permissions = attributes
                .permissions
                .iter()
                .chain(group.permissions.iter())
                .collect();
            attributes.permissions = merged;
        }
        let service = command_service(&attributes, handler);
        self.inner
            .commands
            .register(Command::new(name, aliases, attributes, service))
    }

    /// Removes a command by any of its names, with all of its aliases.
    pub fn remove_command(&self, name: &str) -> Option<Arc<Command>> {
        self.inner.commands.remove(name)
    }

    pub fn add_group(&self, group: CommandGroup) {
        self.inner.commands.add_group(group);
    }

    pub fn remove_group(&self, name: &str) -> Option<CommandGroup> {
        self.inner.commands.remove_group(name)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes `f` to events of type `E` matching `filter`.
    pub fn register_event<E, F, Fut>(&self, filter: Filter, f: F) -> CallbackId
    where
        E: Event,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CallbackResult,
    {
        self.inner.bus.add_callback(filter, f)
    }

    pub fn remove_event<E: Event>(&self, id: CallbackId) -> bool {
        self.inner.bus.remove_callback::<E>(id)
    }

    /// Publishes an event on this bot's bus.
    pub fn trigger<E: Event>(&self, event: impl Into<E>) -> usize {
        self.inner.bus.trigger(event)
    }

    /// Waits for every in-flight callback and command.
    pub async fn drain(&self) {
        self.inner.bus.drain().await;
    }

    // =========================================================================
    // Modules
    // =========================================================================

    pub fn include(&self, module: &dyn Module) {
        debug!(bot = %self.inner.name, module = module.name(), "including module");
        module.install(self);
    }

    /// Installs every module collected in [`MODULES`].
    pub fn include_registered(&self) -> usize {
        for entry in MODULES {
            self.include(entry);
        }
        MODULES.len()
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// Starts a [`Pagination`] on `message`. See [`PaginateOptions`].
    pub async fn paginate<F, Fut>(
        &self,
        message: &Message,
        pages: usize,
        render: F,
        options: PaginateOptions,
    ) -> InteractionResult<Arc<Pagination>>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Pagination::start(self, message, pages, render, options).await
    }

    /// Attaches reaction [`Buttons`] to `message`.
    pub fn buttons(&self, message: &Message, owner: Option<Snowflake>) -> Arc<Buttons> {
        Buttons::attach(self, message, owner)
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Sends `text` to `channel` and caches the sent message.
    pub async fn send_message(&self, channel: Snowflake, text: &str) -> CacheResult<Arc<Message>> {
        let cache = self.cache();
        let value = cache.api().send_message(channel, text).await?;
        let data: MessageData = serde_json::from_value(value)?;
        let channel = cache
            .get_channel(channel, false)
            .await?
            .ok_or(CacheError::Api(ApiError::NotFound))?;
        cache.put_user(data.author.clone(), false);
        Ok(cache.put_message(&channel, data, false))
    }

    /// Replaces the content of one of the bot's messages.
    pub async fn edit_message(&self, message: &Message, text: &str) -> CacheResult<()> {
        let value = self
            .cache()
            .api()
            .edit_message(message.channel_id(), message.id(), text)
            .await?;
        let data: MessageData = serde_json::from_value(value)?;
        message.update(data);
        Ok(())
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.inner.name)
            .field("commands", &self.inner.commands.len())
            .field("bus", &self.inner.bus)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Command Builder
// =============================================================================

/// Fluent command registration, finished by [`CommandBuilder::handler`].
#[must_use = "a command is only registered once `handler` is called"]
pub struct CommandBuilder<'a> {
    bot: &'a Bot,
    name: String,
    aliases: Vec<String>,
    attributes: CommandAttributes,
}

impl CommandBuilder<'_> {
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn attributes(mut self, attributes: CommandAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.attributes = self.attributes.group(group);
        self
    }

    pub fn arg_count(mut self, count: impl Into<ArgCount>) -> Self {
        self.attributes = self.attributes.arg_count(count);
        self
    }

    pub fn arg_mode(mut self, mode: ArgMode) -> Self {
        self.attributes = self.attributes.arg_mode(mode);
        self
    }

    pub fn arg_types(mut self, types: impl IntoIterator<Item = ArgType>) -> Self {
        self.attributes = self.attributes.arg_types(types);
        self
    }

    pub fn owner_only(mut self, owner_only: bool) -> Self {
        self.attributes = self.attributes.owner_only(owner_only);
        self
    }

    pub fn permissions<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = self.attributes.permissions(flags);
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.attributes = self.attributes.usage(usage);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.attributes = self.attributes.description(description);
        self
    }

    pub fn hide_help(mut self, hide: bool) -> Self {
        self.attributes = self.attributes.hide_help(hide);
        self
    }

    /// Registers the command with `handler` as its body.
    pub fn handler<F, Fut>(self, handler: F) -> Arc<Command>
    where
        F: Fn(CommandContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CommandResponse,
    {
        self.bot
            .install(self.name, self.aliases, self.attributes, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleEntry;
    use kasumi_core::FilterValue;
    use kasumi_core::testing::{
        BOT_USER_ID, MockApi, channel_json, member_json, message_json, server_json, user_json,
    };
    use linkme::distributed_slice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SERVER: u64 = 5;
    const CHANNEL: u64 = 10;
    const ALICE: u64 = 42;
    const ROLE: u64 = 77;

    #[distributed_slice(MODULES)]
    static PING_MODULE: ModuleEntry = ModuleEntry::new("ping", |bot: &Bot| {
        bot.command("ping").handler(|_ctx, _args| async { "pong" });
    });

    struct Fixture {
        api: Arc<MockApi>,
        bot: Bot,
        next_id: AtomicUsize,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_settings(BotSettings::default())
        }

        fn with_settings(settings: BotSettings) -> Self {
            let api = Arc::new(MockApi::new());
            api.insert_server(server_json(SERVER, "guild"));
            api.insert_channel(channel_json(CHANNEL, Some(SERVER), "general"));
            api.insert_member(
                Snowflake(SERVER),
                member_json(user_json(ALICE, "alice"), &[ROLE]),
            );
            let bot = Bot::new("test", api.clone(), settings, CacheSettings::default());
            Self {
                api,
                bot,
                next_id: AtomicUsize::new(1000),
            }
        }

        /// Posts `content` as alice and waits for everything it started.
        async fn post(&self, content: &str) {
            self.publish(content).await;
            self.bot.drain().await;
        }

        /// Posts `content` as alice without waiting.
        async fn publish(&self, content: &str) {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) as u64;
            let cache = self.bot.cache();
            let channel = cache
                .get_channel(Snowflake(CHANNEL), false)
                .await
                .unwrap()
                .unwrap();
            let data: MessageData =
                serde_json::from_value(message_json(id, CHANNEL, user_json(ALICE, "alice"), content))
                    .unwrap();
            let author = cache.put_user(data.author.clone(), false);
            let message = cache.put_message(&channel, data, false);
            self.bot
                .trigger::<MessageCreate>(MessageCreate::new(message, channel, author));
        }

        fn sent(&self) -> Vec<String> {
            self.api.sent()
        }
    }

    fn echo(bot: &Bot, seen: Arc<parking_lot::Mutex<Vec<String>>>) {
        bot.command("echo")
            .aliases(["say"])
            .arg_mode(ArgMode::Concat)
            .arg_types([ArgType::String])
            .handler(move |_ctx, args: Args| {
                let seen = Arc::clone(&seen);
                async move {
                    let text = args.str(0).unwrap_or_default().to_owned();
                    seen.lock().push(text.clone());
                    text
                }
            });
    }

    #[tokio::test]
    async fn echo_receives_concatenated_text() {
        let fx = Fixture::new();
        let seen = Arc::default();
        echo(&fx.bot, Arc::clone(&seen));

        fx.post("!echo hello world").await;
        fx.post("!SAY  again").await;

        assert_eq!(*seen.lock(), vec!["hello world", "again"]);
        assert_eq!(fx.sent(), vec!["hello world", "again"]);
    }

    #[tokio::test]
    async fn bare_prefix_and_plain_text_do_nothing() {
        let fx = Fixture::new();
        echo(&fx.bot, Arc::default());
        fx.api.clear_calls();

        fx.post("!").await;
        fx.post("!   ").await;
        fx.post("echo hello").await;

        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn prefix_lists_take_the_first_match() {
        let longest_first = BotSettings {
            prefix: Prefix::from(vec!["!!".to_owned(), "!".to_owned()]),
            ..BotSettings::default()
        };
        let fx = Fixture::with_settings(longest_first);
        fx.bot.command("ping").handler(|_ctx, _args| async { "pong" });
        fx.post("!!ping").await;
        fx.post("!ping").await;
        assert_eq!(fx.sent(), vec!["pong", "pong"]);

        let shortest_first = BotSettings {
            prefix: Prefix::from(vec!["!".to_owned(), "!!".to_owned()]),
            ..BotSettings::default()
        };
        let fx = Fixture::with_settings(shortest_first);
        fx.bot.command("ping").handler(|_ctx, _args| async { "pong" });
        fx.post("!!ping").await;
        assert_eq!(fx.sent(), vec!["Unknown command `!ping`."]);
    }

    #[tokio::test]
    async fn custom_prefixes_see_the_event() {
        let addressed = BotSettings {
            prefix: Prefix::custom(|text, event| {
                if event.author.id() != Snowflake(ALICE) {
                    return None;
                }
                text.strip_prefix("kasumi,").map(|rest| rest.trim_start().to_owned())
            }),
            ..BotSettings::default()
        };
        let fx = Fixture::with_settings(addressed);
        fx.bot.command("ping").handler(|_ctx, _args| async { "pong" });

        fx.post("kasumi, ping").await;
        fx.post("!ping").await;
        assert_eq!(fx.sent(), vec!["pong"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commands_do_not_wait_for_each_other() {
        let fx = Fixture::new();
        let (release, released) = tokio::sync::oneshot::channel::<()>();
        let released = Arc::new(tokio::sync::Mutex::new(Some(released)));
        let release = Arc::new(parking_lot::Mutex::new(Some(release)));
        fx.bot.command("wait").handler(move |_ctx, _args| {
            let released = Arc::clone(&released);
            async move {
                if let Some(rx) = released.lock().await.take() {
                    let _ = rx.await;
                }
                "released"
            }
        });
        fx.bot.command("go").handler(move |_ctx, _args| {
            let release = release.lock().take();
            async move {
                if let Some(tx) = release {
                    let _ = tx.send(());
                }
                "sent"
            }
        });

        fx.publish("!wait").await;
        fx.publish("!go").await;
        let drained = tokio::time::timeout(Duration::from_secs(5), fx.bot.drain()).await;
        tokio_test::assert_ok!(drained);

        let mut sent = fx.sent();
        sent.sort();
        assert_eq!(sent, vec!["released", "sent"]);
    }

    #[tokio::test]
    async fn unknown_command_is_answered() {
        let fx = Fixture::new();
        fx.post("!nosuchcmd with args").await;
        assert_eq!(fx.sent(), vec!["Unknown command `nosuchcmd`."]);
    }

    #[tokio::test]
    async fn validation_failures_become_replies() {
        let fx = Fixture::new();
        fx.bot
            .command("add")
            .arg_count(2..=2)
            .arg_types([ArgType::Integer])
            .usage("add <a> <b>")
            .handler(|_ctx, args: Args| async move {
                format!("{}", args.int(0).unwrap_or(0) + args.int(1).unwrap_or(0))
            });

        fx.post("!add 1 2").await;
        fx.post("!add 1").await;
        fx.post("!add 1 2 3").await;
        fx.post("!add 1 two").await;
        fx.post("!add \"1 2").await;

        assert_eq!(
            fx.sent(),
            vec![
                "3".to_owned(),
                "Not enough arguments for `add`.\nUsage: add <a> <b>".to_owned(),
                "Too many arguments for `add`.\nUsage: add <a> <b>".to_owned(),
                "Argument 2 of `add` is invalid.\nUsage: add <a> <b>".to_owned(),
                "Invalid syntax for `add`: malformed quotes.\nUsage: add <a> <b>".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn owner_only_denies_everyone_without_owners() {
        let fx = Fixture::new();
        fx.bot
            .command("shutdown")
            .owner_only(true)
            .handler(|_ctx, _args| async { "bye" });

        fx.post("!shutdown").await;
        fx.bot.update_settings(|s| {
            s.owners.insert(Snowflake(ALICE));
        });
        fx.post("!shutdown").await;

        assert_eq!(
            fx.sent(),
            vec!["`shutdown` is reserved for the bot owners.", "bye"]
        );
    }

    #[tokio::test]
    async fn every_role_must_carry_the_permissions() {
        let fx = Fixture::new();
        fx.bot
            .command("ban")
            .permissions(["ban"])
            .handler(|_ctx, _args| async { "banned" });
        let denied = "You lack the permissions required by `ban`.";

        fx.post("!ban").await;
        fx.bot.permissions().grant_user(Snowflake(ALICE), ["ban"]);
        fx.post("!ban").await;
        fx.bot.permissions().grant_role(Snowflake(ROLE), ["ban", "kick"]);
        fx.post("!ban").await;

        assert_eq!(fx.sent(), vec![denied, denied, "banned"]);
    }

    #[tokio::test]
    async fn group_restrictions_apply_at_registration() {
        let fx = Fixture::new();
        fx.bot
            .add_group(CommandGroup::new("Admin").owner_only(true).permissions(["manage"]));
        let command = fx
            .bot
            .command("purge")
            .group("Admin")
            .permissions(["delete"])
            .handler(|_ctx, _args| async {});

        assert!(command.attributes().owner_only);
        assert!(command.attributes().permissions.contains("manage"));
        assert!(command.attributes().permissions.contains("delete"));
    }

    #[tokio::test]
    async fn remove_command_drops_aliases() {
        let fx = Fixture::new();
        echo(&fx.bot, Arc::default());

        assert!(fx.bot.remove_command("say").is_some());
        assert!(fx.bot.commands().lookup("echo").is_none());
        assert!(fx.bot.commands().lookup("say").is_none());
        assert!(fx.bot.remove_command("echo").is_none());
    }

    #[tokio::test]
    async fn failures_are_republished_once() {
        let fx = Fixture::new();
        let hooked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hooked);
        fx.bot.set_exception_hook(move |_: &Exception| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let from_commands = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&from_commands);
        fx.bot.register_event(
            Filter::new().with("type", FilterValue::symbol("command")),
            move |event: Arc<ExceptionEvent>| {
                assert_eq!(event.exception.context, "fail");
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
        );
        fx.bot.register_event(Filter::new(), |_: Arc<ExceptionEvent>| async {
            Err::<(), BoxError>("exception callback failed".into())
        });
        fx.bot
            .command("fail")
            .handler(|_ctx, _args| async { Err::<(), _>("boom") });

        fx.post("!fail").await;

        assert_eq!(from_commands.load(Ordering::SeqCst), 1);
        // The command failure, then the failing exception callback.
        assert_eq!(hooked.load(Ordering::SeqCst), 2);
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn registered_modules_are_installed() {
        let fx = Fixture::new();
        assert!(fx.bot.include_registered() >= 1);

        fx.post("!ping").await;
        assert_eq!(fx.sent(), vec!["pong"]);
    }

    #[tokio::test]
    async fn send_message_caches_the_result() {
        let fx = Fixture::new();
        let sent = fx.bot.send_message(Snowflake(CHANNEL), "hi").await.unwrap();
        let channel = fx
            .bot
            .cache()
            .get_channel(Snowflake(CHANNEL), true)
            .await
            .unwrap()
            .unwrap();
        let cached = fx
            .bot
            .cache()
            .get_message(&channel, sent.id(), true)
            .await
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&sent, &cached));

        let author = fx.bot.cache().get_user(BOT_USER_ID, true).await.unwrap();
        assert!(author.is_some_and(|u| u.is_bot()));
    }
}
