//! Built-in modules: `ping`, `echo` and `pages`.
//!
//! They register themselves in [`MODULES`] and are installed by
//! [`Bot::include_registered`].

use std::sync::Arc;

use kasumi_core::Entity;
use kasumi_framework::linkme::distributed_slice;
use kasumi_framework::{ArgMode, ArgType, Bot, BoxError, MODULES, ModuleEntry, PaginateOptions};

/// Largest page count `pages` accepts.
pub const MAX_PAGES: i64 = 50;
const DEFAULT_PAGES: i64 = 5;

#[distributed_slice(MODULES)]
#[linkme(crate = kasumi_framework::linkme)]
pub static PING: ModuleEntry = ModuleEntry::new("ping", |bot: &Bot| {
    bot.command("ping")
        .arg_count(0)
        .description("Checks that the bot is alive.")
        .handler(|_ctx, _args| async { "Pong!" });
});

#[distributed_slice(MODULES)]
#[linkme(crate = kasumi_framework::linkme)]
pub static ECHO: ModuleEntry = ModuleEntry::new("echo", |bot: &Bot| {
    bot.command("echo")
        .aliases(["say"])
        .arg_mode(ArgMode::Concat)
        .arg_count(1)
        .usage("echo <text>")
        .description("Repeats the text back.")
        .handler(|_ctx, args| async move { args.str(0).map(str::to_owned) });
});

#[distributed_slice(MODULES)]
#[linkme(crate = kasumi_framework::linkme)]
pub static PAGES: ModuleEntry = ModuleEntry::new("pages", |bot: &Bot| {
    bot.command("pages")
        .arg_count(..=1)
        .arg_types([ArgType::Integer])
        .usage("pages [count]")
        .description("Shows a paginated demo message. React to turn pages.")
        .handler(|ctx, args| async move {
            let pages = args.int(0).unwrap_or(DEFAULT_PAGES).clamp(1, MAX_PAGES) as usize;
            let message = ctx.reply(&page_text(1, pages)).await?;

            let (bot, target) = (ctx.bot().clone(), Arc::clone(&message));
            let render = move |page: usize| {
                let (bot, target) = (bot.clone(), Arc::clone(&target));
                async move {
                    bot.edit_message(&target, &page_text(page, pages)).await?;
                    Ok::<_, BoxError>(())
                }
            };
            let options = PaginateOptions::default().owner(ctx.author().id());
            ctx.bot().paginate(&message, pages, render, options).await?;
            Ok::<_, BoxError>(())
        });
});

fn page_text(page: usize, pages: usize) -> String {
    format!("Page {page} of {pages}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasumi_core::testing::{ApiCall, MockApi, channel_json, message_json, user_json};
    use kasumi_core::{CacheSettings, Snowflake};
    use kasumi_framework::events::MessageCreate;
    use kasumi_framework::interaction::Gesture;
    use kasumi_framework::{BotSettings, Module};

    fn bot() -> (Arc<MockApi>, Bot) {
        let api = Arc::new(MockApi::new());
        api.insert_channel(channel_json(10, None, "lobby"));
        let settings = BotSettings {
            // Tests drain the runner, which would otherwise wait for the timer.
            paginate_timeout: None,
            ..BotSettings::default()
        };
        let bot = Bot::new("test", api.clone(), settings, CacheSettings::default());
        (api, bot)
    }

    async fn post(bot: &Bot, id: u64, content: &str) {
        let cache = bot.cache();
        let channel = cache.get_channel(Snowflake(10), false).await.unwrap().unwrap();
        let data = serde_json::from_value(message_json(id, 10, user_json(42, "alice"), content)).unwrap();
        let author = cache.put_user(serde_json::from_value(user_json(42, "alice")).unwrap(), true);
        let message = cache.put_message(&channel, data, true);
        bot.trigger::<MessageCreate>(MessageCreate::new(message, channel, author));
        bot.drain().await;
    }

    #[tokio::test]
    async fn ping_and_echo() {
        let (api, bot) = bot();
        bot.include(&PING);
        bot.include(&ECHO);

        post(&bot, 1, "!ping").await;
        post(&bot, 2, "!say  hello   world").await;
        post(&bot, 3, "!echo").await;

        let sent = api.sent();
        assert_eq!(sent[0], "Pong!");
        assert_eq!(sent[1], "hello   world");
        assert!(sent[2].starts_with("Not enough arguments for `echo`."));
    }

    #[tokio::test]
    async fn pages_starts_a_session() {
        let (api, bot) = bot();
        bot.include(&PAGES);
        post(&bot, 1, "!pages 3").await;

        assert_eq!(api.sent(), vec!["Page 1 of 3".to_owned()]);
        let reactions = api.count(|c| matches!(c, ApiCall::AddReaction { .. }));
        assert_eq!(reactions, Gesture::ALL.len());
        // The start page is rendered by editing the reply.
        assert_eq!(api.count(|c| matches!(c, ApiCall::EditMessage { .. })), 1);
    }

    #[tokio::test]
    async fn pages_rejects_non_numbers() {
        let (api, bot) = bot();
        bot.include(&PAGES);
        post(&bot, 1, "!pages many").await;
        assert!(api.sent()[0].starts_with("Argument 1 of `pages` is invalid."));
    }

    #[test]
    fn builtins_are_registered() {
        let names: Vec<_> = MODULES.iter().map(|m| m.name()).collect();
        for name in ["ping", "echo", "pages"] {
            assert!(names.contains(&name), "{name} missing");
        }
    }

    #[test]
    fn page_text_format() {
        assert_eq!(page_text(2, 7), "Page 2 of 7");
    }
}
