//! Drives one bot from a stream of raw events.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use kasumi_runtime::{Runtime, load_config};
//!
//! let config = load_config()?;
//! let runtime = Runtime::new(&config, "main", api)?;
//! runtime.bot().include_registered();
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! // hand `tx` to a transport...
//! runtime.run(rx).await?;
//! ```

use std::fmt;
use std::future::Future;

use kasumi_core::BoxedApi;
use kasumi_framework::Bot;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::KasumiConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::gateway::{Gateway, RawEvent};

/// A configured bot plus the loop feeding it.
pub struct Runtime {
    bot: Bot,
    gateway: Gateway,
    shutdown: CancellationToken,
    handle_signals: bool,
}

impl Runtime {
    /// Builds the bot named `bot_name` from `config`, talking to `api`.
    ///
    /// A name without a `[bots.<name>]` table runs with default settings.
    pub fn new(config: &KasumiConfig, bot_name: &str, api: BoxedApi) -> RuntimeResult<Self> {
        if bot_name.trim().is_empty() {
            return Err(RuntimeError::Bot("bot name must not be empty".into()));
        }
        if !config.bots.contains_key(bot_name) {
            warn!(bot = %bot_name, "no configuration for bot, using defaults");
        }
        let bot_config = config.bot(bot_name);
        let bot = Bot::new(
            bot_name,
            api,
            bot_config.settings(&config.interaction),
            bot_config.cache_settings(),
        );

        let grants = bot.permissions();
        for (user, flags) in &bot_config.permissions.users {
            grants.grant_user(*user, flags.iter().cloned());
        }
        for (role, flags) in &bot_config.permissions.roles {
            grants.grant_role(*role, flags.iter().cloned());
        }

        let gateway = Gateway::new(bot.clone())
            .ignore_bots(bot_config.ignore_bots)
            .ignore_self(bot_config.ignore_self);
        debug!(bot = %bot_name, owners = bot_config.owners.len(), "runtime created");

        Ok(Self {
            bot,
            gateway,
            shutdown: CancellationToken::new(),
            handle_signals: true,
        })
    }

    /// Ignores Ctrl+C and SIGTERM; only [`shutdown`](Self::shutdown) and a
    /// closed stream stop [`run`](Self::run).
    pub fn without_signals(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// A token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Applies events until the stream closes, a signal arrives or
    /// [`shutdown`](Self::shutdown) is called, then waits for in-flight work.
    pub async fn run(&self, events: mpsc::Receiver<RawEvent>) -> RuntimeResult<()> {
        let signals = wait_for_signal(self.handle_signals);
        self.run_until(events, signals).await
    }

    /// Like [`run`](Self::run), with a custom stop future instead of signals.
    pub async fn run_until<F>(&self, mut events: mpsc::Receiver<RawEvent>, stop: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(bot = %self.bot.name(), "Kasumi runtime is now running");
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = &mut stop => break,
                event = events.recv() => match event {
                    // Only reads the cache; channel lookups run on the bot's runner.
                    Some(event) => {
                        let name = event.name();
                        if let Err(e) = self.gateway.handle(event).await {
                            warn!(event = name, error = %e, "Failed to apply event");
                        }
                    }
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                },
            }
        }

        // Stops timers and pending interactions before waiting on them.
        self.bot.runner().shutdown();
        self.bot.drain().await;
        info!("Runtime stopped");
        Ok(())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("bot", &self.bot.name())
            .field("handle_signals", &self.handle_signals)
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}

/// Resolves on Ctrl+C or SIGTERM; never when `enabled` is false or the
/// handlers cannot be installed.
async fn wait_for_signal(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                return ctrl_c().await;
            }
        };

        tokio::select! {
            _ = ctrl_c() => {}
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
