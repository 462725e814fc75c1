//! `kasumi`: runs one bot against the console transport.
//!
//! ```bash
//! kasumi --bot main --config kasumi.toml --log debug
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kasumi::runtime::{ConfigLoader, ConsoleApi, LogLevel, LoggingBuilder, Runtime, console};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Raw events buffered between the transport and the runtime.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "kasumi", version, about = "An in-process chat bot runtime")]
struct Cli {
    /// Configuration file, applied over kasumi.toml and KASUMI_* variables.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Which `[bots.<name>]` table to run.
    #[arg(short, long, value_name = "NAME", default_value = "main")]
    bot: String,

    /// Overrides the configured log level.
    #[arg(short, long, value_name = "LEVEL")]
    log: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let mut logging = LoggingBuilder::from_config(&config.logging);
    if let Some(level) = cli.log {
        logging = logging.level(level);
    }
    let _guard = logging.try_init().context("failed to initialize logging")?;

    let bot_config = config.bot(&cli.bot);
    let api = Arc::new(ConsoleApi::new(cli.bot.clone()));
    let runtime = Runtime::new(&config, &cli.bot, api.clone())?;
    if bot_config.owners.is_empty() {
        warn!("No owners configured; owner-only commands are disabled");
    }

    let modules = runtime.bot().include_registered();
    info!(bot = %cli.bot, modules, "Type a message, or /react <emoji> on the last reply");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let reader = console::spawn_reader(api, tx);
    runtime.run(rx).await?;

    // The reader only stops on its own at end of input.
    if reader.is_finished() {
        reader.await.context("console reader panicked")??;
    } else {
        reader.abort();
    }
    Ok(())
}
