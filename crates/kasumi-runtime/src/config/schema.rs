//! Configuration schema.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//! filters = { kasumi_framework = "debug" }
//!
//! [interaction]
//! paginate_timeout = 120
//!
//! [bots.main]
//! prefixes = ["!", "?"]
//! owners = ["1234567890"]
//! message_cache_size = 500
//!
//! [bots.main.permissions.roles]
//! "555" = ["ban", "kick"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kasumi_core::{CacheSettings, Snowflake};
use kasumi_framework::{BotSettings, Prefix, ReplyTemplates};
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KasumiConfig {
    pub logging: LoggingConfig,
    pub interaction: InteractionConfig,
    /// Bot instances by name.
    pub bots: BTreeMap<String, BotConfig>,
}

impl KasumiConfig {
    /// The named bot, or the defaults when it is not configured.
    pub fn bot(&self, name: &str) -> BotConfig {
        self.bots.get(name).cloned().unwrap_or_default()
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Needs the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Daily rolling files under `directory`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Per-target levels, e.g. `kasumi_core = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include file and line of each event.
    pub file_location: bool,
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            filters: BTreeMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            directory: PathBuf::from("logs"),
            file_prefix: "kasumi.log".into(),
        }
    }
}

// =============================================================================
// Interaction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Seconds until a pagination cancels itself; 0 disables it.
    pub paginate_timeout: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            paginate_timeout: 120,
        }
    }
}

impl InteractionConfig {
    pub fn paginate_timeout(&self) -> Option<Duration> {
        (self.paginate_timeout > 0).then(|| Duration::from_secs(self.paginate_timeout))
    }
}

// =============================================================================
// Bots
// =============================================================================

/// Capability grants by user and by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub users: BTreeMap<Snowflake, Vec<String>>,
    pub roles: BTreeMap<Snowflake, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Tried in order; the first matching prefix wins.
    pub prefixes: Vec<String>,
    pub owners: Vec<Snowflake>,
    /// Drop messages written by other bots before dispatch.
    pub ignore_bots: bool,
    /// Drop messages written by this bot before dispatch.
    pub ignore_self: bool,
    pub message_cache_size: usize,
    pub permissions: PermissionsConfig,
    pub templates: ReplyTemplates,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".into()],
            owners: Vec::new(),
            ignore_bots: true,
            ignore_self: true,
            message_cache_size: kasumi_core::cache::DEFAULT_MESSAGE_LIMIT,
            permissions: PermissionsConfig::default(),
            templates: ReplyTemplates::default(),
        }
    }
}

impl BotConfig {
    /// Framework settings of this bot.
    pub fn settings(&self, interaction: &InteractionConfig) -> BotSettings {
        let prefix = match self.prefixes.as_slice() {
            [single] => Prefix::Literal(single.clone()),
            many => Prefix::List(many.iter().cloned().map(Prefix::Literal).collect()),
        };
        BotSettings {
            prefix,
            owners: self.owners.iter().copied().collect(),
            templates: self.templates.clone(),
            paginate_timeout: interaction.paginate_timeout(),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            message_limit: self.message_cache_size,
        }
    }
}
