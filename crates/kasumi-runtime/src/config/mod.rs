//! Runtime configuration: schema, layered loading and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_FILE_NAME, ConfigLoader, ENV_PREFIX, load_config};
pub use schema::{
    BotConfig, InteractionConfig, KasumiConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    PermissionsConfig, SpanEventConfig,
};
pub use validation::validate_config;
