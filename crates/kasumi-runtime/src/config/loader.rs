//! Layered configuration loading with figment.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. `kasumi.toml` from the first search path that has one
//! 3. `KASUMI_*` environment variables, `__` separating nested keys
//! 4. An explicit file passed with [`ConfigLoader::file`]
//! 5. Programmatic overrides from [`ConfigLoader::merge`]
//!
//! The default search path is the working directory, then
//! `<config dir>/kasumi/`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().file("deploy/kasumi.toml").load()?;
//! ```
//!
//! `KASUMI_LOGGING__LEVEL=debug` sets `logging.level`;
//! `KASUMI_BOTS__MAIN__PREFIXES=[">"]` sets the prefixes of bot `main`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::KasumiConfig;
use super::validation::validate_config;

pub const CONFIG_FILE_NAME: &str = "kasumi.toml";
pub const ENV_PREFIX: &str = "KASUMI_";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: Figment::new(),
        }
    }

    /// Adds a directory to look for `kasumi.toml` in. Replaces the default
    /// search path once called.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads this file on top of everything else; it must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges `config` with the highest priority.
    pub fn merge(mut self, config: KasumiConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads and validates the configuration.
    pub fn load(self) -> ConfigResult<KasumiConfig> {
        let config: KasumiConfig = self.figment()?.extract()?;
        validate_config(&config)?;
        debug!(
            level = %config.logging.level,
            bots = config.bots.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// The merged sources, before extraction.
    pub fn figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(KasumiConfig::default()));

        match self.search() {
            Some(path) => {
                info!(path = %path.display(), "loading configuration file");
                figment = figment.merge(Toml::file(path));
            }
            None => debug!("no {CONFIG_FILE_NAME} in the search path"),
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                return Err(ConfigError::UnsupportedFormat(path.clone()));
            }
            info!(path = %path.display(), "loading configuration file");
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(self.overrides))
    }

    fn search(&self) -> Option<PathBuf> {
        let defaults;
        let paths = if self.search_paths.is_empty() {
            defaults = default_search_paths();
            &defaults
        } else {
            &self.search_paths
        };
        let found = paths
            .iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|path| path.is_file());
        if found.is_none() && self.config_file.is_none() {
            warn!("no configuration file found, using defaults");
        }
        found
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kasumi"));
    }
    paths
}

/// Loads from the default locations.
pub fn load_config() -> ConfigResult<KasumiConfig> {
    ConfigLoader::new().load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};
    use kasumi_core::Snowflake;
    use std::fs;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = assert_ok!(ConfigLoader::new().search_path(dir.path()).without_env().load());

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.interaction.paginate_timeout(), Some(Duration::from_secs(120)));
        let bot = config.bot("main");
        assert_eq!(bot.prefixes, vec!["!"]);
        assert!(bot.ignore_bots && bot.ignore_self);
        assert_eq!(bot.message_cache_size, 200);
    }

    #[test]
    fn search_path_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            CONFIG_FILE_NAME,
            r#"
                [logging]
                level = "debug"
                format = "pretty"
                filters = { kasumi_core = "trace" }

                [interaction]
                paginate_timeout = 0

                [bots.main]
                prefixes = ["?", "kasumi "]
                owners = ["42", 43]
                message_cache_size = 50

                [bots.main.permissions.roles]
                "77" = ["ban"]

                [bots.main.templates]
                unknown_command = "what is {cmd}?"
            "#,
        );
        let config = assert_ok!(ConfigLoader::new().search_path(dir.path()).without_env().load());

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filters["kasumi_core"], LogLevel::Trace);
        assert_eq!(config.interaction.paginate_timeout(), None);

        let bot = config.bot("main");
        assert_eq!(bot.owners, vec![Snowflake(42), Snowflake(43)]);
        assert_eq!(bot.cache_settings().message_limit, 50);
        assert_eq!(bot.permissions.roles[&Snowflake(77)], vec!["ban"]);
        assert_eq!(bot.templates.unknown_command, "what is {cmd}?");
        // Unset templates keep their defaults.
        assert!(bot.templates.too_few.contains("{cmd}"));

        let settings = bot.settings(&config.interaction);
        assert!(settings.owners.contains(&Snowflake(42)));
        assert_eq!(settings.paginate_timeout, None);
    }

    #[test]
    fn explicit_file_wins_over_search_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE_NAME, "[logging]\nlevel = \"debug\"\n");
        let explicit = write(dir.path(), "override.toml", "[logging]\nlevel = \"warn\"\n");

        let config = assert_ok!(
            ConfigLoader::new()
                .search_path(dir.path())
                .file(&explicit)
                .without_env()
                .load()
        );
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE_NAME, "[interaction]\npaginate_timeout = 30\n");

        figment::Jail::expect_with(|jail| {
            jail.set_env("KASUMI_INTERACTION__PAGINATE_TIMEOUT", "5");
            let config = ConfigLoader::new().search_path(dir.path()).load().unwrap();
            assert_eq!(config.interaction.paginate_timeout, 5);
            Ok(())
        });
    }

    #[test]
    fn bad_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            ConfigLoader::new().file(&missing).without_env().load(),
            Err(ConfigError::FileNotFound(_))
        ));

        let yaml = write(dir.path(), "kasumi.yaml", "logging: {}\n");
        assert!(matches!(
            ConfigLoader::new().file(&yaml).without_env().load(),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let broken = write(dir.path(), "broken.toml", "[logging]\nlevel = \"loud\"\n");
        assert_err!(ConfigLoader::new().file(&broken).without_env().load());
    }
}
