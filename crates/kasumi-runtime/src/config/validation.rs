//! Checks that go beyond what the schema types enforce.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, KasumiConfig};

/// Validates the whole configuration.
pub fn validate_config(config: &KasumiConfig) -> ConfigResult<()> {
    for (name, bot) in &config.bots {
        validate_bot(name, bot)?;
    }
    Ok(())
}

fn validate_bot(name: &str, bot: &BotConfig) -> ConfigResult<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::invalid("bot names must not be empty"));
    }
    if bot.prefixes.is_empty() {
        return Err(ConfigError::invalid(format!("bot '{name}' has no prefixes")));
    }
    if bot.prefixes.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::invalid(format!(
            "bot '{name}' has a blank prefix"
        )));
    }
    if bot.message_cache_size == 0 {
        return Err(ConfigError::invalid(format!(
            "bot '{name}': message_cache_size must be greater than 0"
        )));
    }
    let grants = bot.permissions.users.values().chain(bot.permissions.roles.values());
    if grants.flatten().any(|flag| flag.trim().is_empty()) {
        return Err(ConfigError::invalid(format!(
            "bot '{name}' grants a blank permission"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasumi_core::Snowflake;
    use tokio_test::{assert_err, assert_ok};

    fn with_bot(bot: BotConfig) -> KasumiConfig {
        let mut config = KasumiConfig::default();
        config.bots.insert("main".into(), bot);
        config
    }

    #[test]
    fn default_bot_is_valid() {
        assert_ok!(validate_config(&with_bot(BotConfig::default())));
    }

    #[test]
    fn rejects_unusable_bots() {
        let no_prefix = BotConfig {
            prefixes: Vec::new(),
            ..BotConfig::default()
        };
        assert_err!(validate_config(&with_bot(no_prefix)));

        let blank_prefix = BotConfig {
            prefixes: vec!["  ".into()],
            ..BotConfig::default()
        };
        assert_err!(validate_config(&with_bot(blank_prefix)));

        let no_cache = BotConfig {
            message_cache_size: 0,
            ..BotConfig::default()
        };
        assert_err!(validate_config(&with_bot(no_cache)));

        let mut blank_grant = BotConfig::default();
        blank_grant.permissions.users.insert(Snowflake(1), vec![String::new()]);
        assert_err!(validate_config(&with_bot(blank_grant)));
    }
}
