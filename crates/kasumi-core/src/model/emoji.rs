use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::snowflake::Snowflake;

/// A reaction emoji: either a unicode character sequence or a custom emoji.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<Snowflake>,
    pub name: String,
    #[serde(default)]
    pub animated: bool,
}

impl Emoji {
    /// A unicode emoji.
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            animated: false,
        }
    }

    /// A custom emoji.
    pub fn custom(id: Snowflake, name: impl Into<String>, animated: bool) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            animated,
        }
    }

    /// Parses a custom emoji mention: `<:name:id>` or `<a:name:id>`.
    pub fn parse_mention(token: &str) -> Option<Self> {
        let inner = token.strip_prefix('<')?.strip_suffix('>')?;
        let (animated, rest) = match inner.strip_prefix("a:") {
            Some(rest) => (true, rest),
            None => (false, inner.strip_prefix(':')?),
        };
        let (name, id) = rest.split_once(':')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::custom(id.parse().ok()?, name, animated))
    }

    /// The key used by the reaction endpoints: the unicode text, or
    /// `name:id` for custom emoji.
    pub fn reaction_key(&self) -> String {
        match self.id {
            Some(id) => format!("{}:{id}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) if self.animated => write!(f, "<a:{}:{id}>", self.name),
            Some(id) => write!(f, "<:{}:{id}>", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_custom_mentions() {
        let e = Emoji::parse_mention("<:blob:42>").unwrap();
        assert_eq!(e, Emoji::custom(Snowflake(42), "blob", false));
        assert_eq!(e.reaction_key(), "blob:42");
        assert!(Emoji::parse_mention("<a:spin:7>").unwrap().animated);
        assert!(Emoji::parse_mention("<@42>").is_none());
        assert_eq!(Emoji::unicode("▶").to_string(), "▶");
    }
}
