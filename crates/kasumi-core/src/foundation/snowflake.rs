//! Snowflake identifiers.
//!
//! Every remote entity is identified by a 64-bit snowflake. The wire format
//! carries them as decimal strings, but numeric forms are accepted too. The
//! upper 42 bits hold the creation time in milliseconds since the platform
//! epoch.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Platform epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
pub const EPOCH_MILLIS: i64 = 1_420_070_400_000;

/// A 64-bit entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Returns the raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the creation time embedded in the id.
    pub fn created_at(self) -> DateTime<Utc> {
        let millis = (self.0 >> 22) as i64 + EPOCH_MILLIS;
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Builds the smallest id that could have been created at `time`.
    ///
    /// Useful as a pagination bound for history queries.
    pub fn synthesize(time: DateTime<Utc>) -> Self {
        let millis = (time.timestamp_millis() - EPOCH_MILLIS).max(0) as u64;
        Self(millis << 22)
    }

    /// Parses a mention token such as `<@123>`, `<@!123>`, `<#123>`,
    /// `<@&123>` or `<:name:123>` with the given sigil, or a bare id.
    ///
    /// The sigil is the text between `<` and the id (for custom emoji, the
    /// name part is skipped automatically).
    pub fn parse_mention(token: &str, sigils: &[&str]) -> Option<Self> {
        if let Ok(id) = token.parse() {
            return Some(id);
        }
        let inner = token.strip_prefix('<')?.strip_suffix('>')?;
        sigils.iter().find_map(|sigil| {
            let rest = inner.strip_prefix(sigil)?;
            let id = rest.rsplit(':').next().unwrap_or(rest);
            id.parse().ok()
        })
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a snowflake id as a string or integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v)
                    .map(Snowflake)
                    .map_err(|_| E::custom("negative snowflake"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

// ─── ToId ───

/// Anything that can stand in for an entity id.
///
/// Filter criteria use this to accept either raw ids or entity handles.
pub trait ToId {
    /// Returns the id this value refers to.
    fn to_id(&self) -> Snowflake;
}

impl ToId for Snowflake {
    fn to_id(&self) -> Snowflake {
        *self
    }
}

impl ToId for u64 {
    fn to_id(&self) -> Snowflake {
        Snowflake(*self)
    }
}

impl<T: ToId + ?Sized> ToId for &T {
    fn to_id(&self) -> Snowflake {
        (**self).to_id()
    }
}

impl<T: ToId + ?Sized> ToId for std::sync::Arc<T> {
    fn to_id(&self) -> Snowflake {
        (**self).to_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_string_and_number() {
        let a: Snowflake = serde_json::from_str("\"175928847299117063\"").unwrap();
        let b: Snowflake = serde_json::from_str("175928847299117063").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"175928847299117063\"");
    }

    #[test]
    fn creation_time_round_trips_through_synthesize() {
        let id = Snowflake(175_928_847_299_117_063);
        let time = id.created_at();
        assert_eq!(time.timestamp_millis(), 1_462_015_105_796);
        assert_eq!(Snowflake::synthesize(time).created_at(), time);
    }

    #[test]
    fn parses_mentions() {
        assert_eq!(Snowflake::parse_mention("<@42>", &["@!", "@"]), Some(Snowflake(42)));
        assert_eq!(Snowflake::parse_mention("<@!42>", &["@!", "@"]), Some(Snowflake(42)));
        assert_eq!(Snowflake::parse_mention("42", &["#"]), Some(Snowflake(42)));
        assert_eq!(Snowflake::parse_mention("<:blob:99>", &[":", "a:"]), Some(Snowflake(99)));
        assert_eq!(Snowflake::parse_mention("<#42>", &["@"]), None);
        assert_eq!(Snowflake::parse_mention("nope", &["@"]), None);
    }
}
