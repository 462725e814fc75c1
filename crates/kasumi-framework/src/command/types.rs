//! Typed argument coercion.
//!
//! A command may declare one [`ArgType`] per position. Tokens past the last
//! declared position reuse the last type, and a [`ArgType::Union`] tries its
//! alternatives in order, keeping the first that parses.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use kasumi_core::{BotCache, Emoji, Member, Role, Server, Snowflake, User};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::{CoerceError, CoerceResult, SyntaxError};

// =============================================================================
// Argument Types
// =============================================================================

/// A user-supplied coercion.
pub trait FromArgument: Send + Sync + 'static {
    fn from_argument(&self, token: &str) -> CoerceResult<Arg>;
}

impl<F> FromArgument for F
where
    F: Fn(&str) -> CoerceResult<Arg> + Send + Sync + 'static,
{
    fn from_argument(&self, token: &str) -> CoerceResult<Arg> {
        self(token)
    }
}

/// The declared type of one argument position.
#[derive(Clone)]
pub enum ArgType {
    /// The token unchanged.
    String,
    Symbol,
    /// Decimal, or `0x`/`0o`/`0b` prefixed; `_` separators allowed.
    Integer,
    /// A finite float.
    Float,
    /// `n/d`, a decimal fraction, or an integer.
    Rational,
    /// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD`.
    Time,
    /// `true`/`yes`/`on` or `false`/`no`/`off`, case-insensitive.
    Bool,
    /// A case-insensitive regular expression.
    Regex,
    /// Always the empty value.
    Nil,
    /// YAML (or JSON) data; a leading `yaml`/`yml` fence line is skipped.
    Data,
    /// A user mention or id, resolved through the cache.
    User,
    /// A member of the invoking server.
    Member,
    /// A role of the invoking server.
    Role,
    /// A custom emoji mention.
    Emoji,
    /// An invite code or invite link.
    Invite,
    /// Ordered alternatives; the first that parses wins.
    Union(Vec<ArgType>),
    Custom(Arc<dyn FromArgument>),
}

impl ArgType {
    pub fn union(alternatives: impl IntoIterator<Item = ArgType>) -> Self {
        Self::Union(alternatives.into_iter().collect())
    }

    pub fn custom(coerce: impl FromArgument) -> Self {
        Self::Custom(Arc::new(coerce))
    }

    /// Converts `token` into this type.
    pub fn coerce<'a>(
        &'a self,
        token: &'a str,
        ctx: &'a CoerceContext<'a>,
    ) -> BoxFuture<'a, CoerceResult<Arg>> {
        async move {
            match self {
                Self::String => Ok(Arg::String(token.to_owned())),
                Self::Symbol => Ok(Arg::Symbol(token.to_owned())),
                Self::Integer => parse_integer(token).map(Arg::Integer),
                Self::Float => parse_float(token).map(Arg::Float),
                Self::Rational => token.parse().map(Arg::Rational),
                Self::Time => parse_time(token).map(Arg::Time),
                Self::Bool => parse_bool(token).map(Arg::Bool),
                Self::Regex => RegexBuilder::new(token)
                    .case_insensitive(true)
                    .build()
                    .map(Arg::Regex)
                    .map_err(|e| CoerceError::new(e.to_string())),
                Self::Nil => Ok(Arg::Nil),
                Self::Data => parse_data(token).map(Arg::Data),
                Self::User => ctx.user(token).await.map(Arg::User),
                Self::Member => ctx.member(token).await.map(Arg::Member),
                Self::Role => ctx.role(token).map(Arg::Role),
                Self::Emoji => Emoji::parse_mention(token)
                    .map(Arg::Emoji)
                    .ok_or_else(|| CoerceError::new("not an emoji")),
                Self::Invite => parse_invite(token).map(|code| Arg::Invite(code.to_owned())),
                Self::Union(alternatives) => {
                    for alternative in alternatives {
                        if let Ok(value) = alternative.coerce(token, ctx).await {
                            return Ok(value);
                        }
                    }
                    Err(CoerceError::new("no alternative matched"))
                }
                Self::Custom(coerce) => coerce.from_argument(token),
            }
        }
        .boxed()
    }
}

impl fmt::Debug for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Symbol => f.write_str("Symbol"),
            Self::Integer => f.write_str("Integer"),
            Self::Float => f.write_str("Float"),
            Self::Rational => f.write_str("Rational"),
            Self::Time => f.write_str("Time"),
            Self::Bool => f.write_str("Bool"),
            Self::Regex => f.write_str("Regex"),
            Self::Nil => f.write_str("Nil"),
            Self::Data => f.write_str("Data"),
            Self::User => f.write_str("User"),
            Self::Member => f.write_str("Member"),
            Self::Role => f.write_str("Role"),
            Self::Emoji => f.write_str("Emoji"),
            Self::Invite => f.write_str("Invite"),
            Self::Union(alternatives) => f.debug_tuple("Union").field(alternatives).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// =============================================================================
// Coerced Values
// =============================================================================

/// A coerced argument.
#[derive(Clone)]
pub enum Arg {
    Nil,
    String(String),
    Symbol(String),
    Integer(i64),
    Float(f64),
    Rational(Ratio),
    Time(DateTime<Utc>),
    Bool(bool),
    Regex(Regex),
    Data(Value),
    User(Arc<User>),
    Member(Arc<Member>),
    Role(Arc<Role>),
    Emoji(Emoji),
    Invite(String),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Arg {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(Arc::new(value))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Symbol(s) => f.debug_tuple("Symbol").field(s).finish(),
            Self::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::Rational(r) => f.debug_tuple("Rational").field(r).finish(),
            Self::Time(t) => f.debug_tuple("Time").field(t).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Self::User(u) => f.debug_tuple("User").field(&u.username()).finish(),
            Self::Member(m) => f.debug_tuple("Member").field(&m.user_id()).finish(),
            Self::Role(r) => f.debug_tuple("Role").field(&r.name()).finish(),
            Self::Emoji(e) => f.debug_tuple("Emoji").field(e).finish(),
            Self::Invite(code) => f.debug_tuple("Invite").field(code).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The validated arguments of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Arg>,
    raw: Vec<String>,
}

impl Args {
    pub fn new(values: Vec<Arg>, raw: Vec<String>) -> Self {
        Self { values, raw }
    }

    /// Untyped arguments: every token as a string.
    pub fn untyped(raw: Vec<String>) -> Self {
        let values = raw.iter().cloned().map(Arg::String).collect();
        Self { values, raw }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.values.iter()
    }

    /// The tokens as they were before coercion.
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        match self.get(index)? {
            Arg::String(s) | Arg::Symbol(s) | Arg::Invite(s) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, index: usize) -> Option<i64> {
        match self.get(index)? {
            Arg::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn float(&self, index: usize) -> Option<f64> {
        match self.get(index)? {
            Arg::Float(n) => Some(*n),
            Arg::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn bool(&self, index: usize) -> Option<bool> {
        match self.get(index)? {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn user(&self, index: usize) -> Option<&Arc<User>> {
        match self.get(index)? {
            Arg::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn member(&self, index: usize) -> Option<&Arc<Member>> {
        match self.get(index)? {
            Arg::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn role(&self, index: usize) -> Option<&Arc<Role>> {
        match self.get(index)? {
            Arg::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn data(&self, index: usize) -> Option<&Value> {
        match self.get(index)? {
            Arg::Data(v) => Some(v),
            _ => None,
        }
    }

    /// Downcasts a value produced by a custom coercer.
    pub fn custom<T: Any + Send + Sync>(&self, index: usize) -> Option<&T> {
        match self.get(index)? {
            Arg::Custom(value) => value.downcast_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// What entity coercions resolve against.
pub struct CoerceContext<'a> {
    pub cache: &'a BotCache,
    /// The server the command was invoked in; `None` in private channels.
    pub server: Option<Arc<Server>>,
}

impl CoerceContext<'_> {
    async fn user(&self, token: &str) -> CoerceResult<Arc<User>> {
        let id = Snowflake::parse_mention(token, &["@!", "@"])
            .ok_or_else(|| CoerceError::new("not a user mention"))?;
        self.cache
            .get_user(id, false)
            .await
            .map_err(|e| CoerceError::new(e.to_string()))?
            .ok_or_else(|| CoerceError::new("unknown user"))
    }

    async fn member(&self, token: &str) -> CoerceResult<Arc<Member>> {
        let server = self.server()?;
        let id = Snowflake::parse_mention(token, &["@!", "@"])
            .ok_or_else(|| CoerceError::new("not a member mention"))?;
        self.cache
            .get_member(server, id, false)
            .await
            .map_err(|e| CoerceError::new(e.to_string()))?
            .ok_or_else(|| CoerceError::new("unknown member"))
    }

    fn role(&self, token: &str) -> CoerceResult<Arc<Role>> {
        let server = self.server()?;
        let id = Snowflake::parse_mention(token, &["@&"])
            .ok_or_else(|| CoerceError::new("not a role mention"))?;
        self.cache
            .get_role(server, id)
            .ok_or_else(|| CoerceError::new("unknown role"))
    }

    fn server(&self) -> CoerceResult<&Server> {
        self.server
            .as_deref()
            .ok_or_else(|| CoerceError::new("not in a server"))
    }
}

/// Coerces every token per `types`.
///
/// Position `i` uses `types[i]`, or the last type when `i` is past the end.
/// Without any declared type every token stays a string.
pub async fn coerce_all(
    tokens: Vec<String>,
    types: &[ArgType],
    ctx: &CoerceContext<'_>,
) -> Result<Args, SyntaxError> {
    let Some(last) = types.last() else {
        return Ok(Args::untyped(tokens));
    };
    let mut values = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let ty = types.get(i).unwrap_or(last);
        match ty.coerce(token, ctx).await {
            Ok(value) => values.push(value),
            Err(_) => return Err(SyntaxError::ArgParse { index: i + 1 }),
        }
    }
    Ok(Args::new(values, tokens))
}

// ─── Scalar parsers ───

fn parse_integer(token: &str) -> CoerceResult<i64> {
    let invalid = || CoerceError::new(format!("invalid integer '{token}'"));
    let (negative, body) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let lower = body.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match lower.as_deref() {
        Some("0x") => (16, &body[2..]),
        Some("0o") => (8, &body[2..]),
        Some("0b") => (2, &body[2..]),
        _ => (10, body),
    };
    // The sign was taken above; `from_str_radix` would accept a second one.
    if digits.is_empty()
        || digits.starts_with(['+', '-', '_'])
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    let magnitude = i128::from(u64::from_str_radix(&cleaned, radix).map_err(|_| invalid())?);
    i64::try_from(if negative { -magnitude } else { magnitude }).map_err(|_| invalid())
}

fn parse_float(token: &str) -> CoerceResult<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| CoerceError::new(format!("invalid float '{token}'")))
}

fn parse_time(token: &str) -> CoerceResult<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(token) {
        return Ok(time.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(token, format) {
            return Ok(time.and_utc());
        }
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc())
        .ok_or_else(|| CoerceError::new(format!("invalid time '{token}'")))
}

fn parse_bool(token: &str) -> CoerceResult<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(CoerceError::new(format!("invalid boolean '{token}'"))),
    }
}

fn parse_data(token: &str) -> CoerceResult<Value> {
    let body = token
        .strip_prefix("yaml\n")
        .or_else(|| token.strip_prefix("yml\n"))
        .unwrap_or(token);
    serde_yaml::from_str(body).map_err(|e| CoerceError::new(e.to_string()))
}

fn parse_invite(token: &str) -> CoerceResult<&str> {
    let trimmed = token.trim_end_matches('/');
    let code = trimmed
        .rsplit_once('/')
        .filter(|(host, _)| host.contains("discord.gg") || host.ends_with("/invite"))
        .map_or(trimmed, |(_, code)| code);
    let valid = !code.is_empty()
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(code)
    } else {
        Err(CoerceError::new(format!("invalid invite '{token}'")))
    }
}

// =============================================================================
// Rational
// =============================================================================

/// An exact fraction in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    numer: i64,
    denom: i64,
}

impl Ratio {
    /// Builds a reduced fraction. Returns `None` for a zero denominator or
    /// when the reduced fraction does not fit in `i64`.
    pub fn new(numer: i64, denom: i64) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let divisor = i128::from(gcd(numer.unsigned_abs(), denom.unsigned_abs()).max(1));
        let sign = if denom < 0 { -1 } else { 1 };
        Some(Self {
            numer: i64::try_from(sign * i128::from(numer) / divisor).ok()?,
            denom: i64::try_from(sign * i128::from(denom) / divisor).ok()?,
        })
    }

    pub fn numer(&self) -> i64 {
        self.numer
    }

    pub fn denom(&self) -> i64 {
        self.denom
    }

    pub fn to_f64(self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

impl std::str::FromStr for Ratio {
    type Err = CoerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoerceError::new(format!("invalid rational '{s}'"));
        if let Some((n, d)) = s.split_once('/') {
            let n = n.trim().parse().map_err(|_| invalid())?;
            let d = d.trim().parse().map_err(|_| invalid())?;
            return Self::new(n, d).ok_or_else(invalid);
        }
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let denom = 10i64.checked_pow(frac.len() as u32).ok_or_else(invalid)?;
        let digits = format!("{whole}{frac}");
        let numer = digits.parse().map_err(|_| invalid())?;
        Self::new(numer, denom).ok_or_else(invalid)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasumi_core::testing::{MockApi, member_json, server_json, user_json};
    use kasumi_core::{CacheSettings, RoleData, ServerData};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn cache() -> (Arc<MockApi>, BotCache) {
        let api = Arc::new(MockApi::new());
        let cache = BotCache::new(api.clone(), CacheSettings::default());
        (api, cache)
    }

    async fn coerce(ty: ArgType, token: &str) -> CoerceResult<Arg> {
        let (_, cache) = cache();
        let ctx = CoerceContext { cache: &cache, server: None };
        ty.coerce(token, &ctx).await
    }

    #[test]
    fn integers() {
        assert_eq!(assert_ok!(parse_integer("42")), 42);
        assert_eq!(assert_ok!(parse_integer("-0x1F")), -31);
        assert_eq!(assert_ok!(parse_integer("0b1010")), 10);
        assert_eq!(assert_ok!(parse_integer("0o17")), 15);
        assert_eq!(assert_ok!(parse_integer("1_000_000")), 1_000_000);
        assert_err!(parse_integer("1__0"));
        assert_err!(parse_integer("_1"));
        assert_err!(parse_integer("0x"));
        assert_err!(parse_integer("12ab"));
        assert_eq!(assert_ok!(parse_integer("-9223372036854775808")), i64::MIN);
        assert_err!(parse_integer("9223372036854775808"));
        assert_err!(parse_integer("--9223372036854775808"));
        assert_err!(parse_integer("--5"));
        assert_err!(parse_integer("+-5"));
        assert_err!(parse_integer("0x-5"));
    }

    #[test]
    fn rationals_reduce() {
        assert_eq!(assert_ok!("6/8".parse::<Ratio>()), Ratio { numer: 3, denom: 4 });
        assert_eq!(assert_ok!("1.25".parse::<Ratio>()), Ratio { numer: 5, denom: 4 });
        assert_eq!(assert_ok!("3/-6".parse::<Ratio>()), Ratio { numer: -1, denom: 2 });
        assert_eq!(assert_ok!("7".parse::<Ratio>()).to_string(), "7/1");
        assert_err!("1/0".parse::<Ratio>());
        assert_err!("-9223372036854775808/-1".parse::<Ratio>());
        assert_eq!(
            assert_ok!("2/-9223372036854775808".parse::<Ratio>()),
            Ratio { numer: -1, denom: 1 << 62 }
        );
        assert_err!("1/-9223372036854775808".parse::<Ratio>());
    }

    #[tokio::test]
    async fn overflowing_tokens_report_their_position() {
        let (_, cache) = cache();
        let ctx = CoerceContext { cache: &cache, server: None };
        let tokens = vec!["1".to_owned(), "--9223372036854775808".to_owned()];
        let err = assert_err!(coerce_all(tokens, &[ArgType::Integer], &ctx).await);
        assert_eq!(err, SyntaxError::ArgParse { index: 2 });

        let tokens = vec!["-9223372036854775808/-1".to_owned()];
        let err = assert_err!(coerce_all(tokens, &[ArgType::Rational], &ctx).await);
        assert_eq!(err, SyntaxError::ArgParse { index: 1 });
    }

    #[test]
    fn scalars() {
        assert!(parse_float("inf").is_err());
        assert_eq!(assert_ok!(parse_float("1e3")), 1000.0);
        assert!(assert_ok!(parse_bool("YES")));
        assert!(!assert_ok!(parse_bool("off")));
        assert_err!(parse_bool("maybe"));
        assert_eq!(assert_ok!(parse_time("2024-02-29")).to_rfc3339(), "2024-02-29T00:00:00+00:00");
        assert_eq!(
            assert_ok!(parse_time("2024-02-29T10:00:00+02:00")).to_rfc3339(),
            "2024-02-29T08:00:00+00:00"
        );
        assert_eq!(assert_ok!(parse_invite("https://discord.gg/abc-123")), "abc-123");
        assert_eq!(assert_ok!(parse_invite("discord.com/invite/xyz")), "xyz");
        assert_eq!(assert_ok!(parse_invite("plain")), "plain");
        assert_err!(parse_invite("not a code"));
    }

    #[test]
    fn yaml_data() {
        assert_eq!(assert_ok!(parse_data("yaml\na: 1\nb: [x, y]")), json!({"a": 1, "b": ["x", "y"]}));
        assert_eq!(assert_ok!(parse_data(r#"{"k": true}"#)), json!({"k": true}));
    }

    #[tokio::test]
    async fn regex_is_case_insensitive() {
        let Arg::Regex(re) = assert_ok!(coerce(ArgType::Regex, "^kas").await) else {
            panic!("expected a regex");
        };
        assert!(re.is_match("KASUMI"));
        assert_err!(coerce(ArgType::Regex, "(unclosed").await);
    }

    #[tokio::test]
    async fn union_takes_first_alternative_that_parses() {
        let ty = ArgType::union([ArgType::Integer, ArgType::Bool, ArgType::String]);
        assert!(matches!(assert_ok!(coerce(ty.clone(), "0x10").await), Arg::Integer(16)));
        assert!(matches!(assert_ok!(coerce(ty.clone(), "on").await), Arg::Bool(true)));
        assert!(matches!(assert_ok!(coerce(ty, "word").await), Arg::String(s) if s == "word"));
    }

    #[tokio::test]
    async fn last_type_repeats() {
        let (_, cache) = cache();
        let ctx = CoerceContext { cache: &cache, server: None };
        let tokens: Vec<String> = ["x", "1", "2", "3"].map(String::from).into();
        let args = assert_ok!(coerce_all(tokens, &[ArgType::String, ArgType::Integer], &ctx).await);
        assert_eq!(args.str(0), Some("x"));
        assert_eq!((1..4).filter_map(|i| args.int(i)).sum::<i64>(), 6);

        let tokens: Vec<String> = ["x", "1", "two"].map(String::from).into();
        let err = assert_err!(coerce_all(tokens, &[ArgType::String, ArgType::Integer], &ctx).await);
        assert_eq!(err, SyntaxError::ArgParse { index: 3 });
    }

    #[tokio::test]
    async fn untyped_tokens_stay_strings() {
        let (_, cache) = cache();
        let ctx = CoerceContext { cache: &cache, server: None };
        let args = assert_ok!(coerce_all(vec!["a".into(), "1".into()], &[], &ctx).await);
        assert_eq!(args.str(1), Some("1"));
        assert_eq!(args.raw(), ["a", "1"]);
    }

    #[tokio::test]
    async fn nil_and_custom() {
        assert!(matches!(assert_ok!(coerce(ArgType::Nil, "anything").await), Arg::Nil));

        #[derive(Debug, PartialEq)]
        struct Dice(u8);
        let dice = ArgType::custom(|token: &str| {
            token
                .strip_prefix('d')
                .and_then(|n| n.parse().ok())
                .map(|n| Arg::custom(Dice(n)))
                .ok_or_else(|| CoerceError::new("not a die"))
        });
        let (_, cache) = cache();
        let ctx = CoerceContext { cache: &cache, server: None };
        let args = assert_ok!(coerce_all(vec!["d20".into()], &[dice.clone()], &ctx).await);
        assert_eq!(args.custom::<Dice>(0), Some(&Dice(20)));
        assert_err!(coerce_all(vec!["20".into()], &[dice], &ctx).await);
    }

    #[tokio::test]
    async fn entity_mentions_resolve_through_the_cache() {
        let (api, cache) = cache();
        api.insert_user(user_json(7, "aya"));
        api.insert_member(Snowflake(3), member_json(user_json(7, "aya"), &[]));
        let mut data: ServerData = serde_json::from_value(server_json(3, "shrine")).unwrap();
        data.roles.push(RoleData {
            id: Snowflake(30),
            name: "mod".into(),
            position: 1,
            mentionable: true,
        });
        let server = cache.put_server(data, false);

        let ctx = CoerceContext { cache: &cache, server: Some(server) };
        let user = assert_ok!(ArgType::User.coerce("<@!7>", &ctx).await);
        assert!(matches!(user, Arg::User(u) if u.username() == "aya"));
        let member = assert_ok!(ArgType::Member.coerce("<@7>", &ctx).await);
        assert!(matches!(member, Arg::Member(m) if m.user_id() == Snowflake(7)));
        let role = assert_ok!(ArgType::Role.coerce("<@&30>", &ctx).await);
        assert!(matches!(role, Arg::Role(r) if r.name() == "mod"));
        assert_err!(ArgType::Role.coerce("<@&31>", &ctx).await);
        assert_err!(ArgType::User.coerce("<@8>", &ctx).await);

        let private = CoerceContext { cache: &cache, server: None };
        assert_err!(ArgType::Member.coerce("<@7>", &private).await);
    }
}
