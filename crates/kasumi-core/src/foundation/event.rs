//! Event trait and the declarative filter engine.
//!
//! Every event type declares a [`FilterTable`]: a set of named *dimensions*,
//! each owning one or more [`Rule`]s. Callers subscribe with a [`Filter`], a
//! mapping from dimension name to an expected [`FilterValue`].
//!
//! Matching is a pure function of the event and the filter:
//!
//! - a dimension absent from the filter is satisfied;
//! - a dimension present in the filter is satisfied when **any** of its rules
//!   accepts the expected value and its comparator holds;
//! - the filter matches when **all** of its dimensions are satisfied.
//!
//! # Example
//!
//! ```rust,ignore
//! use kasumi_core::{Accept, Cmp, Event, Filter, FilterTable, FilterValue};
//!
//! struct Ping {
//!     channel: Snowflake,
//!     text: String,
//! }
//!
//! impl Event for Ping {
//!     const NAME: &'static str = "ping";
//!
//!     fn filter_table() -> FilterTable<Self> {
//!         FilterTable::new()
//!             .rule("channel", Accept::IdLike, |e: &Ping| Some(e.channel.into()), Cmp::Eq)
//!             .rule("text", Accept::Kind(ValueKind::Text), |e: &Ping| Some(e.text.as_str().into()), Cmp::Eq)
//!             .rule("text", Accept::Kind(ValueKind::Pattern), |e: &Ping| Some(e.text.as_str().into()), Cmp::Case)
//!     }
//! }
//!
//! let table = Ping::filter_table();
//! let filter = Filter::new().with("text", FilterValue::pattern("^pi")?);
//! assert!(table.matches(&ping, &filter));
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::snowflake::{Snowflake, ToId};

// ============================================================================
// Event Trait
// ============================================================================

/// A typed event that can be published on the event bus.
pub trait Event: Send + Sync + Sized + 'static {
    /// Human-readable event name, used in logs and spans.
    const NAME: &'static str;

    /// Builds this event type's complete rule table.
    ///
    /// Called once when the event's dispatcher is created. Types without any
    /// filterable dimension keep the default empty table.
    fn filter_table() -> FilterTable<Self> {
        FilterTable::new()
    }
}

// ============================================================================
// Filter Values
// ============================================================================

/// The type tag of a [`FilterValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Id,
    Text,
    Symbol,
    Int,
    Bool,
    Pattern,
    Class,
}

impl ValueKind {
    /// Returns the tag name, as matched by [`FilterValue::Class`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Text => "Text",
            Self::Symbol => "Symbol",
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::Pattern => "Pattern",
            Self::Class => "Class",
        }
    }
}

/// A value compared by the filter engine.
///
/// Used both for what an event exposes on a dimension and for what a filter
/// expects on it.
#[derive(Debug, Clone)]
pub enum FilterValue {
    /// An entity id, or anything that stands for one.
    Id(Snowflake),
    /// Free text.
    Text(String),
    /// A symbolic name such as `"command"` or `"online"`.
    Symbol(Cow<'static, str>),
    Int(i64),
    Bool(bool),
    /// A regular expression, matched against text with [`Cmp::Case`].
    Pattern(Regex),
    /// A class tag naming an error or value type.
    Class(Cow<'static, str>),
}

impl FilterValue {
    /// Builds an id value from an id or entity handle.
    pub fn id(value: impl ToId) -> Self {
        Self::Id(value.to_id())
    }

    /// Builds a symbol value.
    pub fn symbol(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Symbol(name.into())
    }

    /// Builds a class tag.
    pub fn class(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Class(name.into())
    }

    /// Compiles a pattern value.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    /// Returns the value's type tag.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Id(_) => ValueKind::Id,
            Self::Text(_) => ValueKind::Text,
            Self::Symbol(_) => ValueKind::Symbol,
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Pattern(_) => ValueKind::Pattern,
            Self::Class(_) => ValueKind::Class,
        }
    }

    /// Returns the id if this is an id value.
    pub fn as_id(&self) -> Option<Snowflake> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the text of a text or symbol value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Symbol(s) | Self::Class(s) => Some(s),
            _ => None,
        }
    }

    /// Case equality: does `self`, used as a pattern, describe `other`?
    ///
    /// Patterns match text, class tags match values of that kind, and
    /// everything else falls back to plain equality.
    pub fn case_eq(&self, other: &FilterValue) -> bool {
        match (self, other) {
            (Self::Pattern(re), Self::Text(_) | Self::Symbol(_)) => {
                other.as_str().is_some_and(|s| re.is_match(s))
            }
            (Self::Class(name), Self::Class(other_name)) => name == other_name,
            (Self::Class(name), value) => name == value.kind().name(),
            _ => self == other,
        }
    }
}

impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Id(a), Self::Id(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            (Self::Class(a), Self::Class(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Snowflake> for FilterValue {
    fn from(id: Snowflake) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for FilterValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Regex> for FilterValue {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Which expected values a rule is willing to evaluate.
#[derive(Debug, Clone)]
pub enum Accept {
    /// Every value.
    Any,
    /// Every value. Kept distinct from `Any` for readability of tables.
    All,
    /// Values that stand for an entity id.
    IdLike,
    /// Values of one specific kind.
    Kind(ValueKind),
    /// Values accepted by any of the listed matchers.
    OneOf(Vec<Accept>),
}

impl Accept {
    /// Returns whether this matcher accepts `value`.
    pub fn accepts(&self, value: &FilterValue) -> bool {
        match self {
            Self::Any | Self::All => true,
            Self::IdLike => matches!(value, FilterValue::Id(_)),
            Self::Kind(kind) => value.kind() == *kind,
            Self::OneOf(options) => options.iter().any(|a| a.accepts(value)),
        }
    }
}

/// Predicate comparator: `(field value, expected value) -> matched`.
pub type PredicateFn = Arc<dyn Fn(Option<&FilterValue>, &FilterValue) -> bool + Send + Sync>;

/// How an extracted field is compared with the expected value.
#[derive(Clone)]
pub enum Cmp {
    /// Field equals expected.
    Eq,
    /// Field differs from expected. An absent field differs from everything.
    Ne,
    /// Expected describes field, see [`FilterValue::case_eq`].
    Case,
    /// Arbitrary predicate.
    Predicate(PredicateFn),
}

impl Cmp {
    /// Wraps a closure as a predicate comparator.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(Option<&FilterValue>, &FilterValue) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    fn compare(&self, field: Option<&FilterValue>, expected: &FilterValue) -> bool {
        match self {
            Self::Eq => field == Some(expected),
            Self::Ne => field != Some(expected),
            Self::Case => field.is_some_and(|value| expected.case_eq(value)),
            Self::Predicate(f) => f(field, expected),
        }
    }
}

impl fmt::Debug for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => f.write_str("Eq"),
            Self::Ne => f.write_str("Ne"),
            Self::Case => f.write_str("Case"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Typed field accessor for one dimension.
///
/// Chained lookups short-circuit through `?`: an accessor such as
/// `|e| Some(e.channel.server_id()?.into())` yields absent when the channel
/// has no server.
pub type FieldFn<E> = Arc<dyn Fn(&E) -> Option<FilterValue> + Send + Sync>;

/// One match rule of a dimension.
pub struct Rule<E> {
    accept: Accept,
    field: FieldFn<E>,
    cmp: Cmp,
}

impl<E> Rule<E> {
    /// Creates a rule.
    pub fn new<F>(accept: Accept, field: F, cmp: Cmp) -> Self
    where
        F: Fn(&E) -> Option<FilterValue> + Send + Sync + 'static,
    {
        Self {
            accept,
            field: Arc::new(field),
            cmp,
        }
    }

    /// Evaluates this rule for one event and expected value.
    pub fn matches(&self, event: &E, expected: &FilterValue) -> bool {
        self.accept.accepts(expected) && self.cmp.compare((self.field)(event).as_ref(), expected)
    }
}

impl<E> Clone for Rule<E> {
    fn clone(&self) -> Self {
        Self {
            accept: self.accept.clone(),
            field: Arc::clone(&self.field),
            cmp: self.cmp.clone(),
        }
    }
}

impl<E> fmt::Debug for Rule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("accept", &self.accept)
            .field("cmp", &self.cmp)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Filter Table
// ============================================================================

/// The complete rule table of one event type.
pub struct FilterTable<E> {
    dimensions: Vec<(&'static str, Vec<Rule<E>>)>,
}

impl<E> FilterTable<E> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    /// Adds a rule to `dimension`, creating the dimension if needed.
    pub fn rule<F>(self, dimension: &'static str, accept: Accept, field: F, cmp: Cmp) -> Self
    where
        F: Fn(&E) -> Option<FilterValue> + Send + Sync + 'static,
    {
        self.push(dimension, Rule::new(accept, field, cmp))
    }

    /// Adds an already-built rule to `dimension`.
    pub fn push(mut self, dimension: &'static str, rule: Rule<E>) -> Self {
        match self.dimensions.iter_mut().find(|(name, _)| *name == dimension) {
            Some((_, rules)) => rules.push(rule),
            None => self.dimensions.push((dimension, vec![rule])),
        }
        self
    }

    /// Appends every rule of `other` into this table.
    pub fn merge(self, other: FilterTable<E>) -> Self {
        other
            .dimensions
            .into_iter()
            .flat_map(|(name, rules)| rules.into_iter().map(move |rule| (name, rule)))
            .fold(self, |table, (name, rule)| table.push(name, rule))
    }

    /// Returns whether the table declares `dimension`.
    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.dimensions.iter().any(|(name, _)| *name == dimension)
    }

    /// Iterates over the declared dimension names.
    pub fn dimensions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dimensions.iter().map(|(name, _)| *name)
    }

    /// Returns whether `event` satisfies `filter`.
    pub fn matches(&self, event: &E, filter: &Filter) -> bool {
        self.dimensions.iter().all(|(name, rules)| match filter.get(name) {
            None => true,
            Some(expected) => rules.iter().any(|rule| rule.matches(event, expected)),
        })
    }
}

impl<E> Default for FilterTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for FilterTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.dimensions.iter().map(|(name, rules)| (name, rules.len())))
            .finish()
    }
}

// ============================================================================
// Filter Criteria
// ============================================================================

/// Caller-supplied filter criteria: dimension name to expected value.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    criteria: BTreeMap<String, FilterValue>,
}

impl Filter {
    /// A filter that matches every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a criterion.
    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.criteria.insert(dimension.into(), value.into());
        self
    }

    /// Returns the expected value for `dimension`.
    pub fn get(&self, dimension: &str) -> Option<&FilterValue> {
        self.criteria.get(dimension)
    }

    /// Iterates over the criteria's dimension names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.criteria.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        kind: &'static str,
        class: &'static str,
        channel: Option<Snowflake>,
        text: String,
    }

    impl Event for Sample {
        const NAME: &'static str = "sample";

        fn filter_table() -> FilterTable<Self> {
            FilterTable::new()
                .rule("any", Accept::Any, |_: &Sample| None, Cmp::predicate(|_, _| true))
                .rule(
                    "type",
                    Accept::Kind(ValueKind::Class),
                    |e: &Sample| Some(FilterValue::class(e.class)),
                    Cmp::predicate(|field, expected| {
                        expected.as_str() == Some("Exception") || field == Some(expected)
                    }),
                )
                .rule(
                    "type",
                    Accept::Kind(ValueKind::Symbol),
                    |e: &Sample| Some(FilterValue::symbol(e.kind)),
                    Cmp::Eq,
                )
                .rule("channel", Accept::IdLike, |e: &Sample| e.channel.map(Into::into), Cmp::Eq)
                .rule(
                    "text",
                    Accept::Kind(ValueKind::Text),
                    |e: &Sample| Some(e.text.as_str().into()),
                    Cmp::Eq,
                )
                .rule(
                    "text",
                    Accept::Kind(ValueKind::Pattern),
                    |e: &Sample| Some(e.text.as_str().into()),
                    Cmp::Case,
                )
                .rule(
                    "not_text",
                    Accept::Kind(ValueKind::Text),
                    |e: &Sample| Some(e.text.as_str().into()),
                    Cmp::Ne,
                )
        }
    }

    fn sample() -> Sample {
        Sample {
            kind: "command",
            class: "CommandError",
            channel: Some(Snowflake(7)),
            text: "hello there".into(),
        }
    }

    #[test]
    fn empty_filter_matches() {
        assert!(Sample::filter_table().matches(&sample(), &Filter::new()));
    }

    #[test]
    fn match_any_dimension_accepts_every_value() {
        let table = Sample::filter_table();
        for value in [
            FilterValue::Int(3),
            FilterValue::from("x"),
            FilterValue::Bool(false),
            FilterValue::id(Snowflake(1)),
        ] {
            assert!(table.matches(&sample(), &Filter::new().with("any", value)));
        }
    }

    #[test]
    fn rules_within_a_dimension_are_or_combined() {
        let table = Sample::filter_table();
        let by_class = Filter::new().with("type", FilterValue::class("Exception"));
        let by_symbol = Filter::new().with("type", FilterValue::symbol("command"));
        let wrong_symbol = Filter::new().with("type", FilterValue::symbol("event"));
        let wrong_kind = Filter::new().with("type", 3i64);

        assert!(table.matches(&sample(), &by_class));
        assert!(table.matches(&sample(), &by_symbol));
        assert!(!table.matches(&sample(), &wrong_symbol));
        assert!(!table.matches(&sample(), &wrong_kind));
    }

    #[test]
    fn dimensions_are_and_combined() {
        let table = Sample::filter_table();
        let both = Filter::new()
            .with("channel", Snowflake(7))
            .with("text", "hello there");
        let one_wrong = Filter::new()
            .with("channel", Snowflake(8))
            .with("text", "hello there");

        assert!(table.matches(&sample(), &both));
        assert!(!table.matches(&sample(), &one_wrong));
    }

    #[test]
    fn absent_field_short_circuits() {
        let table = Sample::filter_table();
        let event = Sample {
            channel: None,
            ..sample()
        };
        assert!(!table.matches(&event, &Filter::new().with("channel", Snowflake(7))));
    }

    #[test]
    fn comparators() {
        let table = Sample::filter_table();
        let pattern = FilterValue::pattern("^hel+o").unwrap();
        assert!(table.matches(&sample(), &Filter::new().with("text", pattern)));
        assert!(table.matches(&sample(), &Filter::new().with("not_text", "bye")));
        assert!(!table.matches(&sample(), &Filter::new().with("not_text", "hello there")));
    }

    #[test]
    fn merge_appends_rules() {
        let extra = FilterTable::new().rule(
            "channel",
            Accept::Kind(ValueKind::Int),
            |e: &Sample| e.channel.map(|c| FilterValue::Int(c.get() as i64)),
            Cmp::Eq,
        );
        let table = Sample::filter_table().merge(extra);
        assert!(table.matches(&sample(), &Filter::new().with("channel", 7i64)));
        assert!(table.matches(&sample(), &Filter::new().with("channel", Snowflake(7))));
        assert_eq!(table.dimensions().filter(|d| *d == "channel").count(), 1);
    }
}
