//! Declaration model for the relation graph.
//!
//! Every declaration on a [`Query`](super::Query) becomes one immutable
//! [`Spec`]. Specs are validated when they are built and compiled later, in
//! a fixed order, by [`compile`](super::compile).

use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{RelqError, Result};
use crate::sql::{Combinator, CompareOp};
use crate::validate::{IdentifierKind, split_alias, validate_identifier};

use super::Query;

/// Ordered key column list. Most relations use one or two columns.
pub type KeyList = SmallVec<[CompactString; 2]>;

/// Refinement callback run against a fresh sub-query before it compiles.
pub type Refine = Arc<dyn Fn(&mut Query) -> Result<()> + Send + Sync>;

// =============================================================================
// Keys
// =============================================================================

/// Key argument accepted by [`Rel::new`].
///
/// A string is split on commas, so `"tenant_id, user_id"` names two columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keys(KeyList);

impl Keys {
    pub fn as_slice(&self) -> &[CompactString] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        Keys(
            parts
                .into_iter()
                .flat_map(|part| part.split(','))
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(CompactString::from)
                .collect(),
        )
    }
}

impl From<&str> for Keys {
    fn from(value: &str) -> Self {
        Keys::from_parts([value])
    }
}

impl From<String> for Keys {
    fn from(value: String) -> Self {
        Keys::from(value.as_str())
    }
}

impl From<&String> for Keys {
    fn from(value: &String) -> Self {
        Keys::from(value.as_str())
    }
}

impl<const N: usize> From<[&str; N]> for Keys {
    fn from(value: [&str; N]) -> Self {
        Keys::from_parts(value)
    }
}

impl From<&[&str]> for Keys {
    fn from(value: &[&str]) -> Self {
        Keys::from_parts(value.iter().copied())
    }
}

impl From<Vec<&str>> for Keys {
    fn from(value: Vec<&str>) -> Self {
        Keys::from_parts(value)
    }
}

impl From<Vec<String>> for Keys {
    fn from(value: Vec<String>) -> Self {
        Keys::from_parts(value.iter().map(String::as_str))
    }
}

// =============================================================================
// Rel: a declared edge
// =============================================================================

/// An edge from the current table to a target table.
///
/// ```
/// use relq_core::query::Rel;
///
/// let rel = Rel::new("orders as big_orders", "user_id", "id");
/// assert_eq!(rel.target(), "orders as big_orders");
/// ```
#[derive(Clone)]
pub struct Rel {
    target: String,
    foreign: Keys,
    local: Keys,
    refine: Option<Refine>,
}

impl Rel {
    /// `foreign` columns live on the target, `local` columns on the current
    /// table. Both lists pair up by position.
    pub fn new(target: impl Into<String>, foreign: impl Into<Keys>, local: impl Into<Keys>) -> Self {
        Self {
            target: target.into(),
            foreign: foreign.into(),
            local: local.into(),
            refine: None,
        }
    }

    /// Attaches a refinement callback.
    pub fn refine<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Query) -> Result<()> + Send + Sync + 'static,
    {
        self.refine = Some(Arc::new(callback));
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Validates the edge and resolves its alias mapping.
    pub(crate) fn into_link(self) -> Result<Link> {
        let (target, alias) = split_alias(&self.target);
        validate_identifier(target, IdentifierKind::Table)?;
        if let Some(alias) = alias {
            validate_identifier(alias, IdentifierKind::Table)?;
        }
        if self.foreign.is_empty() || self.local.is_empty() {
            return Err(RelqError::InvalidParameter(format!(
                "relation `{target}` needs at least one foreign and one local key"
            )));
        }
        if self.foreign.len() != self.local.len() {
            return Err(RelqError::KeyCountMismatch {
                relation: target.to_string(),
                foreign: self.foreign.len(),
                local: self.local.len(),
            });
        }
        for key in self.foreign.as_slice().iter().chain(self.local.as_slice()) {
            validate_identifier(key, IdentifierKind::Column)?;
        }
        Ok(Link {
            target: target.into(),
            alias: alias.map(CompactString::from),
            foreign: self.foreign.0,
            local: self.local.0,
            refine: self.refine,
        })
    }
}

impl fmt::Debug for Rel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rel")
            .field("target", &self.target)
            .field("foreign", &self.foreign)
            .field("local", &self.local)
            .field("refine", &self.refine.is_some())
            .finish()
    }
}

/// A validated edge shared by every spec kind.
#[derive(Clone)]
pub struct Link {
    pub target: CompactString,
    /// Explicit `as` alias, if any
    pub alias: Option<CompactString>,
    pub foreign: KeyList,
    pub local: KeyList,
    pub refine: Option<Refine>,
}

impl Link {
    /// The explicit alias, or the target name.
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.target)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("target", &self.target)
            .field("alias", &self.alias)
            .field("foreign", &self.foreign)
            .field("local", &self.local)
            .field("refine", &self.refine.is_some())
            .finish()
    }
}

// =============================================================================
// Spec kinds
// =============================================================================

/// Whether an eager-loaded relation yields one row or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelCardinality {
    /// Parent gets the first match or `null`
    One,
    /// Parent gets every match or `[]`
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Calculation expression, emitted without a wrapping function
    Calc,
}

impl AggregateKind {
    /// Suffix used for the default alias `{target}_{suffix}`.
    pub const fn suffix(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Avg => "avg",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Calc => "calc",
        }
    }

    pub(crate) const fn function(&self) -> Option<&'static str> {
        match self {
            AggregateKind::Count => Some("COUNT"),
            AggregateKind::Sum => Some("SUM"),
            AggregateKind::Avg => Some("AVG"),
            AggregateKind::Min => Some("MIN"),
            AggregateKind::Max => Some("MAX"),
            AggregateKind::Calc => None,
        }
    }
}

/// What an aggregate is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateColumn {
    /// `*`, only meaningful for counts
    Star,
    /// A validated column name
    Column(CompactString),
    /// A validated expression; bare columns get qualified at compile time
    Expression(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Exists,
    NotExists,
}

impl Polarity {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Polarity::Exists => "EXISTS",
            Polarity::NotExists => "NOT EXISTS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationSpec {
    pub link: Link,
    pub cardinality: RelCardinality,
    /// Key the loaded rows are stored under on each parent row
    pub alias: CompactString,
}

#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub link: Link,
    pub kind: AggregateKind,
    pub column: AggregateColumn,
    /// Result column name, also the lookup key for aggregate filters
    pub alias: CompactString,
}

impl AggregateSpec {
    pub fn is_expression(&self) -> bool {
        matches!(self.column, AggregateColumn::Expression(_))
    }
}

#[derive(Debug, Clone)]
pub struct ExistsSpec {
    pub link: Link,
    pub polarity: Polarity,
    pub combinator: Combinator,
}

#[derive(Debug, Clone)]
pub struct HasSpec {
    pub link: Link,
    pub op: CompareOp,
    pub count: u64,
    pub combinator: Combinator,
}

/// A WHERE condition over a previously declared aggregate.
#[derive(Debug, Clone)]
pub struct AggregateFilterSpec {
    /// The aggregate being filtered, resolved at declaration time
    pub aggregate: AggregateSpec,
    pub op: CompareOp,
    pub value: Value,
    pub combinator: Combinator,
}

/// One declaration on a query.
#[derive(Debug, Clone)]
pub enum Spec {
    Relation(RelationSpec),
    Aggregate(AggregateSpec),
    Has(HasSpec),
    Exists(ExistsSpec),
    AggregateFilter(AggregateFilterSpec),
}
