//! `Query`: the relation graph builder layered over [`Statement`].

use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{RelqError, Result};
use crate::sql::{
    Combinator, CompareOp, ConditionOp, JoinType, OrderBy, Statement, parse_condition_key,
};
use crate::validate::{
    ExpressionMode, IdentifierKind, split_alias, validate_expression, validate_identifier,
};

use super::compile;
use super::queue::WhereQueue;
use super::spec::{
    AggregateColumn, AggregateFilterSpec, AggregateKind, AggregateSpec, ExistsSpec, HasSpec,
    Polarity, Rel, RelCardinality, RelationSpec, Spec,
};

/// A query under construction.
///
/// Plain clauses go straight to the underlying [`Statement`]. Relation
/// declarations are validated immediately and kept as ordered [`Spec`]s
/// until the query is finalized.
///
/// ```
/// use relq_core::query::{Query, Rel};
///
/// let mut query = Query::table("users").unwrap();
/// query
///     .with_sum(Rel::new("orders", "user_id", "id"), "amount")
///     .unwrap()
///     .where_aggregate("orders_sum >", 1000)
///     .unwrap();
/// let sql = query.to_sql().unwrap();
/// assert!(sql.contains(r#"AS "orders_sum""#));
/// assert!(sql.contains("COALESCE((SELECT SUM("));
/// ```
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) config: QueryConfig,
    pub(crate) statement: Statement,
    pub(crate) specs: Vec<Spec>,
    pub(crate) queue: WhereQueue,
    /// Nesting level: 0 for a top-level query
    pub(crate) depth: usize,
    /// Set on refinement contexts of correlated subqueries
    pub(crate) correlated: bool,
    pub(crate) with_total: bool,
}

impl Query {
    /// Creates an empty query. Call [`Query::from`] before finalizing.
    pub fn new(config: QueryConfig) -> Self {
        Self {
            statement: Statement::new(config.dialect),
            config,
            specs: Vec::new(),
            queue: WhereQueue::default(),
            depth: 0,
            correlated: false,
            with_total: false,
        }
    }

    /// Creates a query over `table` with the default configuration.
    pub fn table(table: &str) -> Result<Self> {
        let mut query = Self::new(QueryConfig::default());
        query.from(table)?;
        Ok(query)
    }

    /// A nested context over `target AS alias`, one level below `depth`.
    pub(crate) fn nested(
        config: &QueryConfig,
        target: &str,
        alias: Option<&str>,
        depth: usize,
    ) -> Result<Self> {
        if depth > config.max_depth {
            return Err(RelqError::RecursionLimit(config.max_depth));
        }
        let mut query = Self::new(config.clone());
        query.depth = depth;
        query.statement.from(target, alias);
        Ok(query)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Number of declarations not yet compiled.
    pub fn pending(&self) -> usize {
        self.specs.len() + self.queue.len()
    }

    /// The name unqualified local keys resolve against.
    pub(crate) fn reference(&self) -> Result<&str> {
        self.statement
            .table()
            .map(|t| t.reference())
            .ok_or_else(|| RelqError::Compile("no base table set; call from() first".into()))
    }

    // =========================================================================
    // Plain clauses
    // =========================================================================

    /// Sets the base table. Accepts `"users"` or `"users as u"`.
    pub fn from(&mut self, table: &str) -> Result<&mut Self> {
        let (name, alias) = split_alias(table);
        validate_identifier(name, IdentifierKind::Table)?;
        if let Some(alias) = alias {
            validate_identifier(alias, IdentifierKind::Table)?;
        }
        self.statement.from(name, alias);
        Ok(self)
    }

    /// Adds a column to the projection. Accepts `"name"` or `"users.name as label"`.
    pub fn select(&mut self, column: &str) -> Result<&mut Self> {
        let (name, alias) = split_alias(column);
        validate_identifier(name, IdentifierKind::Column)?;
        if let Some(alias) = alias {
            validate_identifier(alias, IdentifierKind::Table)?;
        }
        self.statement.select(name, alias);
        Ok(self)
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        table: &str,
        left: &str,
        right: &str,
    ) -> Result<&mut Self> {
        let (name, alias) = split_alias(table);
        validate_identifier(name, IdentifierKind::Table)?;
        if let Some(alias) = alias {
            validate_identifier(alias, IdentifierKind::Table)?;
        }
        validate_identifier(left, IdentifierKind::Column)?;
        validate_identifier(right, IdentifierKind::Column)?;
        self.statement.join(join_type, name, alias, left, right);
        Ok(self)
    }

    /// `key` is a column with an optional trailing operator: `"age >="`.
    pub fn r#where(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.push_where(Combinator::And, key, value.into())
    }

    pub fn or_where(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.push_where(Combinator::Or, key, value.into())
    }

    fn push_where(&mut self, combinator: Combinator, key: &str, value: Value) -> Result<&mut Self> {
        let (column, op) = parse_condition_key(key)?;
        validate_identifier(column, IdentifierKind::Column)?;
        self.statement.where_value(combinator, column, op, &value);
        Ok(self)
    }

    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where_in(Combinator::And, column, values, false)
    }

    pub fn or_where_in<I, V>(&mut self, column: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where_in(Combinator::Or, column, values, false)
    }

    pub fn where_not_in<I, V>(&mut self, column: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where_in(Combinator::And, column, values, true)
    }

    fn push_where_in<I, V>(
        &mut self,
        combinator: Combinator,
        column: &str,
        values: I,
        negate: bool,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        validate_identifier(column, IdentifierKind::Column)?;
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.statement.where_in(combinator, column, &values, negate);
        Ok(self)
    }

    pub fn group_start(&mut self) -> &mut Self {
        self.statement.open_group(Combinator::And, false);
        self
    }

    pub fn or_group_start(&mut self) -> &mut Self {
        self.statement.open_group(Combinator::Or, false);
        self
    }

    pub fn not_group_start(&mut self) -> &mut Self {
        self.statement.open_group(Combinator::And, true);
        self
    }

    pub fn or_not_group_start(&mut self) -> &mut Self {
        self.statement.open_group(Combinator::Or, true);
        self
    }

    /// Closes the innermost group after compiling any existence conditions
    /// queued inside it.
    pub fn group_end(&mut self) -> Result<&mut Self> {
        let depth = self.statement.group_depth();
        if depth == 0 {
            return Err(RelqError::UnbalancedGroup(
                "group_end called without an open group",
            ));
        }
        for queued in self.queue.drain_from(depth) {
            let sql = compile::exists_condition(self, &queued.spec)?;
            self.statement.fill_slot(queued.slot, sql)?;
        }
        self.statement.close_group()?;
        Ok(self)
    }

    pub fn order_by(&mut self, column: &str, direction: OrderBy) -> Result<&mut Self> {
        validate_identifier(column, IdentifierKind::Column)?;
        self.statement.order_by(column, direction);
        Ok(self)
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.statement.limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.statement.offset(offset);
        self
    }

    /// Requests the total row count, ignoring limit and offset, alongside
    /// the rows.
    pub fn with_total(&mut self) -> &mut Self {
        self.with_total = true;
        self
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// Declares an eager-loaded relation. The loaded rows are stored under
    /// the explicit alias, or under the target name.
    pub fn declare_relation(&mut self, rel: Rel, cardinality: RelCardinality) -> Result<&mut Self> {
        let link = rel.into_link()?;
        let alias = link.name().into();
        self.specs.push(Spec::Relation(RelationSpec {
            link,
            cardinality,
            alias,
        }));
        Ok(self)
    }

    /// Declares a correlated aggregate column.
    ///
    /// `column` is `*` (counts only), a column name, or an expression such
    /// as `price * quantity`. The result column is named by the explicit
    /// alias or `{target}_{kind}`.
    pub fn declare_aggregate(
        &mut self,
        kind: AggregateKind,
        rel: Rel,
        column: &str,
    ) -> Result<&mut Self> {
        let link = rel.into_link()?;
        let column = aggregate_column(kind, column)?;
        let alias = match &link.alias {
            Some(alias) => alias.clone(),
            None => format!("{}_{}", link.target, kind.suffix()).into(),
        };
        if self.find_aggregate(&alias).is_some() {
            return Err(RelqError::DuplicateAlias(alias.to_string()));
        }
        self.specs.push(Spec::Aggregate(AggregateSpec {
            link,
            kind,
            column,
            alias,
        }));
        Ok(self)
    }

    /// Declares a `(SELECT COUNT(*) ...) op count` condition.
    pub fn declare_where_has(
        &mut self,
        rel: Rel,
        op: &str,
        count: i64,
        combinator: Combinator,
    ) -> Result<&mut Self> {
        let link = rel.into_link()?;
        let op = CompareOp::parse(op).ok_or_else(|| {
            RelqError::InvalidParameter(format!("unsupported has-count operator `{op}`"))
        })?;
        let count = u64::try_from(count).map_err(|_| {
            RelqError::InvalidParameter(format!("has-count must not be negative, got {count}"))
        })?;
        self.specs.push(Spec::Has(HasSpec {
            link,
            op,
            count,
            combinator,
        }));
        Ok(self)
    }

    /// Declares an `[NOT] EXISTS` condition. Inside an open group the
    /// condition keeps its position and compiles when the group closes.
    pub fn declare_where_exists(
        &mut self,
        rel: Rel,
        polarity: Polarity,
        combinator: Combinator,
    ) -> Result<&mut Self> {
        let spec = ExistsSpec {
            link: rel.into_link()?,
            polarity,
            combinator,
        };
        let depth = self.statement.group_depth();
        if depth > 0 {
            let slot = self.statement.reserve_slot(combinator);
            self.queue.push(slot, depth, spec);
        } else {
            self.specs.push(Spec::Exists(spec));
        }
        Ok(self)
    }

    /// Declares a WHERE condition over an aggregate declared earlier.
    ///
    /// `key` is the aggregate alias plus an optional operator, e.g.
    /// `"orders_sum >"`. The alias must match exactly.
    pub fn declare_aggregate_filter(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        combinator: Combinator,
    ) -> Result<&mut Self> {
        let (alias, op) = parse_condition_key(key)?;
        let ConditionOp::Compare(op) = op else {
            return Err(RelqError::InvalidParameter(format!(
                "aggregate filters take a comparison operator, got `{}`",
                op.as_sql()
            )));
        };
        let value = value.into();
        if value.is_null() {
            return Err(RelqError::InvalidParameter(format!(
                "aggregate filter on `{alias}` needs a non-null value"
            )));
        }
        let aggregate = self
            .find_aggregate(alias)
            .cloned()
            .ok_or_else(|| RelqError::UnresolvedAlias(alias.to_string()))?;
        self.specs.push(Spec::AggregateFilter(AggregateFilterSpec {
            aggregate,
            op,
            value,
            combinator,
        }));
        Ok(self)
    }

    fn find_aggregate(&self, alias: &str) -> Option<&AggregateSpec> {
        self.specs.iter().find_map(|spec| match spec {
            Spec::Aggregate(aggregate) if aggregate.alias == alias => Some(aggregate),
            _ => None,
        })
    }

    // =========================================================================
    // Convenience wrappers
    // =========================================================================

    pub fn with_one(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_relation(rel, RelCardinality::One)
    }

    pub fn with_many(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_relation(rel, RelCardinality::Many)
    }

    pub fn with_count(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_aggregate(AggregateKind::Count, rel, "*")
    }

    pub fn with_sum(&mut self, rel: Rel, column: &str) -> Result<&mut Self> {
        self.declare_aggregate(AggregateKind::Sum, rel, column)
    }

    pub fn with_avg(&mut self, rel: Rel, column: &str) -> Result<&mut Self> {
        self.declare_aggregate(AggregateKind::Avg, rel, column)
    }

    pub fn with_min(&mut self, rel: Rel, column: &str) -> Result<&mut Self> {
        self.declare_aggregate(AggregateKind::Min, rel, column)
    }

    pub fn with_max(&mut self, rel: Rel, column: &str) -> Result<&mut Self> {
        self.declare_aggregate(AggregateKind::Max, rel, column)
    }

    /// Attaches a calculation such as `SUM(price * quantity) - SUM(discount)`.
    pub fn with_calc(&mut self, rel: Rel, expression: &str) -> Result<&mut Self> {
        self.declare_aggregate(AggregateKind::Calc, rel, expression)
    }

    /// `op` is one of `= != <> < <= > >=`.
    pub fn where_has(&mut self, rel: Rel, op: &str, count: i64) -> Result<&mut Self> {
        self.declare_where_has(rel, op, count, Combinator::And)
    }

    pub fn or_where_has(&mut self, rel: Rel, op: &str, count: i64) -> Result<&mut Self> {
        self.declare_where_has(rel, op, count, Combinator::Or)
    }

    /// Keeps rows without any related row.
    pub fn where_doesnt_have(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_where_exists(rel, Polarity::NotExists, Combinator::And)
    }

    pub fn where_exists_relation(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_where_exists(rel, Polarity::Exists, Combinator::And)
    }

    pub fn or_where_exists_relation(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_where_exists(rel, Polarity::Exists, Combinator::Or)
    }

    pub fn where_not_exists_relation(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_where_exists(rel, Polarity::NotExists, Combinator::And)
    }

    pub fn or_where_not_exists_relation(&mut self, rel: Rel) -> Result<&mut Self> {
        self.declare_where_exists(rel, Polarity::NotExists, Combinator::Or)
    }

    /// Compiles the EXISTS condition immediately at the current position,
    /// bypassing the queue.
    pub fn where_exists_now(&mut self, rel: Rel) -> Result<&mut Self> {
        self.push_exists_now(rel, Combinator::And)
    }

    pub fn or_where_exists_now(&mut self, rel: Rel) -> Result<&mut Self> {
        self.push_exists_now(rel, Combinator::Or)
    }

    fn push_exists_now(&mut self, rel: Rel, combinator: Combinator) -> Result<&mut Self> {
        let spec = ExistsSpec {
            link: rel.into_link()?,
            polarity: Polarity::Exists,
            combinator,
        };
        let sql = compile::exists_condition(self, &spec)?;
        self.statement.push_condition(combinator, sql);
        Ok(self)
    }

    pub fn where_aggregate(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.declare_aggregate_filter(key, value, Combinator::And)
    }

    pub fn or_where_aggregate(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.declare_aggregate_filter(key, value, Combinator::Or)
    }

    /// Orders by a previously declared aggregate column.
    pub fn order_by_aggregate(&mut self, alias: &str, direction: OrderBy) -> Result<&mut Self> {
        if self.find_aggregate(alias).is_none() {
            return Err(RelqError::UnresolvedAlias(alias.to_string()));
        }
        self.statement.order_by(alias, direction);
        Ok(self)
    }

    /// Renders the finalized statement without executing it.
    pub fn to_sql(&self) -> Result<String> {
        let mut query = self.clone();
        let compiled = query.finalize()?;
        compiled.statement.to_sql()
    }
}

fn aggregate_column(kind: AggregateKind, column: &str) -> Result<AggregateColumn> {
    let column = column.trim();
    if column == "*" {
        return match kind {
            AggregateKind::Count => Ok(AggregateColumn::Star),
            _ => Err(RelqError::InvalidParameter(format!(
                "`*` is only valid for count aggregates, not {}",
                kind.suffix()
            ))),
        };
    }
    if validate_identifier(column, IdentifierKind::Column).is_ok() {
        return Ok(AggregateColumn::Column(column.into()));
    }
    let mode = match kind {
        AggregateKind::Calc => ExpressionMode::Calculation,
        _ => ExpressionMode::CustomColumn,
    };
    validate_expression(column, mode)?;
    Ok(AggregateColumn::Expression(column.to_string()))
}
