//! Base SQL statement builder.
//!
//! [`Statement`] accumulates the clauses of one `SELECT` and renders them to
//! text. It trusts its inputs: identifiers are quoted with
//! [`Statement::protect_identifiers`] and values inlined with
//! [`Statement::escape`], but validation happens one layer up in
//! [`Query`](crate::query::Query).

mod condition;

pub use condition::{Combinator, CompareOp, ConditionOp, parse_condition_key};
pub(crate) use condition::WhereToken;

use compact_str::CompactString;
use relq_types::Dialect;
use serde_json::Value;

use crate::error::{RelqError, Result};
use condition::render_where;

/// Sort direction for ORDER BY clauses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            OrderBy::Asc => "ASC",
            OrderBy::Desc => "DESC",
        }
    }
}

/// The type of JOIN operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

/// The base table of a statement and its optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: CompactString,
    pub alias: Option<CompactString>,
}

impl TableRef {
    /// The name other clauses must use to refer to this table.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Writes a JSON value as an inline SQL literal.
pub fn escape(dialect: Dialect, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => dialect.bool_literal(*b).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => dialect.escape_str(s),
        other => dialect.escape_str(&other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    dialect: Dialect,
    table: Option<TableRef>,
    /// Caller-chosen projection; empty means `table.*`
    columns: Vec<String>,
    /// Compiled additions appended after the projection
    extra_columns: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<WhereToken>,
    group_depth: usize,
    next_slot: usize,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Statement {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            table: None,
            columns: Vec::new(),
            extra_columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_depth: 0,
            next_slot: 0,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Quotes an identifier for this statement's dialect.
    pub fn protect_identifiers(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Inlines a value as a literal for this statement's dialect.
    pub fn escape(&self, value: &Value) -> String {
        escape(self.dialect, value)
    }

    pub fn from(&mut self, name: &str, alias: Option<&str>) -> &mut Self {
        self.table = Some(TableRef {
            name: name.into(),
            alias: alias.map(Into::into),
        });
        self
    }

    pub fn table(&self) -> Option<&TableRef> {
        self.table.as_ref()
    }

    /// Adds `column [AS alias]` to the caller's projection.
    pub fn select(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        let mut item = self.protect_identifiers(column);
        if let Some(alias) = alias {
            item.push_str(" AS ");
            item.push_str(&self.protect_identifiers(alias));
        }
        self.columns.push(item);
        self
    }

    /// Whether the caller restricted the projection.
    pub fn has_explicit_select(&self) -> bool {
        !self.columns.is_empty()
    }

    /// The first clause set on this statement that only affects the shape
    /// of its own result set.
    pub(crate) fn output_clause(&self) -> Option<&'static str> {
        if !self.columns.is_empty() {
            Some("select")
        } else if !self.order_by.is_empty() {
            Some("order_by")
        } else if self.limit.is_some() {
            Some("limit")
        } else if self.offset.is_some() {
            Some("offset")
        } else {
            None
        }
    }

    /// Appends an already-rendered item after the projection.
    pub(crate) fn push_extra_column(&mut self, sql: String) {
        self.extra_columns.push(sql);
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        table: &str,
        alias: Option<&str>,
        left: &str,
        right: &str,
    ) -> &mut Self {
        let mut sql = String::with_capacity(64);
        sql.push_str(join_type.as_sql());
        sql.push(' ');
        sql.push_str(&self.protect_identifiers(table));
        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&self.protect_identifiers(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&self.protect_identifiers(left));
        sql.push_str(" = ");
        sql.push_str(&self.protect_identifiers(right));
        self.joins.push(sql);
        self
    }

    /// Appends a rendered condition.
    pub(crate) fn push_condition(&mut self, combinator: Combinator, sql: String) {
        self.conditions.push(WhereToken::Condition { combinator, sql });
    }

    /// `column op value`, turning `= NULL` into `IS NULL`.
    pub fn where_value(
        &mut self,
        combinator: Combinator,
        column: &str,
        op: ConditionOp,
        value: &Value,
    ) -> &mut Self {
        let op = match (op, value) {
            (ConditionOp::Compare(CompareOp::Eq), Value::Null) => ConditionOp::Is,
            (ConditionOp::Compare(CompareOp::NotEq), Value::Null) => ConditionOp::IsNot,
            (op, _) => op,
        };
        let sql = format!(
            "{} {} {}",
            self.protect_identifiers(column),
            op.as_sql(),
            self.escape(value)
        );
        self.push_condition(combinator, sql);
        self
    }

    /// `column [NOT] IN (...)`. An empty list renders a constant predicate.
    pub fn where_in(
        &mut self,
        combinator: Combinator,
        column: &str,
        values: &[Value],
        negate: bool,
    ) -> &mut Self {
        let sql = if values.is_empty() {
            let constant = if negate { "1 = 1" } else { "1 = 0" };
            constant.to_string()
        } else {
            let list: Vec<String> = values.iter().map(|v| self.escape(v)).collect();
            format!(
                "{} {}IN ({})",
                self.protect_identifiers(column),
                if negate { "NOT " } else { "" },
                list.join(", ")
            )
        };
        self.push_condition(combinator, sql);
        self
    }

    pub fn open_group(&mut self, combinator: Combinator, negate: bool) -> &mut Self {
        self.conditions.push(WhereToken::Open { combinator, negate });
        self.group_depth += 1;
        self
    }

    /// Closes the innermost group. A group that received no conditions is
    /// removed entirely.
    pub fn close_group(&mut self) -> Result<&mut Self> {
        if self.group_depth == 0 {
            return Err(RelqError::UnbalancedGroup(
                "group_end called without an open group",
            ));
        }
        self.group_depth -= 1;
        if matches!(self.conditions.last(), Some(WhereToken::Open { .. })) {
            self.conditions.pop();
        } else {
            self.conditions.push(WhereToken::Close);
        }
        Ok(self)
    }

    /// Moves the current conditions into their own group behind the
    /// conditions of `lead`.
    pub(crate) fn prepend_conditions(&mut self, lead: Statement) {
        let existing = std::mem::take(&mut self.conditions);
        self.conditions = lead.conditions;
        if !existing.is_empty() {
            self.conditions.push(WhereToken::Open {
                combinator: Combinator::And,
                negate: false,
            });
            self.conditions.extend(existing);
            self.conditions.push(WhereToken::Close);
        }
    }

    /// Number of currently open groups.
    pub fn group_depth(&self) -> usize {
        self.group_depth
    }

    /// Reserves a position for a condition compiled later.
    pub(crate) fn reserve_slot(&mut self, combinator: Combinator) -> usize {
        let id = self.next_slot;
        self.next_slot += 1;
        self.conditions.push(WhereToken::Slot { combinator, id });
        id
    }

    pub(crate) fn fill_slot(&mut self, slot: usize, sql: String) -> Result<()> {
        for token in &mut self.conditions {
            if let WhereToken::Slot { combinator, id } = *token
                && id == slot
            {
                *token = WhereToken::Condition { combinator, sql };
                return Ok(());
            }
        }
        Err(RelqError::Compile(format!("no reserved WHERE slot {slot}")))
    }

    pub fn order_by(&mut self, column: &str, direction: OrderBy) -> &mut Self {
        let item = format!("{} {}", self.protect_identifiers(column), direction.as_sql());
        self.order_by.push(item);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// `"table" AS "alias"` followed by any joins.
    pub fn from_sql(&self) -> Result<String> {
        let table = self.require_table()?;
        let mut sql = self.protect_identifiers(&table.name);
        if let Some(alias) = &table.alias {
            sql.push_str(" AS ");
            sql.push_str(&self.protect_identifiers(alias));
        }
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        Ok(sql)
    }

    /// The rendered WHERE body, without the keyword.
    pub fn where_sql(&self) -> Result<Option<String>> {
        if self.group_depth > 0 {
            return Err(RelqError::UnbalancedGroup(
                "query finalized while a WHERE group is still open",
            ));
        }
        render_where(&self.conditions)
    }

    /// Renders the full SELECT statement.
    pub fn to_sql(&self) -> Result<String> {
        let table = self.require_table()?;
        let mut sql = String::with_capacity(128);
        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push_str(&self.protect_identifiers(table.reference()));
            sql.push_str(".*");
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        for extra in &self.extra_columns {
            sql.push_str(", ");
            sql.push_str(extra);
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.from_sql()?);
        if let Some(conditions) = self.where_sql()? {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            if self.limit.is_none() && self.dialect != Dialect::PostgreSQL {
                // SQLite and MySQL only accept OFFSET after a LIMIT
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(sql)
    }

    /// `SELECT COUNT(*)` over the same FROM/JOIN/WHERE, ignoring ordering
    /// and pagination.
    pub fn count_sql(&self, column: &str) -> Result<String> {
        let mut sql = format!(
            "SELECT COUNT(*) AS {} FROM {}",
            self.protect_identifiers(column),
            self.from_sql()?
        );
        if let Some(conditions) = self.where_sql()? {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }
        Ok(sql)
    }

    fn require_table(&self) -> Result<&TableRef> {
        self.table
            .as_ref()
            .ok_or_else(|| RelqError::Compile("no base table set; call from() first".into()))
    }
}
