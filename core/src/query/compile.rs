//! Subquery synthesis.
//!
//! Turns specs into correlated SQL fragments. Every subquery aliases its
//! target as `{base}_s{depth}` so self-referencing relations stay
//! unambiguous, and correlates on `"{alias}"."{fk}" = {parent}.{lk}`.
//! Refinement callbacks run against a nested [`Query`] whose own specs are
//! compiled, with the synthetic alias as the new anchor, before the
//! fragment is serialized.

use std::mem;

use crate::error::{RelqError, Result};
use crate::relq_profile_scope;
use crate::relq_trace_query;
use crate::sql::Statement;
use crate::validate::{ExpressionMode, qualify_expression};

use super::Query;
use super::spec::{
    AggregateColumn, AggregateFilterSpec, AggregateKind, AggregateSpec, ExistsSpec, HasSpec, Link,
    RelationSpec, Spec,
};

/// A finalized query: the rendered statement plus the relations still to be
/// eager-loaded against its rows.
#[derive(Debug)]
pub(crate) struct Compiled {
    pub statement: Statement,
    pub relations: Vec<RelationSpec>,
}

impl Query {
    /// Compiles every pending spec into the statement.
    ///
    /// Order is fixed: has-conditions, aggregates, the WHERE-queue, exists
    /// conditions, then aggregate filters. Relations are returned for the
    /// executor.
    pub(crate) fn finalize(&mut self) -> Result<Compiled> {
        relq_profile_scope!("relq", "finalize");
        if self.statement.group_depth() > 0 {
            return Err(RelqError::UnbalancedGroup(
                "query finalized while a WHERE group is still open",
            ));
        }
        self.reference()?;

        let specs = mem::take(&mut self.specs);
        let mut has = Vec::new();
        let mut aggregates = Vec::new();
        let mut exists = Vec::new();
        let mut filters = Vec::new();
        let mut relations = Vec::new();
        for spec in specs {
            match spec {
                Spec::Has(spec) => has.push(spec),
                Spec::Aggregate(spec) => aggregates.push(spec),
                Spec::Exists(spec) => exists.push(spec),
                Spec::AggregateFilter(spec) => filters.push(spec),
                Spec::Relation(spec) => relations.push(spec),
            }
        }

        for spec in &has {
            let sql = has_condition(self, spec)?;
            self.statement.push_condition(spec.combinator, sql);
        }
        // Aggregates inside a correlated subquery have no projection to join;
        // they only matter through the filters that captured them.
        if !self.correlated {
            for spec in &aggregates {
                let sql = aggregate_column_sql(self, spec)?;
                self.statement.push_extra_column(sql);
            }
        }
        for queued in self.queue.drain_all() {
            let sql = exists_condition(self, &queued.spec)?;
            self.statement.fill_slot(queued.slot, sql)?;
        }
        for spec in &exists {
            let sql = exists_condition(self, spec)?;
            self.statement.push_condition(spec.combinator, sql);
        }
        for spec in &filters {
            let sql = aggregate_filter(self, spec)?;
            self.statement.push_condition(spec.combinator, sql);
        }

        if !relations.is_empty() {
            if self.correlated {
                return Err(RelqError::Compile(format!(
                    "relation `{}` cannot be eager-loaded from inside a correlated subquery",
                    relations[0].alias
                )));
            }
            self.add_correlation_columns(&relations)?;
        }

        Ok(Compiled {
            statement: self.statement.clone(),
            relations,
        })
    }

    /// Projects local keys under their reserved synthetic names so the
    /// executor can read them back. Every key is projected when the select
    /// list is explicit; otherwise only qualified keys are, since the
    /// default projection covers the base table alone.
    fn add_correlation_columns(&mut self, relations: &[RelationSpec]) -> Result<()> {
        let reference = self.reference()?.to_string();
        let explicit = self.statement.has_explicit_select();
        let mut added: Vec<String> = Vec::new();
        for relation in relations {
            for local in &relation.link.local {
                if !explicit && !local.contains('.') {
                    continue;
                }
                let name = self.config.correlation_column(local);
                if added.contains(&name) {
                    continue;
                }
                let sql = format!(
                    "{} AS {}",
                    qualified(&self.statement, &reference, local),
                    self.statement.protect_identifiers(&name)
                );
                self.statement.push_extra_column(sql);
                added.push(name);
            }
        }
        Ok(())
    }
}

/// Column name a key is read back under: the last dot segment.
pub(crate) fn key_column(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

/// Qualifies a bare key with `reference`; dotted keys are kept as written.
fn qualified(statement: &Statement, reference: &str, key: &str) -> String {
    if key.contains('.') {
        statement.protect_identifiers(key)
    } else {
        let mut sql = statement.protect_identifiers(reference);
        sql.push('.');
        sql.push_str(&statement.protect_identifiers(key));
        sql
    }
}

/// `FROM ... WHERE ...` body shared by every subquery form.
struct Correlated {
    alias: String,
    from: String,
    conditions: String,
}

/// Builds the correlated body for `link`, running its refinement in a
/// nested context one level below `parent`.
fn correlate(parent: &Query, link: &Link, base: &str) -> Result<Correlated> {
    let depth = parent.depth + 1;
    let alias = format!("{base}_s{depth}");
    let anchor = parent.reference()?;
    let statement = &parent.statement;

    let mut conditions = String::with_capacity(64);
    for (i, (foreign, local)) in link.foreign.iter().zip(&link.local).enumerate() {
        if i > 0 {
            conditions.push_str(" AND ");
        }
        conditions.push_str(&qualified(statement, &alias, key_column(foreign)));
        conditions.push_str(" = ");
        conditions.push_str(&qualified(statement, anchor, local));
    }

    let (from, refinement) = compile_subcontext(parent, link, &alias, depth)?;
    if let Some(refinement) = refinement {
        conditions.push_str(" AND (");
        conditions.push_str(&refinement);
        conditions.push(')');
    }
    Ok(Correlated {
        alias,
        from,
        conditions,
    })
}

/// Runs the refinement callback of `link` against `target AS alias` and
/// returns the rendered FROM/JOIN text and WHERE body.
///
/// The parent is only read; the nested query owns its own specs and
/// clause buffers.
pub(crate) fn compile_subcontext(
    parent: &Query,
    link: &Link,
    alias: &str,
    depth: usize,
) -> Result<(String, Option<String>)> {
    let mut child = Query::nested(&parent.config, &link.target, Some(alias), depth)?;
    child.correlated = true;
    if let Some(refine) = &link.refine {
        refine(&mut child)?;
    }
    let compiled = child.finalize()?;
    if let Some(clause) = compiled.statement.output_clause() {
        return Err(RelqError::Compile(format!(
            "`{clause}` cannot be used in the refinement of `{}`; correlated subqueries only take conditions and joins",
            link.name()
        )));
    }
    Ok((compiled.statement.from_sql()?, compiled.statement.where_sql()?))
}

fn aggregate_expression(parent: &Query, spec: &AggregateSpec, alias: &str) -> Result<String> {
    let statement = &parent.statement;
    let inner = match &spec.column {
        AggregateColumn::Star => "*".to_string(),
        AggregateColumn::Column(column) => qualified(statement, alias, column),
        AggregateColumn::Expression(expr) => {
            let mode = match spec.kind {
                AggregateKind::Calc => ExpressionMode::Calculation,
                _ => ExpressionMode::CustomColumn,
            };
            qualify_expression(expr, alias, mode, statement.dialect())?
        }
    };
    Ok(match spec.kind.function() {
        Some(function) => format!("{function}({inner})"),
        None => inner,
    })
}

/// `(SELECT fn(..) FROM "target" AS "alias_sN" WHERE correlation [AND (refinement)])`
pub(crate) fn aggregate_subquery(parent: &Query, spec: &AggregateSpec) -> Result<String> {
    let body = correlate(parent, &spec.link, &spec.alias)?;
    let expression = aggregate_expression(parent, spec, &body.alias)?;
    Ok(format!(
        "(SELECT {expression} FROM {} WHERE {})",
        body.from, body.conditions
    ))
}

/// The aggregate as a projected column: `(subquery) AS "alias"`.
pub(crate) fn aggregate_column_sql(parent: &Query, spec: &AggregateSpec) -> Result<String> {
    let sql = format!(
        "{} AS {}",
        aggregate_subquery(parent, spec)?,
        parent.statement.protect_identifiers(&spec.alias)
    );
    relq_trace_query!(&sql, "aggregate");
    Ok(sql)
}

/// `COALESCE((subquery), 0) op value`, so relations without rows compare as 0.
pub(crate) fn aggregate_filter(parent: &Query, spec: &AggregateFilterSpec) -> Result<String> {
    let sql = format!(
        "COALESCE({}, 0) {} {}",
        aggregate_subquery(parent, &spec.aggregate)?,
        spec.op.as_sql(),
        parent.statement.escape(&spec.value)
    );
    relq_trace_query!(&sql, "aggregate_filter");
    Ok(sql)
}

/// `[NOT] EXISTS (SELECT 1 FROM ... WHERE correlation)`.
pub(crate) fn exists_condition(parent: &Query, spec: &ExistsSpec) -> Result<String> {
    let body = correlate(parent, &spec.link, spec.link.name())?;
    let sql = format!(
        "{} (SELECT 1 FROM {} WHERE {})",
        spec.polarity.as_sql(),
        body.from,
        body.conditions
    );
    relq_trace_query!(&sql, "exists");
    Ok(sql)
}

/// `(SELECT COUNT(*) FROM ... WHERE correlation) op count`.
pub(crate) fn has_condition(parent: &Query, spec: &HasSpec) -> Result<String> {
    let body = correlate(parent, &spec.link, spec.link.name())?;
    let sql = format!(
        "(SELECT COUNT(*) FROM {} WHERE {}) {} {}",
        body.from,
        body.conditions,
        spec.op.as_sql(),
        spec.count
    );
    relq_trace_query!(&sql, "has");
    Ok(sql)
}
