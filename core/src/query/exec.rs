//! Execution and eager loading.
//!
//! The base statement runs first. Each declared relation then issues one
//! keyed fetch for all parent rows at once, and the fetched rows are
//! hash-joined back onto their parents. Nested relations declared in a
//! refinement repeat the same steps on the fetched rows.

use std::panic::Location;

use hashbrown::{HashMap, HashSet};
use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{ExecutionDiagnostic, RelqError, Result};
use crate::row::{QueryResult, Row};
use crate::sql::{Combinator, CompareOp, ConditionOp, Statement};
use crate::traits::Driver;
use crate::{relq_profile_scope, relq_trace_load, relq_trace_query};

use super::Query;
use super::compile::key_column;
use super::spec::{KeyList, RelCardinality, RelationSpec};

/// Separates the parts of a composite key in its hashed text form.
const KEY_SEPARATOR: char = '\u{1f}';

impl Query {
    /// Compiles and executes the query, then eager-loads every declared
    /// relation.
    ///
    /// Driver failures are reported as [`RelqError::Execution`] carrying the
    /// SQL text and the location of this call.
    #[track_caller]
    pub fn get<D: Driver + ?Sized>(self, driver: &D) -> Result<QueryResult> {
        let location = Location::caller();
        let config = self.config.clone();
        let with_total = self.with_total;
        let (rows, total) = self.execute(driver, location, None, with_total)?;
        Ok(QueryResult::new(rows, total, &config))
    }

    /// Finalizes, runs and eager-loads. `lead` conditions, when present, go
    /// in front of this query's own conditions, which are grouped.
    fn execute<D: Driver + ?Sized>(
        mut self,
        driver: &D,
        location: &'static Location<'static>,
        lead: Option<Statement>,
        with_total: bool,
    ) -> Result<(Vec<Row>, Option<u64>)> {
        relq_profile_scope!("relq", "execute");
        let mut compiled = self.finalize()?;
        if let Some(lead) = lead {
            compiled.statement.prepend_conditions(lead);
        }

        let total = if with_total {
            let column = self.config.synthetic_column("total");
            let sql = compiled.statement.count_sql(&column)?;
            relq_trace_query!(&sql, "total");
            let rows = run(driver, &sql, location)?;
            Some(
                rows.first()
                    .and_then(|row| row.get(&column))
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            )
        } else {
            None
        };

        let sql = compiled.statement.to_sql()?;
        relq_trace_query!(&sql, "base");
        let mut rows = run(driver, &sql, location)?;
        for relation in compiled.relations {
            load_relation(driver, &self.config, self.depth, &mut rows, relation, location)?;
        }
        Ok((rows, total))
    }
}

fn run<D: Driver + ?Sized>(
    driver: &D,
    sql: &str,
    location: &'static Location<'static>,
) -> Result<Vec<Row>> {
    relq_profile_scope!("relq", "fetch");
    driver
        .fetch_all(sql)
        .map_err(|err| RelqError::Execution(Box::new(ExecutionDiagnostic::new(err, sql, location))))
}

/// Column names a key list is read back under: the synthetic correlation
/// column first, then the plain column when one can stand in for it.
struct KeyColumns {
    names: Vec<(String, Option<String>)>,
}

impl KeyColumns {
    /// Keys of the parent rows. A qualified key may name a joined table, so
    /// only its synthetic column is trusted.
    fn local(config: &QueryConfig, keys: &KeyList) -> Self {
        let names = keys
            .iter()
            .map(|key| {
                let plain = (!key.contains('.')).then(|| key.to_string());
                (config.correlation_column(key), plain)
            })
            .collect();
        Self { names }
    }

    /// Keys of the fetched rows, which always live on the target table.
    fn foreign(config: &QueryConfig, keys: &KeyList) -> Self {
        let names = keys
            .iter()
            .map(|key| {
                let plain = key_column(key);
                (config.synthetic_column(plain), Some(plain.to_string()))
            })
            .collect();
        Self { names }
    }

    /// The key values of `row`, or `None` if any part is missing or NULL.
    fn values<'r>(&self, row: &'r Row) -> Option<Vec<&'r Value>> {
        self.names
            .iter()
            .map(|(synthetic, plain)| {
                row.get(synthetic)
                    .or_else(|| plain.as_ref().and_then(|plain| row.get(plain)))
                    .filter(|value| !value.is_null())
            })
            .collect()
    }

    fn key(&self, row: &Row) -> Option<String> {
        self.values(row).map(|values| key_text(&values))
    }
}

/// Normalizes a key tuple to text so `1`, `1.0` and `"1"` hash alike.
fn key_text(values: &[&Value]) -> String {
    let mut text = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            text.push(KEY_SEPARATOR);
        }
        match value {
            Value::String(s) => text.push_str(s),
            Value::Bool(b) => text.push(if *b { '1' } else { '0' }),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => text.push_str(&i.to_string()),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                    text.push_str(&(f as i64).to_string())
                }
                _ => text.push_str(&n.to_string()),
            },
            other => text.push_str(&other.to_string()),
        }
    }
    text
}

fn empty_value(cardinality: RelCardinality) -> Value {
    match cardinality {
        RelCardinality::Many => Value::Array(Vec::new()),
        RelCardinality::One => Value::Null,
    }
}

/// Loads one relation for every row in `rows` with a single fetch.
fn load_relation<D: Driver + ?Sized>(
    driver: &D,
    config: &QueryConfig,
    depth: usize,
    rows: &mut [Row],
    relation: RelationSpec,
    location: &'static Location<'static>,
) -> Result<()> {
    relq_profile_scope!("relq", "load_relation");
    let RelationSpec {
        link,
        cardinality,
        alias,
    } = relation;
    let local = KeyColumns::local(config, &link.local);
    let foreign = KeyColumns::foreign(config, &link.foreign);

    let mut seen = HashSet::new();
    let mut distinct: Vec<Vec<Value>> = Vec::new();
    for row in rows.iter() {
        if let Some(values) = local.values(row)
            && seen.insert(key_text(&values))
        {
            distinct.push(values.into_iter().cloned().collect());
        }
    }

    if distinct.is_empty() {
        relq_trace_load!(alias, 0usize, 0usize);
        for row in rows.iter_mut() {
            row.insert(alias.to_string(), empty_value(cardinality));
        }
        return Ok(());
    }

    let mut child = Query::nested(config, &link.target, link.alias.as_deref(), depth + 1)?;
    let reference = child.reference()?.to_string();
    let columns: Vec<String> = link
        .foreign
        .iter()
        .map(|fk| format!("{reference}.{}", key_column(fk)))
        .collect();

    let mut filter = Statement::new(config.dialect);
    if let [column] = columns.as_slice() {
        let values: Vec<Value> = distinct.iter().map(|tuple| tuple[0].clone()).collect();
        filter.where_in(Combinator::And, column, &values, false);
    } else {
        filter.open_group(Combinator::And, false);
        for tuple in &distinct {
            filter.open_group(Combinator::Or, false);
            for (column, value) in columns.iter().zip(tuple) {
                filter.where_value(
                    Combinator::And,
                    column,
                    ConditionOp::Compare(CompareOp::Eq),
                    value,
                );
            }
            filter.close_group()?;
        }
        filter.close_group()?;
    }

    if let Some(refine) = &link.refine {
        refine(&mut child)?;
    }
    if child.statement.has_explicit_select() {
        for (fk, column) in link.foreign.iter().zip(&columns) {
            let sql = format!(
                "{} AS {}",
                child.statement.protect_identifiers(column),
                child
                    .statement
                    .protect_identifiers(&config.synthetic_column(key_column(fk)))
            );
            child.statement.push_extra_column(sql);
        }
    }

    let (children, _) = child.execute(driver, location, Some(filter), false)?;
    relq_trace_load!(alias, distinct.len(), children.len());

    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for child_row in children {
        // Rows with a NULL key can never match a parent.
        let Some(key) = foreign.key(&child_row) else {
            continue;
        };
        groups.entry(key).or_default().push(child_row);
    }

    for row in rows.iter_mut() {
        let matched = local.key(row).and_then(|key| groups.get(&key));
        let value = match (cardinality, matched) {
            (RelCardinality::Many, Some(found)) => {
                Value::Array(found.iter().cloned().map(Value::Object).collect())
            }
            (RelCardinality::One, Some(found)) => {
                found.first().cloned().map_or(Value::Null, Value::Object)
            }
            (_, None) => empty_value(cardinality),
        };
        row.insert(alias.to_string(), value);
    }
    Ok(())
}
