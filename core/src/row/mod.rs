//! Result rows and the result wrapper.
//!
//! Rows come back from a [`Driver`](crate::Driver) as JSON maps. Before the
//! caller sees them, one recursive walk strips the synthetic correlation
//! columns at every nesting level and normalizes nested containers: a map
//! keyed exactly `"0".."n-1"` becomes a sequence, everything else stays a
//! record. The same walk builds both output shapes, map form
//! ([`Row`]) and attribute-object form ([`Record`]).

#[cfg(feature = "rusqlite")]
mod rusqlite;

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::config::QueryConfig;
use crate::error::{RelqError, Result};

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

// =============================================================================
// Output shapes
// =============================================================================

/// Output shape built by the normalizing walk.
trait Shape: Sized {
    /// A leaf value, or a subtree left as-is past the depth cap.
    fn scalar(value: Value) -> Self;
    fn sequence(items: Vec<Self>) -> Self;
    fn record(fields: Vec<(String, Self)>) -> Self;
}

impl Shape for Value {
    fn scalar(value: Value) -> Self {
        value
    }

    fn sequence(items: Vec<Self>) -> Self {
        Value::Array(items)
    }

    fn record(fields: Vec<(String, Self)>) -> Self {
        Value::Object(fields.into_iter().collect())
    }
}

/// A field of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Field>),
    Record(Record),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Field::Bool(b) => Some(*b),
            Field::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Field::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Field::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Field::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Field::Null,
            Value::Bool(b) => Field::Bool(b),
            Value::Number(n) => Field::Number(n),
            Value::String(s) => Field::Text(s),
            Value::Array(items) => Field::List(items.into_iter().map(Field::from).collect()),
            Value::Object(map) => Field::Record(Record {
                fields: map.into_iter().map(|(k, v)| (k, Field::from(v))).collect(),
            }),
        }
    }
}

impl Shape for Field {
    fn scalar(value: Value) -> Self {
        Field::from(value)
    }

    fn sequence(items: Vec<Self>) -> Self {
        Field::List(items)
    }

    fn record(fields: Vec<(String, Self)>) -> Self {
        Field::Record(Record { fields })
    }
}

/// Attribute-object form of a row: named fields in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find_map(|(key, field)| (key == name).then_some(field))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(key, field)| (key.as_str(), field))
    }

    pub fn into_fields(self) -> Vec<(String, Field)> {
        self.fields
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// Normalizing walk
// =============================================================================

struct Walker<'a> {
    /// Keys starting with this are dropped
    prefix: Option<&'a str>,
    max_depth: usize,
    capped: bool,
}

impl<'a> Walker<'a> {
    fn new(prefix: Option<&'a str>, max_depth: usize) -> Self {
        Self {
            prefix,
            max_depth,
            capped: false,
        }
    }

    fn row<S: Shape>(&mut self, row: Row) -> Vec<(String, S)> {
        self.fields(row, 0)
    }

    fn fields<S: Shape>(&mut self, map: Row, depth: usize) -> Vec<(String, S)> {
        let prefix = self.prefix;
        map.into_iter()
            .filter(|(key, _)| prefix.is_none_or(|prefix| !key.starts_with(prefix)))
            .map(|(key, value)| {
                let value = self.value(value, depth + 1);
                (key, value)
            })
            .collect()
    }

    fn value<S: Shape>(&mut self, value: Value, depth: usize) -> S {
        match value {
            Value::Array(_) | Value::Object(_) if depth >= self.max_depth => {
                self.cap(depth);
                S::scalar(value)
            }
            Value::Array(items) => S::sequence(
                items
                    .into_iter()
                    .map(|item| self.value(item, depth + 1))
                    .collect(),
            ),
            Value::Object(map) => match into_sequence(map) {
                Ok(items) => S::sequence(
                    items
                        .into_iter()
                        .map(|item| self.value(item, depth + 1))
                        .collect(),
                ),
                Err(map) => S::record(self.fields(map, depth)),
            },
            other => S::scalar(other),
        }
    }

    fn cap(&mut self, depth: usize) {
        if !self.capped {
            self.capped = true;
            #[cfg(feature = "tracing")]
            ::tracing::warn!(
                depth,
                max_depth = self.max_depth,
                "result nesting exceeds max_result_depth; deeper levels left unstripped"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = depth;
        }
    }
}

/// A non-empty map keyed exactly `"0".."n-1"` in some order, as a sequence.
fn into_sequence(map: Map<String, Value>) -> std::result::Result<Vec<Value>, Map<String, Value>> {
    let len = map.len();
    let contiguous = len > 0
        && map.keys().all(|key| {
            key.parse::<usize>()
                .is_ok_and(|index| index < len && index.to_string() == *key)
        });
    if !contiguous {
        return Err(map);
    }
    let mut slots: Vec<Value> = vec![Value::Null; len];
    for (key, value) in map {
        if let Ok(index) = key.parse::<usize>() {
            slots[index] = value;
        }
    }
    Ok(slots)
}

// =============================================================================
// QueryResult
// =============================================================================

/// Rows returned by [`Query::get`](crate::query::Query::get).
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    rows: Vec<Row>,
    total: Option<u64>,
}

impl QueryResult {
    /// Wraps raw driver rows, stripping synthetic columns.
    pub(crate) fn new(rows: Vec<Row>, total: Option<u64>, config: &QueryConfig) -> Self {
        let mut walker = Walker::new(Some(&config.correlation_prefix), config.max_result_depth);
        let rows = rows
            .into_iter()
            .map(|row| walker.row::<Value>(row).into_iter().collect())
            .collect();
        Self { rows, total }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The total row count before limit/offset, when requested with
    /// [`Query::with_total`](crate::query::Query::with_total).
    pub fn total_rows(&self) -> Option<u64> {
        self.total
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Map form.
    pub fn into_maps(self) -> Vec<Row> {
        self.rows
    }

    /// Attribute-object form.
    pub fn into_records(self) -> Vec<Record> {
        // Already stripped in `new`; this pass only reshapes.
        let mut walker = Walker::new(None, usize::MAX);
        self.rows
            .into_iter()
            .map(|row| Record {
                fields: walker.row::<Field>(row),
            })
            .collect()
    }

    /// Deserializes every row into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row.clone()))
                    .map_err(|e| RelqError::Mapping(e.to_string()))
            })
            .collect()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
