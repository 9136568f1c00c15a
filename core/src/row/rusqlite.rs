//! [`Driver`] impl for [`rusqlite::Connection`].

use ::rusqlite::types::ValueRef;
use serde_json::{Number, Value};

use crate::error::DriverError;
use crate::row::Row;
use crate::traits::Driver;

impl Driver for ::rusqlite::Connection {
    fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        let mut stmt = self.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::with_capacity(names.len());
            for (offset, name) in names.iter().enumerate() {
                map.insert(name.clone(), value_at(row.get_ref(offset)?));
            }
            out.push(map);
        }
        Ok(out)
    }
}

fn value_at(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        // NaN and infinities have no JSON form
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
