//! # relq
//!
//! Declarative relation and aggregate loading, compiled to correlated SQL.
//!
//! ## Quick Start
//!
//! ```rust
//! use relq::prelude::*;
//!
//! # fn main() -> relq::Result<()> {
//! let conn = rusqlite::Connection::open_in_memory().unwrap();
//! conn.execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
//!      CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, amount REAL);
//!      INSERT INTO users VALUES (1, 'ada'), (2, 'brian');
//!      INSERT INTO orders VALUES (1, 1, 600), (2, 1, 700), (3, 2, 20);",
//! )
//! .unwrap();
//!
//! let db = Relq::new(conn);
//! let mut query = db.query("users")?;
//! query
//!     .with_many(Rel::new("orders", "user_id", "id"))?
//!     .with_sum(Rel::new("orders", "user_id", "id"), "amount")?
//!     .where_aggregate("orders_sum >", 1000)?;
//!
//! let rows = db.get(query)?.into_maps();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0]["name"], "ada");
//! assert_eq!(rows[0]["orders"].as_array().map(Vec::len), Some(2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Enables                                   |
//! |-------------|---------|-------------------------------------------|
//! | `rusqlite`  | yes     | [`Driver`] for `rusqlite::Connection`     |
//! | `tracing`   | yes     | debug events for every statement issued   |
//! | `profiling` | no      | puffin scopes around compile and fetch    |

mod session;

pub use session::Relq;

pub use relq_core as core;
pub use relq_core::{
    AggregateKind, Combinator, CompareOp, Dialect, Driver, DriverError, ExecutionDiagnostic,
    Field, JoinType, OrderBy, Polarity, Query, QueryConfig, QueryResult, Record, Rel,
    RelCardinality, RelqError, Result, Row,
};
pub use relq_core::{relq_profile_scope, relq_trace_load, relq_trace_query};

pub mod prelude {
    pub use crate::Relq;
    pub use relq_core::{
        Dialect, Driver, JoinType, OrderBy, Query, QueryConfig, QueryResult, Rel, RelqError,
    };
}
