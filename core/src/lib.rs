//! Relation and aggregate query compiler.
//!
//! Declare related data on a [`Query`] (eager-loaded relations, aggregate
//! columns, existence and count conditions, filters over aggregates) and it
//! compiles the declarations into correlated SQL, runs them through a
//! [`Driver`] and reassembles nested result rows.

pub mod config;
pub mod error;
pub mod profiling;
pub mod query;
pub mod row;
pub mod sql;
pub mod tracing;
pub mod traits;
pub mod validate;

pub use config::QueryConfig;
pub use error::{DriverError, ExecutionDiagnostic, RelqError, Result};
pub use query::{AggregateKind, Polarity, Query, Rel, RelCardinality};
pub use relq_types::Dialect;
pub use row::{Field, QueryResult, Record, Row};
pub use sql::{Combinator, CompareOp, JoinType, OrderBy, Statement};
pub use traits::*;
pub use validate::{ExpressionMode, IdentifierKind, validate_expression, validate_identifier};
