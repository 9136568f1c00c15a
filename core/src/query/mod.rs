//! Relation graph builder and query compiler.
//!
//! The pipeline: [`Query`] accepts plain clauses and relation declarations
//! (each a validated [`Spec`]). Declarations inside an open WHERE group are
//! queued so their fragments land inside that group. At execution time
//! [`compile`] turns the specs into correlated subqueries in a fixed order,
//! the statement runs, and [`exec`] eager-loads the declared relations with
//! one keyed fetch each, hash-joining the results onto the parent rows.

mod builder;
pub mod compile;
mod exec;
mod queue;
pub mod spec;

pub use builder::Query;
pub use spec::{
    AggregateColumn, AggregateFilterSpec, AggregateKind, AggregateSpec, ExistsSpec, HasSpec, Keys,
    Link, Polarity, Refine, Rel, RelCardinality, RelationSpec, Spec,
};
