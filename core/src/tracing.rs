//! Tracing utilities for query compilation and eager-load observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and the execution phase.
///
/// ```ignore
/// relq_trace_query!(&sql, "base");
/// relq_trace_query!(&sql, "eager");
/// ```
#[macro_export]
macro_rules! relq_trace_query {
    ($sql:expr, $phase:literal) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(sql = %$sql, phase = $phase, "relq.query");
    };
}

/// Emit a debug-level tracing event for one eager-loaded relation.
///
/// ```ignore
/// relq_trace_load!(spec.alias(), keys.len(), children.len());
/// ```
#[macro_export]
macro_rules! relq_trace_load {
    ($relation:expr, $keys:expr, $rows:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(
            relation = %$relation,
            keys = $keys,
            rows = $rows,
            "relq.eager_load"
        );
    };
}
