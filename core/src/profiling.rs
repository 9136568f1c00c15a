//! Profiling utilities for subquery synthesis and eager loading
//!
//! This module provides integration with the puffin profiler to track
//! compilation and fetch performance when the "profiling" feature is enabled.

/// Opens a puffin scope for the rest of the enclosing block.
///
/// ```ignore
/// relq_profile_scope!("relq", "finalize");
/// ```
#[macro_export]
macro_rules! relq_profile_scope {
    ($category:literal, $operation:literal) => {
        #[cfg(feature = "profiling")]
        ::puffin::profile_scope!($category, $operation);
    };
}
