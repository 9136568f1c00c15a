//! Query compiler configuration.
//!
//! ```
//! use relq_core::{Dialect, QueryConfig};
//!
//! let config = QueryConfig::from_toml_str(
//!     r#"
//!     dialect = "postgresql"
//!     max_depth = 8
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.dialect, Dialect::PostgreSQL);
//! assert_eq!(config.max_result_depth, 20);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RelqError, Result};
use crate::validate::{IdentifierKind, validate_identifier};
use relq_types::Dialect;

/// Default recursion guard for nested refinements and eager loads.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Default depth cap for the result wrapper's synthetic-column strip.
pub const DEFAULT_MAX_RESULT_DEPTH: usize = 20;

/// Reserved prefix for synthetic correlation columns.
pub const DEFAULT_CORRELATION_PREFIX: &str = "__rq_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Dialect used for identifier quoting and literal escaping
    pub dialect: Dialect,
    /// Maximum nesting of refinement sub-contexts and eager loads
    pub max_depth: usize,
    /// Maximum nesting the result wrapper walks when stripping synthetic columns
    pub max_result_depth: usize,
    /// Column-name prefix reserved for synthetic correlation columns
    pub correlation_prefix: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_result_depth: DEFAULT_MAX_RESULT_DEPTH,
            correlation_prefix: DEFAULT_CORRELATION_PREFIX.to_string(),
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: QueryConfig =
            toml::from_str(source).map_err(|e| RelqError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_result_depth(mut self, depth: usize) -> Self {
        self.max_result_depth = depth;
        self
    }

    pub fn with_correlation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.correlation_prefix = prefix.into();
        self
    }

    /// Checks the values a caller may have set by hand.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(RelqError::Config("max_depth must be at least 1".into()));
        }
        if self.max_result_depth == 0 {
            return Err(RelqError::Config(
                "max_result_depth must be at least 1".into(),
            ));
        }
        validate_identifier(&self.correlation_prefix, IdentifierKind::Table).map_err(|e| {
            RelqError::Config(format!("correlation_prefix is not a valid identifier: {e}"))
        })
    }

    /// The synthetic column name a local correlation key is projected
    /// under. Qualified keys keep their qualifier, `users.id` becoming
    /// `{prefix}users__id`, so keys from different tables never share a name.
    pub(crate) fn correlation_column(&self, key: &str) -> String {
        let mut name = String::with_capacity(self.correlation_prefix.len() + key.len() + 1);
        name.push_str(&self.correlation_prefix);
        for (i, part) in key.split('.').enumerate() {
            if i > 0 {
                name.push_str("__");
            }
            name.push_str(part);
        }
        name
    }

    /// The synthetic column name carrying `column` for correlation.
    pub(crate) fn synthetic_column(&self, column: &str) -> String {
        let mut name = String::with_capacity(self.correlation_prefix.len() + column.len());
        name.push_str(&self.correlation_prefix);
        name.push_str(column);
        name
    }
}
