use std::fmt;
use std::panic::Location;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelqError {
    /// A column or table name failed validation
    #[error("Invalid identifier `{name}`: {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },

    /// A custom column or calculation expression failed validation
    #[error("Invalid expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },

    /// Foreign and local key lists differ in length
    #[error(
        "Key count mismatch for relation `{relation}`: {foreign} foreign key(s) but {local} local key(s)"
    )]
    KeyCountMismatch {
        relation: String,
        foreign: usize,
        local: usize,
    },

    /// An aggregate filter names an alias no prior aggregate declared
    #[error("Unresolved aggregate alias `{0}`: declare the aggregate before filtering on it")]
    UnresolvedAlias(String),

    /// Two aggregates were declared under the same alias
    #[error("Duplicate aggregate alias `{0}`")]
    DuplicateAlias(String),

    /// An operator, count or similar argument is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// `group_end` without a matching `group_start`, or a group left open
    #[error("Unbalanced WHERE group: {0}")]
    UnbalancedGroup(&'static str),

    /// Nested refinements went deeper than the configured maximum
    #[error("Recursion limit of {0} nested subqueries exceeded")]
    RecursionLimit(usize),

    /// The query could not be rendered (e.g. no base table)
    #[error("Compile error: {0}")]
    Compile(String),

    /// Invalid configuration document or value
    #[error("Config error: {0}")]
    Config(String),

    /// Error mapping result rows into caller types
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The driver rejected a statement
    #[error("{0}")]
    Execution(Box<ExecutionDiagnostic>),
}

impl RelqError {
    /// Errors raised while declaring specs, before any SQL is built.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RelqError::InvalidIdentifier { .. }
                | RelqError::InvalidExpression { .. }
                | RelqError::KeyCountMismatch { .. }
                | RelqError::UnresolvedAlias(_)
                | RelqError::DuplicateAlias(_)
                | RelqError::InvalidParameter(_)
                | RelqError::UnbalancedGroup(_)
                | RelqError::Config(_)
        )
    }

    /// Errors raised while finalizing a query into SQL text.
    pub fn is_compilation(&self) -> bool {
        matches!(self, RelqError::Compile(_) | RelqError::RecursionLimit(_))
    }

    /// The diagnostic attached to an execution error, if any.
    pub fn diagnostic(&self) -> Option<&ExecutionDiagnostic> {
        match self {
            RelqError::Execution(diag) => Some(diag),
            _ => None,
        }
    }

    pub(crate) fn invalid_identifier(name: &str, reason: &'static str) -> Self {
        RelqError::InvalidIdentifier {
            name: name.to_string(),
            reason,
        }
    }

    pub(crate) fn invalid_expression(expr: &str, reason: impl Into<String>) -> Self {
        RelqError::InvalidExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a [`Driver`](crate::Driver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Driver-specific error code, when the driver exposes one
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

#[cfg(feature = "rusqlite")]
impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(e, _) => Some(format!("{:?}", e.code)),
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

/// Everything known about a failed statement: the driver's code and
/// message, the SQL text and the call site that requested execution.
#[derive(Debug, Clone)]
pub struct ExecutionDiagnostic {
    pub code: Option<String>,
    pub message: String,
    pub sql: String,
    pub location: &'static Location<'static>,
}

impl ExecutionDiagnostic {
    pub(crate) fn new(
        err: DriverError,
        sql: impl Into<String>,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            code: err.code,
            message: err.message,
            sql: sql.into(),
            location,
        }
    }
}

impl fmt::Display for ExecutionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Execution error")?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        write!(
            f,
            ": {}\n  SQL: {}\n  at {}:{}",
            self.message,
            self.sql,
            self.location.file(),
            self.location.line()
        )
    }
}

/// Result type for relq operations
pub type Result<T> = std::result::Result<T, RelqError>;
