//! WHERE-clause tokens, combinators and comparison operators.
//!
//! Conditions are stored as a flat token stream and joined at render time:
//! the first condition overall, and the first condition after a group
//! opens, carry no combinator. That keeps `group_start()` followed by
//! `or_where()` from rendering `( OR ...`.

use crate::error::{RelqError, Result};

/// How a condition attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

/// Comparison operators accepted for has-counts and aggregate filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text.trim() {
            "=" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::NotEq,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::LtEq,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::GtEq,
            _ => return None,
        })
    }

    pub const fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// Operators accepted in `where("column op", value)` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Compare(CompareOp),
    Like,
    NotLike,
    Is,
    IsNot,
}

impl ConditionOp {
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(op) = CompareOp::parse(text) {
            return Some(ConditionOp::Compare(op));
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        let is = |w: &str, k: &str| w.eq_ignore_ascii_case(k);
        match words.as_slice() {
            [w] if is(w, "LIKE") => Some(ConditionOp::Like),
            [w] if is(w, "IS") => Some(ConditionOp::Is),
            [a, b] if is(a, "NOT") && is(b, "LIKE") => Some(ConditionOp::NotLike),
            [a, b] if is(a, "IS") && is(b, "NOT") => Some(ConditionOp::IsNot),
            _ => None,
        }
    }

    pub const fn as_sql(&self) -> &'static str {
        match self {
            ConditionOp::Compare(op) => op.as_sql(),
            ConditionOp::Like => "LIKE",
            ConditionOp::NotLike => "NOT LIKE",
            ConditionOp::Is => "IS",
            ConditionOp::IsNot => "IS NOT",
        }
    }
}

/// Splits `"age >="` into `("age", >=)`. A key without an operator means `=`.
pub fn parse_condition_key(key: &str) -> Result<(&str, ConditionOp)> {
    let key = key.trim();
    let split = key
        .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '=' | '!'))
        .unwrap_or(key.len());
    let (column, rest) = key.split_at(split);
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok((column, ConditionOp::Compare(CompareOp::Eq)));
    }
    ConditionOp::parse(rest)
        .map(|op| (column, op))
        .ok_or_else(|| RelqError::InvalidParameter(format!("unsupported operator `{rest}`")))
}

#[derive(Debug, Clone)]
pub(crate) enum WhereToken {
    Condition { combinator: Combinator, sql: String },
    Open { combinator: Combinator, negate: bool },
    Close,
    /// Reserved position for a fragment compiled later.
    Slot { combinator: Combinator, id: usize },
}

pub(crate) fn render_where(tokens: &[WhereToken]) -> Result<Option<String>> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut sql = String::with_capacity(64);
    let mut leading = true;
    fn attach(sql: &mut String, leading: &mut bool, combinator: Combinator) {
        if !*leading {
            sql.push(' ');
            sql.push_str(combinator.as_sql());
            sql.push(' ');
        }
        *leading = false;
    }
    for token in tokens {
        match token {
            WhereToken::Condition { combinator, sql: fragment } => {
                attach(&mut sql, &mut leading, *combinator);
                sql.push_str(fragment);
            }
            WhereToken::Open { combinator, negate } => {
                attach(&mut sql, &mut leading, *combinator);
                if *negate {
                    sql.push_str("NOT ");
                }
                sql.push('(');
                leading = true;
            }
            WhereToken::Close => {
                sql.push(')');
                leading = false;
            }
            WhereToken::Slot { .. } => {
                return Err(RelqError::Compile(
                    "deferred WHERE condition was never compiled".into(),
                ));
            }
        }
    }
    Ok(Some(sql))
}
