//! Identifier and expression whitelisting.
//!
//! Every name or expression a caller hands to the relation graph builder is
//! checked here before it is allowed anywhere near SQL text. Both checks are
//! pure functions of their input.
//!
//! Expressions are validated token by token: each bare word must be a
//! number, an allowed keyword, an approved function (when followed by `(`)
//! or itself a valid column identifier. That per-token rule is what stops a
//! second statement from hiding inside an aggregate column.

use std::sync::LazyLock;

use regex::Regex;
use relq_types::Dialect;

use crate::error::{RelqError, Result};

/// Maximum length of one identifier part.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Maximum length of a custom-column expression.
pub const MAX_CUSTOM_COLUMN_LEN: usize = 200;

/// Maximum length of a calculation expression.
pub const MAX_CALCULATION_LEN: usize = 500;

static COLUMN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid regex")
});

static TABLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

static ALIASED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\S+)\s+as\s+(\S+)\s*$").expect("valid regex"));

const FORBIDDEN_SEQUENCES: &[&str] = &[";", "'", "\"", "`", "--", "/*", "*/", "||", "&&"];

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "UNION",
    "EXEC", "EXECUTE", "GRANT", "REVOKE", "MERGE", "CALL", "DECLARE", "SHUTDOWN", "ATTACH",
    "DETACH", "PRAGMA",
];

const LOGICAL_OPERATORS: &[&str] = &["OR", "AND"];

const PROCEDURE_PREFIXES: &[&str] = &["xp_", "sp_"];

const CUSTOM_COLUMN_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "ABS", "ROUND", "CEIL", "CEILING", "FLOOR", "COALESCE",
    "IFNULL", "NULLIF", "LOWER", "UPPER", "LENGTH", "TRIM",
];

const CALCULATION_FUNCTIONS: &[&str] = &[
    "DATE", "DATETIME", "JULIANDAY", "STRFTIME", "DATEDIFF", "DATE_PART", "NOW", "IIF", "IF",
    "GREATEST", "LEAST", "MOD", "POWER", "SQRT",
];

const CUSTOM_COLUMN_KEYWORDS: &[&str] = &["NULL", "IS", "NOT", "AND", "OR", "DISTINCT"];

const CALCULATION_KEYWORDS: &[&str] = &["CASE", "WHEN", "THEN", "ELSE", "END", "IN", "BETWEEN"];

/// Which identifier form to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// `name` or `table.name`
    Column,
    /// `name` only
    Table,
}

/// Which expression grammar to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionMode {
    /// Aggregate column expressions such as `price * quantity`
    CustomColumn,
    /// Calculations; adds date and conditional functions
    Calculation,
}

impl ExpressionMode {
    pub const fn max_len(&self) -> usize {
        match self {
            ExpressionMode::CustomColumn => MAX_CUSTOM_COLUMN_LEN,
            ExpressionMode::Calculation => MAX_CALCULATION_LEN,
        }
    }

    fn allows_function(&self, name: &str) -> bool {
        let approved = |list: &[&str]| list.iter().any(|f| f.eq_ignore_ascii_case(name));
        match self {
            ExpressionMode::CustomColumn => approved(CUSTOM_COLUMN_FUNCTIONS),
            ExpressionMode::Calculation => {
                approved(CUSTOM_COLUMN_FUNCTIONS) || approved(CALCULATION_FUNCTIONS)
            }
        }
    }

    fn allows_keyword(&self, word: &str) -> bool {
        let listed = |list: &[&str]| list.iter().any(|k| k.eq_ignore_ascii_case(word));
        match self {
            ExpressionMode::CustomColumn => listed(CUSTOM_COLUMN_KEYWORDS),
            ExpressionMode::Calculation => {
                listed(CUSTOM_COLUMN_KEYWORDS) || listed(CALCULATION_KEYWORDS)
            }
        }
    }
}

/// Validates a column or table name.
///
/// ```
/// use relq_core::validate::{IdentifierKind, validate_identifier};
///
/// assert!(validate_identifier("user_name", IdentifierKind::Column).is_ok());
/// assert!(validate_identifier("user.name", IdentifierKind::Column).is_ok());
/// assert!(validate_identifier("user.name", IdentifierKind::Table).is_err());
/// assert!(validate_identifier("a; DROP TABLE x", IdentifierKind::Column).is_err());
/// ```
pub fn validate_identifier(name: &str, kind: IdentifierKind) -> Result<()> {
    if name.is_empty() {
        return Err(RelqError::invalid_identifier(name, "identifier is empty"));
    }
    if let Some(reason) = forbidden_sequence(name) {
        return Err(RelqError::invalid_identifier(name, reason));
    }
    let pattern = match kind {
        IdentifierKind::Column => &*COLUMN_PATTERN,
        IdentifierKind::Table => &*TABLE_PATTERN,
    };
    if !pattern.is_match(name) {
        let reason = match kind {
            IdentifierKind::Column => {
                "must be letters, digits and underscores, optionally qualified once with a dot"
            }
            IdentifierKind::Table => "must be letters, digits and underscores without a dot",
        };
        return Err(RelqError::invalid_identifier(name, reason));
    }
    for part in name.split('.') {
        if part.len() > MAX_IDENTIFIER_LEN {
            return Err(RelqError::invalid_identifier(
                name,
                "exceeds 64 characters",
            ));
        }
        if FORBIDDEN_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(part))
        {
            return Err(RelqError::invalid_identifier(name, "is a reserved SQL keyword"));
        }
        if LOGICAL_OPERATORS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(part))
        {
            return Err(RelqError::invalid_identifier(name, "is a logical operator"));
        }
        let lowered = part.to_ascii_lowercase();
        if PROCEDURE_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            return Err(RelqError::invalid_identifier(
                name,
                "uses a stored-procedure prefix",
            ));
        }
    }
    Ok(())
}

/// Validates a custom-column or calculation expression.
///
/// ```
/// use relq_core::validate::{ExpressionMode, validate_expression};
///
/// assert!(validate_expression("price * quantity", ExpressionMode::CustomColumn).is_ok());
/// assert!(validate_expression("SUM(price) - 1", ExpressionMode::CustomColumn).is_ok());
/// assert!(validate_expression("price) UNION SELECT (1", ExpressionMode::CustomColumn).is_err());
/// ```
pub fn validate_expression(expr: &str, mode: ExpressionMode) -> Result<()> {
    tokens_of(expr, mode).map(|_| ())
}

/// Rewrites every bare column in `expr` to `"alias"."column"`.
///
/// Keywords, approved functions and numbers are copied unchanged;
/// already-qualified columns are quoted but keep their own qualifier.
/// Spacing between tokens is preserved.
pub fn qualify_expression(
    expr: &str,
    alias: &str,
    mode: ExpressionMode,
    dialect: Dialect,
) -> Result<String> {
    let tokens = tokens_of(expr, mode)?;
    let mut out = String::with_capacity(expr.len() + 16);
    let mut cursor = 0;
    for (i, token) in tokens.iter().enumerate() {
        out.push_str(&expr[cursor..token.start]);
        cursor = token.end;
        let text = &expr[token.start..token.end];
        match token.kind {
            TokenKind::Word if is_function_call(&tokens, i) || mode.allows_keyword(text) => {
                out.push_str(text)
            }
            TokenKind::Word if text.contains('.') => dialect.write_identifier(text, &mut out),
            TokenKind::Word => {
                dialect.write_identifier(alias, &mut out);
                out.push('.');
                dialect.write_identifier(text, &mut out);
            }
            _ => out.push_str(text),
        }
    }
    out.push_str(&expr[cursor..]);
    Ok(out)
}

/// Splits `"orders as big_orders"` into the name and its explicit alias.
pub fn split_alias(raw: &str) -> (&str, Option<&str>) {
    match ALIASED_PATTERN.captures(raw) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(name), Some(alias)) => (name.as_str(), Some(alias.as_str())),
            _ => (raw.trim(), None),
        },
        None => (raw.trim(), None),
    }
}

fn forbidden_sequence(text: &str) -> Option<&'static str> {
    FORBIDDEN_SEQUENCES.iter().find_map(|seq| {
        text.contains(seq).then_some(match *seq {
            ";" => "contains a statement separator",
            "'" | "\"" | "`" => "contains a quote character",
            "--" | "/*" | "*/" => "contains a comment marker",
            _ => "contains a dialect logical operator",
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Number,
    Operator,
    Open,
    Close,
    Comma,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_function_call(tokens: &[Token], index: usize) -> bool {
    tokens
        .get(index + 1)
        .is_some_and(|next| next.kind == TokenKind::Open)
}

fn tokens_of(expr: &str, mode: ExpressionMode) -> Result<Vec<Token>> {
    if expr.trim().is_empty() {
        return Err(RelqError::invalid_expression(expr, "expression is empty"));
    }
    if expr.len() > mode.max_len() {
        return Err(RelqError::invalid_expression(
            expr,
            format!("exceeds {} characters", mode.max_len()),
        ));
    }
    if let Some(reason) = forbidden_sequence(expr) {
        return Err(RelqError::invalid_expression(expr, reason));
    }

    let tokens = tokenize(expr)?;

    let mut depth: i64 = 0;
    for token in &tokens {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => {
                depth -= 1;
                if depth < 0 {
                    return Err(RelqError::invalid_expression(
                        expr,
                        "unbalanced parentheses",
                    ));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(RelqError::invalid_expression(expr, "unbalanced parentheses"));
    }

    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Word {
            continue;
        }
        let word = &expr[token.start..token.end];
        if is_function_call(&tokens, i) {
            if !mode.allows_function(word) {
                return Err(RelqError::invalid_expression(
                    expr,
                    format!("function `{word}` is not allowed"),
                ));
            }
            continue;
        }
        if mode.allows_keyword(word) {
            continue;
        }
        if CALCULATION_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(word))
        {
            return Err(RelqError::invalid_expression(
                expr,
                format!("keyword `{word}` is only allowed in calculations"),
            ));
        }
        if let Err(RelqError::InvalidIdentifier { reason, .. }) =
            validate_identifier(word, IdentifierKind::Column)
        {
            return Err(RelqError::invalid_expression(
                expr,
                format!("token `{word}` {reason}"),
            ));
        }
    }

    Ok(tokens)
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                TokenKind::Word
            }
            b'0'..=b'9' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let literal = &expr[start..i];
                if literal.matches('.').count() > 1
                    || literal.ends_with('.')
                    || bytes
                        .get(i)
                        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
                {
                    return Err(RelqError::invalid_expression(
                        expr,
                        format!("malformed number near `{literal}`"),
                    ));
                }
                TokenKind::Number
            }
            b'(' => {
                i += 1;
                TokenKind::Open
            }
            b')' => {
                i += 1;
                TokenKind::Close
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'<' | b'>' | b'!' => {
                i += 1;
                if matches!(bytes.get(i), Some(b'=')) || (c == b'<' && bytes.get(i) == Some(&b'>'))
                {
                    i += 1;
                } else if c == b'!' {
                    return Err(RelqError::invalid_expression(
                        expr,
                        "unexpected character `!`",
                    ));
                }
                TokenKind::Operator
            }
            b'=' | b'+' | b'-' | b'*' | b'/' | b'%' => {
                i += 1;
                TokenKind::Operator
            }
            _ => {
                let ch = expr[start..].chars().next().unwrap_or('?');
                return Err(RelqError::invalid_expression(
                    expr,
                    format!("unexpected character `{ch}`"),
                ));
            }
        };
        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }

    Ok(tokens)
}
