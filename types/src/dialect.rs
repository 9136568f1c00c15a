//! Unified database dialect enum
//!
//! The dialect decides the identifier quote character, how booleans are
//! written as literals and whether backslashes inside string literals need
//! escaping. Everything else the query compiler emits is plain ANSI SQL.

/// SQL dialect for database-specific rendering
///
/// # Examples
///
/// ```
/// use relq_types::Dialect;
///
/// assert_eq!(Dialect::SQLite.quote_identifier("users.id"), r#""users"."id""#);
/// assert_eq!(Dialect::MySQL.quote_identifier("users.*"), "`users`.*");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// SQLite - double-quoted identifiers, `1`/`0` booleans
    ///
    /// Compatible with: rusqlite, libsql, turso
    #[default]
    SQLite,

    /// PostgreSQL - double-quoted identifiers, `TRUE`/`FALSE` booleans
    PostgreSQL,

    /// MySQL - backtick identifiers, backslash-escaping string literals
    MySQL,
}

impl Dialect {
    /// Parse a dialect from a string (case-insensitive)
    ///
    /// Supports various common aliases:
    /// - SQLite: `"sqlite"`, `"turso"`, `"libsql"`
    /// - PostgreSQL: `"postgresql"`, `"postgres"`, `"pg"`
    /// - MySQL: `"mysql"`
    ///
    /// ```
    /// use relq_types::Dialect;
    ///
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("unknown"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite")
            || s.eq_ignore_ascii_case("turso")
            || s.eq_ignore_ascii_case("libsql")
        {
            Some(Dialect::SQLite)
        } else if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") {
            Some(Dialect::MySQL)
        } else {
            None
        }
    }

    /// The character used to quote identifiers.
    #[inline]
    #[must_use]
    pub const fn quote_char(&self) -> char {
        match self {
            Dialect::SQLite | Dialect::PostgreSQL => '"',
            Dialect::MySQL => '`',
        }
    }

    /// Quotes an identifier, treating each dot-separated part separately.
    ///
    /// A `*` part is left bare so `users.*` stays a star projection. Quote
    /// characters inside a part are doubled.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        self.write_identifier(name, &mut out);
        out
    }

    /// Writes a quoted identifier into `buf` (see [`Dialect::quote_identifier`]).
    pub fn write_identifier(&self, name: &str, buf: &mut String) {
        let quote = self.quote_char();
        for (i, part) in name.split('.').enumerate() {
            if i > 0 {
                buf.push('.');
            }
            if part == "*" {
                buf.push('*');
                continue;
            }
            buf.push(quote);
            for c in part.chars() {
                if c == quote {
                    buf.push(quote);
                }
                buf.push(c);
            }
            buf.push(quote);
        }
    }

    /// Writes `text` as a single-quoted string literal.
    #[must_use]
    pub fn escape_str(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if *self == Dialect::MySQL => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Boolean literal for this dialect.
    #[inline]
    #[must_use]
    pub const fn bool_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::PostgreSQL, true) => "TRUE",
            (Dialect::PostgreSQL, false) => "FALSE",
            (_, true) => "1",
            (_, false) => "0",
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or(DialectParseError)
    }
}

/// Error returned when parsing an unknown dialect string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectParseError;

impl core::fmt::Display for DialectParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unknown dialect")
    }
}

impl std::error::Error for DialectParseError {}
