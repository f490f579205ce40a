//! SQL dialect handling
//!
//! Query templates are written once with `?` placeholders and rewritten for
//! the backend that is configured at startup:
//! - MySQL keeps the ordinal `?` placeholders as-is
//! - PostgreSQL gets numbered `$1`, `$2`, ... placeholders
//!
//! The rewrite is a plain text transform. It tracks quoted regions and
//! comments so that a `?` inside `'what?'` is never treated as a placeholder.
//! PostgreSQL JSONB operators (`?`, `?|`, `?&`) are not supported in templates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect of the configured backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown SQL dialect '{0}'")]
pub struct ParseDialectError(pub String);

impl FromStr for Dialect {
    type Err = ParseDialectError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(ParseDialectError(other.to_string())),
        }
    }
}

/// Region of a template that was opened but never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotedRegion {
    StringLiteral,
    QuotedIdentifier,
    BacktickIdentifier,
    BlockComment,
}

impl fmt::Display for QuotedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StringLiteral => "string literal",
            Self::QuotedIdentifier => "quoted identifier",
            Self::BacktickIdentifier => "backtick identifier",
            Self::BlockComment => "block comment",
        };
        f.write_str(name)
    }
}

/// Malformed query template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("unterminated {region} starting at byte {offset}")]
    Unterminated { region: QuotedRegion, offset: usize },
}

/// A template rewritten for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub sql: String,
    /// Number of bind placeholders found in the template.
    pub placeholders: usize,
}

/// Rewrite `?` placeholders for the given dialect.
pub fn translate(sql: &str, dialect: Dialect) -> Result<String, TranslationError> {
    translate_counted(sql, dialect).map(|t| t.sql)
}

/// Count the bind placeholders in a template, lexed the way `dialect` reads it.
pub fn placeholder_count(sql: &str, dialect: Dialect) -> Result<usize, TranslationError> {
    translate_counted(sql, dialect).map(|t| t.placeholders)
}

/// Rewrite placeholders and report how many were found.
pub fn translate_counted(sql: &str, dialect: Dialect) -> Result<Translated, TranslationError> {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut placeholders = 0usize;

    for segment in segments(sql, dialect)? {
        let text = &sql[segment.start..segment.end];
        if segment.kind != SegmentKind::Code {
            out.push_str(text);
            continue;
        }
        for c in text.chars() {
            if c != '?' {
                out.push(c);
                continue;
            }
            placeholders += 1;
            match dialect {
                Dialect::Postgres => {
                    out.push('$');
                    out.push_str(&placeholders.to_string());
                }
                Dialect::MySql => out.push('?'),
            }
        }
    }

    Ok(Translated {
        sql: out,
        placeholders,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Plain SQL where placeholders and keywords live.
    Code,
    /// String literal or quoted identifier, delimiters included.
    Quoted,
    Comment,
}

/// Byte range of a template with uniform lexical meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub kind: SegmentKind,
    pub start: usize,
    pub end: usize,
}

/// Split a template into code, quoted and comment regions.
///
/// All delimiters are ASCII, so byte offsets always fall on char boundaries.
pub(crate) fn segments(sql: &str, dialect: Dialect) -> Result<Vec<Segment>, TranslationError> {
    let bytes = sql.as_bytes();
    let unterminated = |region, offset| TranslationError::Unterminated { region, offset };
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let (kind, end) = match bytes[i] {
            b'\'' => {
                // MySQL treats backslash as an escape inside literals.
                let end = scan_quoted(bytes, i, b'\'', dialect == Dialect::MySql)
                    .ok_or_else(|| unterminated(QuotedRegion::StringLiteral, i))?;
                (SegmentKind::Quoted, end)
            }
            b'"' => {
                let end = scan_quoted(bytes, i, b'"', false)
                    .ok_or_else(|| unterminated(QuotedRegion::QuotedIdentifier, i))?;
                (SegmentKind::Quoted, end)
            }
            b'`' => {
                let end = scan_quoted(bytes, i, b'`', false)
                    .ok_or_else(|| unterminated(QuotedRegion::BacktickIdentifier, i))?;
                (SegmentKind::Quoted, end)
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
                (SegmentKind::Comment, end)
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = bytes[i + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .map(|p| i + 2 + p + 2)
                    .ok_or_else(|| unterminated(QuotedRegion::BlockComment, i))?;
                (SegmentKind::Comment, end)
            }
            _ => {
                i += 1;
                continue;
            }
        };

        if code_start < i {
            out.push(Segment {
                kind: SegmentKind::Code,
                start: code_start,
                end: i,
            });
        }
        out.push(Segment {
            kind,
            start: i,
            end,
        });
        i = end;
        code_start = end;
    }

    if code_start < bytes.len() {
        out.push(Segment {
            kind: SegmentKind::Code,
            start: code_start,
            end: bytes.len(),
        });
    }
    Ok(out)
}

/// End (exclusive) of a quoted region opened at `start`; doubled quotes escape.
fn scan_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// "Now minus N days" in the syntax of the given dialect.
///
/// Callers must use this instead of embedding date arithmetic in templates.
pub fn interval_expression(days: u32, dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => format!("CURRENT_TIMESTAMP - INTERVAL '{days} days'"),
        Dialect::MySql => format!("DATE_SUB(CURRENT_TIMESTAMP, INTERVAL {days} DAY)"),
    }
}
