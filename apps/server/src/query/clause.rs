//! Structural hints over opaque SQL text
//!
//! Templates are never parsed into an AST. The paginator only needs to know
//! where the top-level `FROM` and trailing `ORDER BY` are, and whether the
//! statement groups, deduplicates or combines result sets. Words inside
//! parentheses, literals, quoted identifiers and comments are ignored.

use crate::db::dialect::{segments, Dialect, SegmentKind, TranslationError};

#[derive(Debug, Clone)]
struct Word {
    upper: String,
    start: usize,
}

/// Top-level keywords of one statement.
#[derive(Debug, Clone)]
pub(crate) struct ClauseMap {
    words: Vec<Word>,
}

impl ClauseMap {
    pub(crate) fn scan(sql: &str, dialect: Dialect) -> Result<Self, TranslationError> {
        let mut words = Vec::new();
        let mut depth = 0usize;

        for segment in segments(sql, dialect)? {
            if segment.kind != SegmentKind::Code {
                continue;
            }
            let text = &sql[segment.start..segment.end];
            let mut chars = text.char_indices().peekable();
            while let Some((offset, c)) = chars.next() {
                match c {
                    '(' => depth += 1,
                    ')' => depth = depth.saturating_sub(1),
                    c if c.is_ascii_alphabetic() || c == '_' => {
                        let mut end = offset + c.len_utf8();
                        while let Some(&(next_offset, next)) = chars.peek() {
                            if next.is_ascii_alphanumeric() || next == '_' || next == '$' {
                                end = next_offset + next.len_utf8();
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        if depth == 0 {
                            words.push(Word {
                                upper: text[offset..end].to_ascii_uppercase(),
                                start: segment.start + offset,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(Self { words })
    }

    fn position(&self, keyword: &str) -> Option<usize> {
        self.words.iter().position(|w| w.upper == keyword)
    }

    /// Byte offset of the first top-level `first second` pair.
    fn pair_start(&self, first: &str, second: &str) -> Option<usize> {
        self.words
            .windows(2)
            .find(|w| w[0].upper == first && w[1].upper == second)
            .map(|w| w[0].start)
    }

    pub(crate) fn starts_with_select(&self) -> bool {
        self.words.first().is_some_and(|w| w.upper == "SELECT")
    }

    pub(crate) fn has_group_by(&self) -> bool {
        self.pair_start("GROUP", "BY").is_some()
    }

    fn has_distinct(&self) -> bool {
        self.words
            .windows(2)
            .any(|w| w[0].upper == "SELECT" && w[1].upper == "DISTINCT")
    }

    fn has_set_operation(&self) -> bool {
        self.words
            .iter()
            .any(|w| matches!(w.upper.as_str(), "UNION" | "INTERSECT" | "EXCEPT"))
    }

    /// Byte offset where the top-level `FROM` keyword begins.
    pub(crate) fn from_start(&self) -> Option<usize> {
        self.position("FROM").map(|i| self.words[i].start)
    }

    /// Byte offset of the last top-level `ORDER BY`, if nothing but the
    /// ordering follows it.
    pub(crate) fn trailing_order_by(&self) -> Option<usize> {
        let idx = self
            .words
            .windows(2)
            .rposition(|w| w[0].upper == "ORDER" && w[1].upper == "BY")?;
        let tail_has_clause = self.words[idx + 2..]
            .iter()
            .any(|w| matches!(w.upper.as_str(), "LIMIT" | "OFFSET" | "FETCH" | "FOR"));
        (!tail_has_clause).then(|| self.words[idx].start)
    }

    pub(crate) fn has_limit(&self) -> bool {
        self.position("LIMIT").is_some() || self.pair_start("FETCH", "FIRST").is_some()
    }

    /// Whether counting must wrap the statement in a subquery rather than
    /// replacing its select list.
    pub(crate) fn needs_wrapped_count(&self) -> bool {
        !self.starts_with_select()
            || self.has_group_by()
            || self.position("HAVING").is_some()
            || self.has_distinct()
            || self.has_set_operation()
            || self.from_start().is_none()
    }
}

/// Trim whitespace and a trailing statement terminator.
pub(crate) fn normalize(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}
