use crate::{MappingError, Result};
use std::ops::Range;

/// A SELECT statement cut into the clauses paging rewrites need.
///
/// Only the outermost level counts: anything inside parentheses, quotes or comments (subqueries,
/// window functions, string literals) is never taken for a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlParts<'a> {
    sql: &'a str,
    /// Right after the SELECT keyword.
    select_end: usize,
    /// Start of the column list, after DISTINCT if present.
    columns_start: usize,
    from_start: usize,
    /// Start of the ORDER BY clause, or the end of the statement.
    order_start: usize,
    distinct: bool,
}

impl<'a> SqlParts<'a> {
    pub fn parse(sql: &'a str) -> Result<Self> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        let unparsable = || MappingError::UnparsableSql {
            sql: sql.to_string(),
        };
        let words = top_level_words(sql);
        let is = |range: &Range<usize>, keyword: &str| {
            sql[range.clone()].eq_ignore_ascii_case(keyword)
        };
        let select = words
            .first()
            .filter(|w| is(*w, "SELECT"))
            .ok_or_else(unparsable)?;
        let distinct = words.get(1).filter(|w| is(*w, "DISTINCT"));
        let columns_start = distinct.map_or(select.end, |w| w.end);
        let from = words
            .iter()
            .skip(1)
            .find(|w| is(*w, "FROM"))
            .ok_or_else(unparsable)?;
        let order_start = words
            .windows(2)
            .rev()
            .find(|w| w[0].start > from.start && is(&w[0], "ORDER") && is(&w[1], "BY"))
            .map_or(sql.len(), |w| w[0].start);
        if sql[columns_start..from.start].trim().is_empty() {
            return Err(unparsable().into());
        }
        Ok(Self {
            sql,
            select_end: select.end,
            columns_start,
            from_start: from.start,
            order_start,
            distinct: distinct.is_some(),
        })
    }

    /// The whole statement, trimmed.
    pub fn sql(&self) -> &'a str {
        self.sql
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// The column list, without DISTINCT.
    pub fn columns(&self) -> &'a str {
        self.sql[self.columns_start..self.from_start].trim()
    }

    /// From the FROM keyword to the ORDER BY clause.
    pub fn from(&self) -> &'a str {
        self.sql[self.from_start..self.order_start].trim()
    }

    /// The ORDER BY clause including its keywords.
    pub fn order_by(&self) -> Option<&'a str> {
        (self.order_start < self.sql.len()).then(|| self.sql[self.order_start..].trim())
    }

    /// What follows the SELECT keyword, DISTINCT included, without the ORDER BY clause.
    pub fn select_removed(&self) -> &'a str {
        self.sql[self.select_end..self.order_start].trim()
    }

    /// The statement without its ORDER BY clause.
    pub fn without_order_by(&self) -> &'a str {
        self.sql[..self.order_start].trim_end()
    }

    /// Counts the rows of the statement, the ORDER BY clause is dropped.
    pub fn count_sql(&self) -> String {
        let mut out = String::with_capacity(self.order_start + 16);
        out.push_str(&self.sql[..self.select_end]);
        if self.distinct {
            out.push_str(" COUNT(DISTINCT ");
            out.push_str(self.columns());
            out.push_str(") ");
        } else {
            out.push_str(" COUNT(*) ");
        }
        out.push_str(self.from());
        out
    }
}

/// Byte ranges of the words at nesting level zero, outside of literals, quoted identifiers and
/// comments.
fn top_level_words(sql: &str) -> Vec<Range<usize>> {
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            c @ (b'\'' | b'"' | b'`') => i = skip_quoted(bytes, i, c),
            b'[' => i = skip_quoted(bytes, i, b']'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|c| *c == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = bytes[i + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            c if is_word(c) => {
                let start = i;
                while i < bytes.len() && is_word(bytes[i]) {
                    i += 1;
                }
                if depth == 0 {
                    words.push(start..i);
                }
            }
            _ => i += 1,
        }
    }
    words
}

/// Index right after the closing delimiter, a doubled delimiter is an escape.
fn skip_quoted(bytes: &[u8], start: usize, close: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_word(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'@' | b'#') || !c.is_ascii()
}
