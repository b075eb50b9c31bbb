//! Multi-row `VALUES` expansion for batch inserts.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Result of [`expand_values`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesExpansion<'a> {
    pub sql: Cow<'a, str>,
    /// `false` when no `) VALUES (` tuple was found or its parentheses never balance;
    /// `sql` is then the input unchanged.
    pub expanded: bool,
}

fn values_re() -> &'static Regex {
    static VALUES_RE: OnceLock<Regex> = OnceLock::new();
    VALUES_RE.get_or_init(|| {
        Regex::new(r"(?i)\)\s*VALUES\s*\(").expect("invalid built-in VALUES regex")
    })
}

/// Byte offset one past the `)` closing the tuple whose `(` is at `open`.
fn tuple_end(sql: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in sql.as_bytes()[open..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte span `(open, close)` of the first `VALUES (...)` tuple, parentheses included.
pub(crate) fn values_tuple(sql: &str) -> Result<(usize, usize), &'static str> {
    let m = values_re().find(sql).ok_or("no VALUES clause")?;
    let open = m.end() - 1;
    let close = tuple_end(sql, open).ok_or("unbalanced parentheses")?;
    Ok((open, close))
}

/// Repeat the first `VALUES (...)` tuple so the statement inserts `rows` rows.
///
/// ```
/// use sqlbind::expand_values;
///
/// let out = expand_values("INSERT INTO foo (a,b) VALUES (:a, :b)", 2);
/// assert_eq!(out.sql, "INSERT INTO foo (a,b) VALUES (:a, :b),(:a, :b)");
/// assert!(out.expanded);
/// ```
///
/// Queries without a recognizable tuple are returned unchanged with `expanded == false`.
pub fn expand_values(sql: &str, rows: usize) -> ValuesExpansion<'_> {
    let unchanged = |reason: &'static str| {
        tracing::debug!(target: "sqlbind.bind", reason, rows, "VALUES clause not expanded");
        ValuesExpansion {
            sql: Cow::Borrowed(sql),
            expanded: false,
        }
    };

    let (open, close) = match values_tuple(sql) {
        Ok(span) => span,
        Err(reason) => return unchanged(reason),
    };

    if rows <= 1 {
        return ValuesExpansion {
            sql: Cow::Borrowed(sql),
            expanded: true,
        };
    }

    let tuple = &sql[open..close];
    let mut out = String::with_capacity(sql.len() + (tuple.len() + 1) * (rows - 1));
    out.push_str(&sql[..close]);
    for _ in 1..rows {
        out.push(',');
        out.push_str(tuple);
    }
    out.push_str(&sql[close..]);

    ValuesExpansion {
        sql: Cow::Owned(out),
        expanded: true,
    }
}
