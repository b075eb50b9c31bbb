//! Rewrite `?` placeholders into a target dialect's positional markers.

use crate::lexer::{LexerConfig, TokenKind, Tokenizer};
use crate::style::PlaceholderStyle;
use std::borrow::Cow;

/// Rewrite a `?`-style query for `style`.
///
/// `Question` and `Unknown` return the input unchanged. Otherwise each `?` outside literals and
/// comments becomes `$N`, `@pN` or `:argN`, numbered from 1 on every call.
///
/// ```
/// use sqlbind::{rebind, PlaceholderStyle};
///
/// assert_eq!(rebind(PlaceholderStyle::Dollar, "VALUES (?, ?)"), "VALUES ($1, $2)");
/// assert_eq!(rebind(PlaceholderStyle::At, "VALUES (?, ?)"), "VALUES (@p1, @p2)");
/// ```
pub fn rebind(style: PlaceholderStyle, sql: &str) -> Cow<'_, str> {
    if style.is_question() {
        return Cow::Borrowed(sql);
    }

    let config = LexerConfig::for_rebind(style);
    let marks = sql.bytes().filter(|b| *b == b'?').count();
    if marks == 0 {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len() + marks * style.marker_growth(marks));
    let mut n = 0;
    for token in Tokenizer::new(sql, config) {
        if token.kind == TokenKind::QuestionMark {
            n += 1;
            style.write_marker(n, &mut out);
        } else {
            out.push_str(token.text);
        }
    }
    Cow::Owned(out)
}

/// Count the bindvars a query contains in `style`'s native syntax.
///
/// For `Dollar` and `At` this is the number of distinct marker names (`$1` used twice counts
/// once); for `Question` every `?` counts, and for `Named` every `:name` occurrence counts.
pub fn count_placeholders(style: PlaceholderStyle, sql: &str) -> usize {
    let tokens = Tokenizer::new(sql, LexerConfig::for_style(style)).filter(|t| t.is_placeholder());
    match style {
        PlaceholderStyle::Dollar | PlaceholderStyle::At => {
            let mut seen: Vec<&str> = tokens.map(|t| t.text).collect();
            seen.sort_unstable();
            seen.dedup();
            seen.len()
        }
        _ => tokens.count(),
    }
}
