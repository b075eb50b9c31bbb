//! Named-parameter queries: `:name` → positional markers plus an ordered name list.

use crate::bind::{BindMode, BindSource};
use crate::error::{BindError, BindResult};
use crate::lexer::{LexerConfig, TokenKind, Tokenizer};
use crate::style::PlaceholderStyle;
use crate::value::Value;
use crate::values::{expand_values, values_tuple};

/// A compiled named query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    /// The query rewritten for the target style.
    pub sql: String,
    /// One name per `:name` occurrence, in order, duplicates included.
    pub names: Vec<String>,
}

/// Compile `:name` parameters for `style`.
///
/// `Named` keeps the original `:name` text; `Question`/`Unknown` emit `?`; `Dollar` and `At`
/// number each occurrence (`$1`, `@p1`, ...), so a repeated name gets a new number each time.
///
/// ```
/// use sqlbind::{compile_named, PlaceholderStyle};
///
/// let q = compile_named(
///     "SELECT * FROM person WHERE first_name=:name1 AND last_name=:name2",
///     PlaceholderStyle::Question,
/// );
/// assert_eq!(q.sql, "SELECT * FROM person WHERE first_name=? AND last_name=?");
/// assert_eq!(q.names, ["name1", "name2"]);
/// ```
pub fn compile_named(sql: &str, style: PlaceholderStyle) -> NamedQuery {
    compile_named_with(sql, style, LexerConfig::for_named(style))
}

/// [`compile_named`] with an explicit tokenizer configuration.
pub fn compile_named_with(sql: &str, style: PlaceholderStyle, config: LexerConfig) -> NamedQuery {
    let mut out = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut n = 0;

    for token in Tokenizer::new(sql, config) {
        if token.kind != TokenKind::ColonWord {
            out.push_str(token.text);
            continue;
        }
        names.push(token.text[1..].to_string());
        match style {
            PlaceholderStyle::Named => out.push_str(token.text),
            _ => {
                n += 1;
                style.write_marker(n, &mut out);
            }
        }
    }

    NamedQuery { sql: out, names }
}

/// Compile a named query and bind `arg` to it, failing on missing names.
pub fn bind_named<A: BindSource + ?Sized>(
    style: PlaceholderStyle,
    sql: &str,
    arg: &A,
) -> BindResult<(String, Vec<Value>)> {
    bind_named_with(style, sql, arg, BindMode::Strict)
}

/// Compile a named query and bind `arg` to it.
pub fn bind_named_with<A: BindSource + ?Sized>(
    style: PlaceholderStyle,
    sql: &str,
    arg: &A,
    mode: BindMode,
) -> BindResult<(String, Vec<Value>)> {
    let compiled = compile_named(sql, style);
    let args = arg.bind_values(&compiled.names, mode)?;
    Ok((compiled.sql, args))
}

/// Bind a batch of rows to a single-row `INSERT ... VALUES (:a, :b)` statement.
///
/// The `VALUES` tuple is repeated once per row before compiling, so each copy binds its own
/// row. Names outside the tuple (`ON CONFLICT ... = :x`) bind from the first row.
pub fn bind_named_batch<A: BindSource>(
    style: PlaceholderStyle,
    sql: &str,
    rows: &[A],
    mode: BindMode,
) -> BindResult<(String, Vec<Value>)> {
    if rows.is_empty() {
        return Err(BindError::UnsupportedArgument(
            "cannot bind an empty batch".to_string(),
        ));
    }

    let Ok((open, close)) = values_tuple(sql) else {
        if rows.len() > 1 {
            tracing::warn!(
                target: "sqlbind.bind",
                rows = rows.len(),
                "batch insert has no expandable VALUES tuple; arguments will not match placeholders"
            );
        }
        let compiled = compile_named(sql, style);
        let mut args = Vec::with_capacity(compiled.names.len() * rows.len());
        for row in rows {
            args.extend(row.bind_values(&compiled.names, mode)?);
        }
        return Ok((compiled.sql, args));
    };

    let expanded = expand_values(sql, rows.len()).sql;
    let stride = close - open + 1;
    let tuples_end = open + stride * rows.len() - 1;
    let row_at = |offset: usize| {
        if offset < open || offset >= tuples_end {
            0
        } else {
            ((offset - open) / stride).min(rows.len() - 1)
        }
    };

    let mut out = String::with_capacity(expanded.len());
    let mut row_names = vec![Vec::new(); rows.len()];
    let mut row_slots = vec![Vec::new(); rows.len()];
    let mut offset = 0;
    let mut n = 0;
    for token in Tokenizer::new(&expanded, LexerConfig::for_named(style)) {
        if token.kind == TokenKind::ColonWord {
            let row = row_at(offset);
            row_slots[row].push(n);
            row_names[row].push(token.text[1..].to_string());
            n += 1;
            match style {
                PlaceholderStyle::Named => out.push_str(token.text),
                _ => style.write_marker(n, &mut out),
            }
        } else {
            out.push_str(token.text);
        }
        offset += token.text.len();
    }

    let mut args = vec![Value::Null; n];
    for ((row, names), slots) in rows.iter().zip(&row_names).zip(&row_slots) {
        for (slot, value) in slots.iter().zip(row.bind_values(names, mode)?) {
            args[*slot] = value;
        }
    }
    Ok((out, args))
}

/// Bind a named query whose arguments may contain lists, expanding them for `IN (...)`.
///
/// A list-valued name becomes one marker per element. Every marker is numbered, so `Named`
/// targets get `:arg1, :arg2, ...`. Bare `?` text is left alone, as in [`compile_named`].
pub fn named_in<A: BindSource + ?Sized>(
    style: PlaceholderStyle,
    sql: &str,
    arg: &A,
    mode: BindMode,
) -> BindResult<(String, Vec<Value>)> {
    let tokens: Vec<_> = Tokenizer::new(sql, LexerConfig::for_named(style)).collect();
    let names: Vec<String> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::ColonWord)
        .map(|t| t.text[1..].to_string())
        .collect();
    let values = arg.bind_values(&names, mode)?;
    if values.len() != names.len() {
        return Err(BindError::TooManyPlaceholders {
            placeholders: names.len(),
            arguments: values.len(),
        });
    }

    let mut out = String::with_capacity(sql.len());
    let mut args = Vec::with_capacity(values.len());
    let mut values = values.into_iter().enumerate();
    let mut n = 0;
    for token in tokens {
        if token.kind != TokenKind::ColonWord {
            out.push_str(token.text);
            continue;
        }
        let Some((position, value)) = values.next() else {
            break;
        };
        match value {
            Value::List(items) if items.is_empty() => {
                return Err(BindError::EmptySlice { position });
            }
            Value::List(items) => {
                for i in 0..items.len() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    n += 1;
                    style.write_marker(n, &mut out);
                }
                args.extend(items);
            }
            scalar => {
                n += 1;
                style.write_marker(n, &mut out);
                args.push(scalar);
            }
        }
    }
    Ok((out, args))
}
