//! `IN (?)` expansion of list arguments.

use crate::error::{BindError, BindResult};
use crate::lexer::{LexerConfig, TokenKind, Tokenizer};
use crate::style::PlaceholderStyle;
use crate::value::Value;
use std::borrow::Cow;

/// Expand every [`Value::List`] argument into one `?` per element.
///
/// The query must use `?` placeholders. If no argument is a list the query and arguments are
/// returned untouched and the placeholder count is not checked.
///
/// ```
/// use sqlbind::{expand_slices, Value};
///
/// let (sql, args) = expand_slices("SELECT * FROM t WHERE v in (?)", vec![Value::list([1, 2, 3])])?;
/// assert_eq!(sql, "SELECT * FROM t WHERE v in (?, ?, ?)");
/// assert_eq!(args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
/// # Ok::<(), sqlbind::BindError>(())
/// ```
pub fn expand_slices(sql: &str, args: Vec<Value>) -> BindResult<(Cow<'_, str>, Vec<Value>)> {
    let mut extra = 0usize;
    let mut any_list = false;
    for (position, arg) in args.iter().enumerate() {
        if let Value::List(items) = arg {
            if items.is_empty() {
                return Err(BindError::EmptySlice { position });
            }
            any_list = true;
            extra += items.len() - 1;
        }
    }
    if !any_list {
        return Ok((Cow::Borrowed(sql), args));
    }

    let supplied = args.len();
    let mut out = String::with_capacity(sql.len() + extra * 3);
    let mut flat = Vec::with_capacity(supplied + extra);
    let mut pending = args.into_iter();
    let mut placeholders = 0usize;

    let config = LexerConfig::for_rebind(PlaceholderStyle::Question);
    for token in Tokenizer::new(sql, config) {
        out.push_str(token.text);
        if token.kind != TokenKind::QuestionMark {
            continue;
        }
        placeholders += 1;
        match pending.next() {
            Some(Value::List(items)) => {
                for _ in 1..items.len() {
                    out.push_str(", ?");
                }
                flat.extend(items);
            }
            Some(scalar) => flat.push(scalar),
            None => {
                return Err(BindError::TooManyPlaceholders {
                    placeholders: placeholders_in(sql),
                    arguments: supplied,
                });
            }
        }
    }

    if placeholders < supplied {
        return Err(BindError::TooManyArguments {
            placeholders,
            arguments: supplied,
        });
    }

    Ok((Cow::Owned(out), flat))
}

fn placeholders_in(sql: &str) -> usize {
    Tokenizer::new(sql, LexerConfig::for_rebind(PlaceholderStyle::Question))
        .filter(|t| t.kind == TokenKind::QuestionMark)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(v: &[i64]) -> Vec<Value> {
        v.iter().map(|i| Value::Int(*i)).collect()
    }

    #[test]
    fn expands_single_list() {
        let (sql, args) = expand_slices("WHERE v in (?)", vec![Value::list([1, 2, 3])]).unwrap();
        assert_eq!(sql, "WHERE v in (?, ?, ?)");
        assert_eq!(args, ints(&[1, 2, 3]));
    }

    #[test]
    fn mixes_scalars_and_lists_in_order() {
        let (sql, args) = expand_slices(
            "SELECT * FROM t WHERE a = ? AND b IN (?) AND c = ? AND d IN (?)",
            vec![
                Value::Int(0),
                Value::list([1, 2]),
                Value::Text("x".into()),
                Value::list([3]),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE a = ? AND b IN (?, ?) AND c = ? AND d IN (?)"
        );
        assert_eq!(
            args,
            vec![
                Value::Int(0),
                Value::Int(1),
                Value::Int(2),
                Value::Text("x".into()),
                Value::Int(3)
            ]
        );
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = expand_slices("WHERE x = ?", vec![Value::List(vec![])]).unwrap_err();
        assert!(matches!(err, BindError::EmptySlice { position: 0 }));
    }

    #[test]
    fn bytes_are_never_expanded() {
        let args = vec![Value::bytes(vec![1u8, 2, 3])];
        let (sql, out) = expand_slices("WHERE blob = ?", args.clone()).unwrap();
        assert_eq!(sql, "WHERE blob = ?");
        assert_eq!(out, args);
    }

    #[test]
    fn too_many_placeholders() {
        let err = expand_slices("a IN (?) AND b = ?", vec![Value::list([1, 2])]).unwrap_err();
        assert!(matches!(
            err,
            BindError::TooManyPlaceholders {
                placeholders: 2,
                arguments: 1
            }
        ));
    }

    #[test]
    fn too_many_arguments() {
        let err = expand_slices("a IN (?)", vec![Value::list([1, 2]), Value::Int(3)]).unwrap_err();
        assert!(matches!(
            err,
            BindError::TooManyArguments {
                placeholders: 1,
                arguments: 2
            }
        ));
    }

    #[test]
    fn scalar_only_skips_validation() {
        // Mismatched counts pass through untouched when nothing needs expanding.
        let (sql, args) = expand_slices("a = ? AND b = ?", vec![Value::Int(1)]).unwrap();
        assert_eq!(sql, "a = ? AND b = ?");
        assert_eq!(args, ints(&[1]));
    }

    #[test]
    fn question_marks_in_literals_are_skipped() {
        let (sql, args) =
            expand_slices("SELECT '?' FROM t WHERE id IN (?)", vec![Value::list([4, 5])]).unwrap();
        assert_eq!(sql, "SELECT '?' FROM t WHERE id IN (?, ?)");
        assert_eq!(args, ints(&[4, 5]));
    }
}
