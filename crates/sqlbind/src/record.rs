//! Static field metadata for bindable structs.
//!
//! Rust has no runtime reflection, so `#[derive(Record)]` generates the descriptor table the
//! [`Mapper`](crate::Mapper) walks, plus an indexed accessor for field values.

use crate::value::Value;

/// How a field participates in name resolution.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A bindable value.
    Scalar,
    /// An embedded record whose fields are promoted into the parent's namespace.
    Flatten(fn() -> &'static [FieldDesc]),
    /// A nested record whose fields are reachable as `field.child`.
    Nested(fn() -> &'static [FieldDesc]),
}

/// One struct field as seen by the mapper.
#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    /// The Rust field name.
    pub ident: &'static str,
    /// The raw binding tag, `name[,option...]`; `"-"` excludes the field.
    pub tag: Option<&'static str>,
    pub kind: FieldKind,
}

impl FieldDesc {
    pub const fn scalar(ident: &'static str, tag: Option<&'static str>) -> Self {
        Self {
            ident,
            tag,
            kind: FieldKind::Scalar,
        }
    }
}

/// A field value produced by [`Record::field`].
pub enum FieldValue<'a> {
    Scalar(Value),
    Record(&'a dyn Record),
}

/// A struct whose fields can be bound by name.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(sqlbind::Record)]
/// struct Person {
///     #[db("first_name")]
///     first: String,
///     #[db(flatten)]
///     audit: Audit,
///     #[db("-")]
///     cache: String,
/// }
/// ```
pub trait Record {
    /// Field descriptors in declaration order; indices match [`Record::field`].
    fn field_descs() -> &'static [FieldDesc]
    where
        Self: Sized;

    /// The value of the field at `index`.
    fn field(&self, index: usize) -> Option<FieldValue<'_>>;
}

/// A parsed binding tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tag<'a> {
    /// Explicit name; `None` means derive it from the field name.
    pub name: Option<&'a str>,
    pub options: Vec<&'a str>,
    pub skip: bool,
}

/// Parse a `name[,options]` tag.
pub fn parse_tag(tag: Option<&str>) -> Tag<'_> {
    let Some(tag) = tag else {
        return Tag::default();
    };
    let mut parts = tag.split(',');
    let name = parts.next().unwrap_or("").trim();
    let options = parts.map(str::trim).filter(|o| !o.is_empty()).collect();
    Tag {
        name: (!name.is_empty() && name != "-").then_some(name),
        options,
        skip: name == "-",
    }
}

/// Follow an index path through nested records to a scalar value.
pub fn value_at(record: &dyn Record, path: &[usize]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut current = record;
    for index in parents {
        match current.field(*index)? {
            FieldValue::Record(inner) => current = inner,
            FieldValue::Scalar(_) => return None,
        }
    }
    match current.field(*last)? {
        FieldValue::Scalar(value) => Some(value),
        FieldValue::Record(_) => None,
    }
}
