//! Argument sources for named queries.
//!
//! A [`BindSource`] turns the ordered name list of a compiled query into positional values.
//! Records (via `#[derive(Record)]`), string-keyed maps and JSON objects are supported.

use crate::error::{BindError, BindResult};
use crate::mapper::Mapper;
use crate::record::{Record, value_at};
use crate::value::{ToValue, Value};
use std::collections::{BTreeMap, HashMap};

/// What to do when a name has no matching field or key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Fail with [`BindError::NameNotFound`].
    #[default]
    Strict,
    /// Bind `NULL` for missing names.
    Lenient,
}

impl BindMode {
    pub fn is_lenient(self) -> bool {
        self == Self::Lenient
    }

    fn missing(self, name: &str, target: &str) -> BindResult<Value> {
        match self {
            Self::Strict => Err(BindError::name_not_found(name, target)),
            Self::Lenient => Ok(Value::Null),
        }
    }
}

/// Implemented by handles that carry a per-instance strict/lenient flag.
pub trait Leniency {
    fn is_lenient(&self) -> bool;

    fn bind_mode(&self) -> BindMode {
        if self.is_lenient() {
            BindMode::Lenient
        } else {
            BindMode::Strict
        }
    }
}

/// Something that can supply values for named parameters.
pub trait BindSource {
    /// One value per name, in order.
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>>;
}

impl<T: BindSource + ?Sized> BindSource for &T {
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>> {
        (**self).bind_values(names, mode)
    }
}

/// Bind a record through the global [`Mapper`]. Used by derived `BindSource` impls.
pub fn bind_record<T: Record + 'static>(
    record: &T,
    names: &[String],
    mode: BindMode,
) -> BindResult<Vec<Value>> {
    let map = Mapper::global().field_map::<T>();
    names
        .iter()
        .map(|name| {
            match map.path(name).and_then(|path| value_at(record, path)) {
                Some(value) => Ok(value),
                None => mode.missing(name, map.type_name()),
            }
        })
        .collect()
}

impl<V: ToValue> BindSource for HashMap<String, V> {
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>> {
        names
            .iter()
            .map(|name| match self.get(name) {
                Some(v) => Ok(v.to_value()),
                None => mode.missing(name, "map"),
            })
            .collect()
    }
}

impl<V: ToValue> BindSource for HashMap<&str, V> {
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>> {
        names
            .iter()
            .map(|name| match self.get(name.as_str()) {
                Some(v) => Ok(v.to_value()),
                None => mode.missing(name, "map"),
            })
            .collect()
    }
}

impl<V: ToValue> BindSource for BTreeMap<String, V> {
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>> {
        names
            .iter()
            .map(|name| match self.get(name) {
                Some(v) => Ok(v.to_value()),
                None => mode.missing(name, "map"),
            })
            .collect()
    }
}

/// Look up `name` in a JSON object, following `a.b` into nested objects.
fn json_lookup<'a>(
    object: &'a serde_json::Map<String, serde_json::Value>,
    name: &str,
) -> Option<&'a serde_json::Value> {
    if let Some(v) = object.get(name) {
        return Some(v);
    }
    let (head, rest) = name.split_once('.')?;
    match object.get(head)? {
        serde_json::Value::Object(inner) => json_lookup(inner, rest),
        _ => None,
    }
}

impl BindSource for serde_json::Map<String, serde_json::Value> {
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>> {
        names
            .iter()
            .map(|name| match json_lookup(self, name) {
                Some(v) => Ok(Value::from(v)),
                None => mode.missing(name, "JSON object"),
            })
            .collect()
    }
}

impl BindSource for serde_json::Value {
    fn bind_values(&self, names: &[String], mode: BindMode) -> BindResult<Vec<Value>> {
        match self {
            serde_json::Value::Object(object) => object.bind_values(names, mode),
            other => Err(BindError::UnsupportedArgument(format!(
                "expected a JSON object, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
