//! Name → field-path mapping for [`Record`] types, with a process-wide cache.
//!
//! A [`FieldMap`] is built once per (record type, name normalizer) and shared behind an `Arc`.
//! Names reachable at several depths resolve to the shallowest field; two fields with the same
//! name at the same depth are ambiguous and neither is mapped.

use crate::record::{FieldKind, Record, parse_tag};
use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Turns a Rust field name into its lookup key when no tag names it.
pub type NameFn = fn(&str) -> String;

/// Built-in name normalizers.
pub mod normalize {
    use heck::ToSnakeCase;

    /// Fold to lowercase (the default).
    pub fn lowercase(name: &str) -> String {
        name.to_lowercase()
    }

    /// Convert to `snake_case`.
    pub fn snake_case(name: &str) -> String {
        name.to_snake_case()
    }

    /// Use the field name as written.
    pub fn identity(name: &str) -> String {
        name.to_string()
    }
}

/// A resolvable field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Lookup key, including any `parent.` prefixes.
    pub name: String,
    /// Field indices from the root record down to the field.
    pub path: Vec<usize>,
    /// Tag options after the name.
    pub options: Vec<String>,
    /// The Rust field name.
    pub ident: &'static str,
}

/// Resolved field mapping for one record type.
#[derive(Debug, Clone)]
pub struct FieldMap {
    type_name: &'static str,
    fields: Vec<FieldInfo>,
    by_name: HashMap<String, usize>,
}

struct Pending {
    descs: &'static [crate::record::FieldDesc],
    path: Vec<usize>,
    prefix: String,
}

impl FieldMap {
    /// Walk the descriptor tree breadth-first and resolve name conflicts.
    pub fn build<T: Record>(normalize: NameFn) -> Self {
        let mut queue = VecDeque::from([Pending {
            descs: T::field_descs(),
            path: Vec::new(),
            prefix: String::new(),
        }]);
        let mut candidates: Vec<FieldInfo> = Vec::new();

        while let Some(level) = queue.pop_front() {
            for (index, desc) in level.descs.iter().enumerate() {
                let tag = parse_tag(desc.tag);
                if tag.skip {
                    continue;
                }
                let mut path = level.path.clone();
                path.push(index);
                let name = tag
                    .name
                    .map(str::to_string)
                    .unwrap_or_else(|| normalize(desc.ident));

                match desc.kind {
                    FieldKind::Flatten(children) => queue.push_back(Pending {
                        descs: children(),
                        path,
                        prefix: level.prefix.clone(),
                    }),
                    FieldKind::Nested(children) => queue.push_back(Pending {
                        descs: children(),
                        path,
                        prefix: format!("{}{}.", level.prefix, name),
                    }),
                    FieldKind::Scalar => candidates.push(FieldInfo {
                        name: format!("{}{}", level.prefix, name),
                        path,
                        options: tag.options.iter().map(|o| o.to_string()).collect(),
                        ident: desc.ident,
                    }),
                }
            }
        }

        // shallowest depth per name, and how many fields sit at it
        let mut best: HashMap<&str, (usize, usize)> = HashMap::new();
        for field in &candidates {
            let depth = field.path.len();
            best.entry(field.name.as_str())
                .and_modify(|(d, count)| {
                    if depth < *d {
                        *d = depth;
                        *count = 1;
                    } else if depth == *d {
                        *count += 1;
                    }
                })
                .or_insert((depth, 1));
        }
        let keep: Vec<bool> = candidates
            .iter()
            .map(|f| best.get(f.name.as_str()) == Some(&(f.path.len(), 1)))
            .collect();

        let fields: Vec<FieldInfo> = candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(f, keep)| keep.then_some(f))
            .collect();
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Self {
            type_name: std::any::type_name::<T>(),
            fields,
            by_name,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// The field path for `name`, if it resolves.
    pub fn path(&self, name: &str) -> Option<&[usize]> {
        self.get(name).map(|f| f.path.as_slice())
    }

    /// Resolvable names in breadth-first declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds and caches [`FieldMap`]s for one name normalizer.
pub struct Mapper {
    normalize: NameFn,
    cache: Mutex<HashMap<TypeId, Arc<FieldMap>>>,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("cached_types", &self.cached_types())
            .finish_non_exhaustive()
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(normalize::lowercase)
    }
}

fn global_slot() -> &'static RwLock<Arc<Mapper>> {
    static GLOBAL: OnceLock<RwLock<Arc<Mapper>>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(Mapper::default())))
}

impl Mapper {
    pub fn new(normalize: NameFn) -> Self {
        Self {
            normalize,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide mapper used by derived [`BindSource`](crate::BindSource) impls.
    pub fn global() -> Arc<Mapper> {
        global_slot().read().unwrap().clone()
    }

    pub fn normalizer(&self) -> NameFn {
        self.normalize
    }

    /// The cached field map for `T`, building it on first use.
    pub fn field_map<T: Record + 'static>(&self) -> Arc<FieldMap> {
        let key = TypeId::of::<T>();
        if let Some(map) = self.cache.lock().unwrap().get(&key) {
            return map.clone();
        }

        // The normalizer runs without the cache lock held.
        let map = Arc::new(FieldMap::build::<T>(self.normalize));
        tracing::trace!(
            target: "sqlbind.mapper",
            record = map.type_name(),
            fields = map.len(),
            "built field map"
        );
        self.cache
            .lock()
            .unwrap()
            .entry(key)
            .or_insert(map)
            .clone()
    }

    /// Resolve each name to a field path; `None` marks a name that is not found.
    pub fn resolve_names<T: Record + 'static>(
        &self,
        names: &[impl AsRef<str>],
    ) -> Vec<Option<Vec<usize>>> {
        let map = self.field_map::<T>();
        names
            .iter()
            .map(|n| map.path(n.as_ref()).map(<[usize]>::to_vec))
            .collect()
    }

    /// Number of record types currently cached.
    pub fn cached_types(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}

/// Replace the global name normalizer.
///
/// The global mapper (and with it the field-map cache) is swapped only when `normalize`
/// differs from the current function; maps are then rebuilt lazily on next use.
pub fn set_name_normalizer(normalize: NameFn) {
    let mut slot = global_slot().write().unwrap();
    if !std::ptr::fn_addr_eq(slot.normalize, normalize) {
        *slot = Arc::new(Mapper::new(normalize));
    }
}

/// Restore the default global mapper with an empty cache.
pub fn reset_global_mapper() {
    *global_slot().write().unwrap() = Arc::new(Mapper::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldDesc, FieldValue, value_at};
    use crate::value::{ToValue, Value};

    // Hand-written impls mirroring what `#[derive(Record)]` generates.

    struct Audit {
        created_by: String,
        name: String,
    }

    impl Record for Audit {
        fn field_descs() -> &'static [FieldDesc] {
            const FIELDS: &[FieldDesc] = &[
                FieldDesc::scalar("created_by", None),
                FieldDesc::scalar("name", None),
            ];
            FIELDS
        }

        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::Scalar(self.created_by.to_value())),
                1 => Some(FieldValue::Scalar(self.name.to_value())),
                _ => None,
            }
        }
    }

    struct Place {
        city: String,
    }

    impl Record for Place {
        fn field_descs() -> &'static [FieldDesc] {
            const FIELDS: &[FieldDesc] = &[FieldDesc::scalar("City", None)];
            FIELDS
        }

        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::Scalar(self.city.to_value())),
                _ => None,
            }
        }
    }

    struct Person {
        first_name: String,
        name: String,
        audit: Audit,
        secret: String,
        home: Place,
    }

    impl Record for Person {
        fn field_descs() -> &'static [FieldDesc] {
            const FIELDS: &[FieldDesc] = &[
                FieldDesc::scalar("FirstName", Some("first_name,omitempty")),
                FieldDesc::scalar("Name", None),
                FieldDesc {
                    ident: "audit",
                    tag: None,
                    kind: FieldKind::Flatten(<Audit as Record>::field_descs),
                },
                FieldDesc::scalar("secret", Some("-")),
                FieldDesc {
                    ident: "home",
                    tag: Some("addr"),
                    kind: FieldKind::Nested(<Place as Record>::field_descs),
                },
            ];
            FIELDS
        }

        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::Scalar(self.first_name.to_value())),
                1 => Some(FieldValue::Scalar(self.name.to_value())),
                2 => Some(FieldValue::Record(&self.audit)),
                3 => Some(FieldValue::Scalar(self.secret.to_value())),
                4 => Some(FieldValue::Record(&self.home)),
                _ => None,
            }
        }
    }

    // Two embedded records at the same depth both defining `created_by`.
    struct Left {
        created_by: i32,
    }
    struct Right {
        created_by: i32,
        only_right: i32,
    }

    impl Record for Left {
        fn field_descs() -> &'static [FieldDesc] {
            const FIELDS: &[FieldDesc] = &[FieldDesc::scalar("created_by", None)];
            FIELDS
        }
        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            (index == 0).then(|| FieldValue::Scalar(self.created_by.to_value()))
        }
    }

    impl Record for Right {
        fn field_descs() -> &'static [FieldDesc] {
            const FIELDS: &[FieldDesc] = &[
                FieldDesc::scalar("created_by", None),
                FieldDesc::scalar("only_right", None),
            ];
            FIELDS
        }
        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::Scalar(self.created_by.to_value())),
                1 => Some(FieldValue::Scalar(self.only_right.to_value())),
                _ => None,
            }
        }
    }

    struct Both {
        left: Left,
        right: Right,
    }

    impl Record for Both {
        fn field_descs() -> &'static [FieldDesc] {
            const FIELDS: &[FieldDesc] = &[
                FieldDesc {
                    ident: "left",
                    tag: None,
                    kind: FieldKind::Flatten(<Left as Record>::field_descs),
                },
                FieldDesc {
                    ident: "right",
                    tag: None,
                    kind: FieldKind::Flatten(<Right as Record>::field_descs),
                },
            ];
            FIELDS
        }
        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::Record(&self.left)),
                1 => Some(FieldValue::Record(&self.right)),
                _ => None,
            }
        }
    }

    fn person() -> Person {
        Person {
            first_name: "Jane".into(),
            name: "top".into(),
            audit: Audit {
                created_by: "admin".into(),
                name: "shadowed".into(),
            },
            secret: "hidden".into(),
            home: Place {
                city: "Lisbon".into(),
            },
        }
    }

    #[test]
    fn panicking_normalizer_leaves_cache_usable() {
        fn explode(_: &str) -> String {
            panic!("normalizer failed")
        }
        let mapper = Mapper::new(explode);
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            mapper.field_map::<Audit>();
        }));
        assert!(caught.is_err());
        assert_eq!(mapper.cached_types(), 0);
        mapper.clear();
    }

    #[test]
    fn tags_skip_and_normalization() {
        let map = FieldMap::build::<Person>(normalize::lowercase);
        let names: Vec<_> = map.names().collect();
        assert_eq!(names, vec!["first_name", "name", "created_by", "addr.city"]);
        assert_eq!(map.get("first_name").unwrap().options, vec!["omitempty"]);
        assert!(map.get("secret").is_none());
        assert!(map.get("firstname").is_none());
    }

    #[test]
    fn shallower_name_shadows_embedded_one() {
        let map = FieldMap::build::<Person>(normalize::lowercase);
        assert_eq!(map.path("name"), Some(&[1][..]));
        assert_eq!(map.path("created_by"), Some(&[2, 0][..]));
        assert_eq!(map.path("addr.city"), Some(&[4, 0][..]));

        let p = person();
        assert_eq!(value_at(&p, &[1]), Some(Value::Text("top".into())));
        assert_eq!(value_at(&p, &[2, 0]), Some(Value::Text("admin".into())));
        assert_eq!(value_at(&p, &[4, 0]), Some(Value::Text("Lisbon".into())));
        assert_eq!(value_at(&p, &[2]), None);
        assert_eq!(value_at(&p, &[9]), None);
    }

    #[test]
    fn equal_depth_conflict_is_excluded() {
        let map = FieldMap::build::<Both>(normalize::lowercase);
        assert!(map.get("created_by").is_none());
        assert_eq!(map.path("only_right"), Some(&[1, 1][..]));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn normalizer_applies_only_without_tag() {
        let map = FieldMap::build::<Person>(normalize::identity);
        let names: Vec<_> = map.names().collect();
        assert_eq!(names, vec!["first_name", "Name", "created_by", "name", "addr.City"]);
    }

    #[test]
    fn mapper_caches_per_type() {
        let mapper = Mapper::default();
        let a = mapper.field_map::<Person>();
        let b = mapper.field_map::<Person>();
        assert!(Arc::ptr_eq(&a, &b));
        mapper.field_map::<Both>();
        assert_eq!(mapper.cached_types(), 2);
        mapper.clear();
        assert_eq!(mapper.cached_types(), 0);
    }

    #[test]
    fn resolve_names_marks_missing() {
        let mapper = Mapper::default();
        let resolved = mapper.resolve_names::<Person>(&["name", "missing", "addr.city"]);
        assert_eq!(resolved, vec![Some(vec![1]), None, Some(vec![4, 0])]);
    }

    #[test]
    fn snake_case_normalizer() {
        assert_eq!(normalize::snake_case("FirstName"), "first_name");
        assert_eq!(normalize::lowercase("FirstName"), "firstname");
    }
}
