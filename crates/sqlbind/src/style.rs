//! Placeholder styles and the driver → style registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, RwLock};

/// The bindvar convention a SQL dialect uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaceholderStyle {
    /// Unregistered driver; behaves like [`PlaceholderStyle::Question`].
    #[default]
    Unknown,
    /// `?` (MySQL, SQLite)
    Question,
    /// `$1, $2, ...` (PostgreSQL)
    Dollar,
    /// `:name` (Oracle)
    Named,
    /// `@p1, @p2, ...` (SQL Server)
    At,
}

impl PlaceholderStyle {
    /// Whether queries written with `?` need no rewriting for this style.
    pub fn is_question(self) -> bool {
        matches!(self, Self::Question | Self::Unknown)
    }

    /// Append the `n`th (1-based) positional marker for this style.
    ///
    /// `Named` renders `:argN`, which is how positional queries are named for name-based drivers.
    pub(crate) fn write_marker(self, n: usize, out: &mut String) {
        use std::fmt::Write as _;
        match self {
            Self::Question | Self::Unknown => out.push('?'),
            Self::Dollar => {
                let _ = write!(out, "${n}");
            }
            Self::At => {
                let _ = write!(out, "@p{n}");
            }
            Self::Named => {
                let _ = write!(out, ":arg{n}");
            }
        }
    }

    /// Upper bound on extra bytes a single rewritten marker adds over the one-byte `?`.
    pub(crate) fn marker_growth(self, total: usize) -> usize {
        let digits = total.max(1).ilog10() as usize + 1;
        match self {
            Self::Question | Self::Unknown => 0,
            Self::Dollar => digits,
            Self::At => digits + 1,
            Self::Named => digits + 3,
        }
    }
}

impl fmt::Display for PlaceholderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Question => "question",
            Self::Dollar => "dollar",
            Self::Named => "named",
            Self::At => "at",
        };
        f.write_str(s)
    }
}

const DEFAULT_STYLES: &[(&[&str], PlaceholderStyle)] = &[
    (
        &[
            "postgres",
            "postgresql",
            "pgx",
            "pq-timeouts",
            "cloudsqlpostgres",
            "ql",
            "nrpostgres",
            "cockroach",
            "tokio-postgres",
        ],
        PlaceholderStyle::Dollar,
    ),
    (
        &["mysql", "mariadb", "sqlite", "sqlite3", "nrmysql", "nrsqlite3"],
        PlaceholderStyle::Question,
    ),
    (
        &["oci8", "ora", "goracle", "godror", "oracle"],
        PlaceholderStyle::Named,
    ),
    (
        &["sqlserver", "mssql", "azuresql", "tiberius"],
        PlaceholderStyle::At,
    ),
];

/// Driver name → placeholder style map.
///
/// A process-wide instance is available through [`StyleRegistry::global`]; separate instances
/// can be built for tests or embedding.
#[derive(Debug)]
pub struct StyleRegistry {
    styles: RwLock<HashMap<String, PlaceholderStyle>>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    /// A registry pre-populated with the known drivers.
    pub fn new() -> Self {
        Self {
            styles: RwLock::new(default_styles()),
        }
    }

    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            styles: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static StyleRegistry {
        static GLOBAL: OnceLock<StyleRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StyleRegistry::new)
    }

    /// Register (or override) the style for a driver name.
    pub fn register(&self, driver: impl Into<String>, style: PlaceholderStyle) {
        let driver = driver.into();
        tracing::debug!(target: "sqlbind.style", driver = %driver, %style, "register placeholder style");
        self.styles.write().unwrap().insert(driver, style);
    }

    /// The style for `driver`, or [`PlaceholderStyle::Unknown`].
    pub fn lookup(&self, driver: &str) -> PlaceholderStyle {
        self.styles
            .read()
            .unwrap()
            .get(driver)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_registered(&self, driver: &str) -> bool {
        self.styles.read().unwrap().contains_key(driver)
    }

    /// Restore the built-in driver table, dropping custom registrations.
    pub fn reset(&self) {
        *self.styles.write().unwrap() = default_styles();
    }
}

fn default_styles() -> HashMap<String, PlaceholderStyle> {
    DEFAULT_STYLES
        .iter()
        .flat_map(|(drivers, style)| drivers.iter().map(move |d| (d.to_string(), *style)))
        .collect()
}

/// Register a driver's style in the global registry.
pub fn register_style(driver: impl Into<String>, style: PlaceholderStyle) {
    StyleRegistry::global().register(driver, style);
}

/// Look up a driver's style in the global registry.
pub fn style_for(driver: &str) -> PlaceholderStyle {
    StyleRegistry::global().lookup(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_common_engines() {
        let reg = StyleRegistry::new();
        assert_eq!(reg.lookup("postgres"), PlaceholderStyle::Dollar);
        assert_eq!(reg.lookup("sqlite3"), PlaceholderStyle::Question);
        assert_eq!(reg.lookup("mysql"), PlaceholderStyle::Question);
        assert_eq!(reg.lookup("oci8"), PlaceholderStyle::Named);
        assert_eq!(reg.lookup("sqlserver"), PlaceholderStyle::At);
        assert_eq!(reg.lookup("no-such-driver"), PlaceholderStyle::Unknown);
    }

    #[test]
    fn register_overrides_and_reset_restores() {
        let reg = StyleRegistry::new();
        reg.register("mysql", PlaceholderStyle::Dollar);
        reg.register("custom", PlaceholderStyle::At);
        assert_eq!(reg.lookup("mysql"), PlaceholderStyle::Dollar);
        assert_eq!(reg.lookup("custom"), PlaceholderStyle::At);

        reg.reset();
        assert_eq!(reg.lookup("mysql"), PlaceholderStyle::Question);
        assert_eq!(reg.lookup("custom"), PlaceholderStyle::Unknown);
    }

    #[test]
    fn empty_registry_knows_nothing() {
        assert_eq!(StyleRegistry::empty().lookup("postgres"), PlaceholderStyle::Unknown);
    }

    #[test]
    fn concurrent_register_and_lookup() {
        let reg = std::sync::Arc::new(StyleRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    reg.register(format!("drv{i}"), PlaceholderStyle::At);
                    assert_eq!(reg.lookup("postgres"), PlaceholderStyle::Dollar);
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }
        for i in 0..8 {
            assert_eq!(reg.lookup(&format!("drv{i}")), PlaceholderStyle::At);
        }
    }

    #[test]
    fn marker_rendering() {
        let mut out = String::new();
        PlaceholderStyle::Dollar.write_marker(12, &mut out);
        PlaceholderStyle::At.write_marker(3, &mut out);
        PlaceholderStyle::Named.write_marker(1, &mut out);
        PlaceholderStyle::Question.write_marker(9, &mut out);
        assert_eq!(out, "$12@p3:arg1?");
    }
}
