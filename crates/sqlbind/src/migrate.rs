//! Schema migrations tracked in a single-column version table.
//!
//! Each migration runs in its own transaction together with the insert that records its name,
//! so a failing migration leaves neither schema changes nor a version row behind. A failure
//! aborts the remaining batch; migrations committed before it stay applied.
//!
//! # Example
//!
//! ```ignore
//! use sqlbind::migrate::{Migrator, MigratorConfig};
//!
//! let mut migrator = Migrator::new(MigratorConfig::new().dialect("postgres"));
//! migrator.load_dir("./migrations")?;
//! let report = migrator.run(&mut client).await?;
//! println!("applied {:?}", report.applied);
//! ```
//!
//! # File names
//!
//! `<name>[-<dialect>].sql` holds plain SQL, `<name>[-<dialect>].sql.tmpl` a `tinytemplate`
//! template rendered against [`MigratorConfig::context`]. A dialect suffix must be a registered
//! driver name; files for other dialects are skipped, and a file for the configured dialect
//! replaces the generic file of the same name.

use crate::client::{Executor, Transactor};
use crate::error::{BindError, BindResult};
use crate::rebind::rebind;
use crate::style::{StyleRegistry, style_for};
use crate::value::Value;
use futures_core::future::BoxFuture;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tinytemplate::TinyTemplate;

const DEFAULT_MIGRATION_TABLE: &str = "schema_migrations";

/// Callback migration: receives the transaction it runs in.
pub type MigrationFn =
    Arc<dyn for<'a> Fn(&'a dyn Executor) -> BoxFuture<'a, BindResult<()>> + Send + Sync>;

/// What a migration executes.
#[derive(Clone)]
pub enum MigrationSource {
    /// Plain SQL, run with `batch_execute`.
    Sql(String),
    /// A `tinytemplate` template rendered before running.
    Template(String),
    /// Code run against the migration's transaction.
    Func(MigrationFn),
}

impl fmt::Debug for MigrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Self::Template(tmpl) => f.debug_tuple("Template").field(tmpl).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Migration {
    /// Recorded in the version table; also the sort key.
    pub name: String,
    pub source: MigrationSource,
}

impl Migration {
    pub fn sql(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: MigrationSource::Sql(sql.into()),
        }
    }

    pub fn template(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: MigrationSource::Template(template.into()),
        }
    }

    pub fn func<F>(name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a dyn Executor) -> BoxFuture<'a, BindResult<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: MigrationSource::Func(Arc::new(f)),
        }
    }
}

/// Configuration for [`Migrator`].
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Version table name. Letters, digits, `_` and `.`-separated schema prefixes only.
    pub table: String,
    /// Dialect used to pick `-<dialect>` files in [`Migrator::load_dir`].
    pub dialect: Option<String>,
    /// Template context for `.sql.tmpl` migrations.
    pub context: serde_json::Value,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_MIGRATION_TABLE.to_string(),
            dialect: None,
            context: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl MigratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Serialize `context` into the template context.
    pub fn try_context<C: Serialize>(mut self, context: &C) -> BindResult<Self> {
        self.context =
            serde_json::to_value(context).map_err(|e| BindError::Template(e.to_string()))?;
        Ok(self)
    }
}

/// Outcome of [`Migrator::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Newly applied, in order.
    pub applied: Vec<String>,
    /// Already recorded in the version table.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Sql,
    Template,
}

/// Split `file_name` into (base name, dialect suffix, kind).
fn parse_migration_filename<'a>(
    file_name: &'a str,
    registry: &StyleRegistry,
) -> Option<(&'a str, Option<&'a str>, FileKind)> {
    let (stem, kind) = if let Some(stem) = file_name.strip_suffix(".sql.tmpl") {
        (stem, FileKind::Template)
    } else {
        (file_name.strip_suffix(".sql")?, FileKind::Sql)
    };
    if stem.is_empty() {
        return None;
    }

    match stem.rsplit_once('-') {
        Some((base, dialect)) if !base.is_empty() && registry.is_registered(dialect) => {
            Some((base, Some(dialect), kind))
        }
        _ => Some((stem, None, kind)),
    }
}

fn validate_table_name(table_name: &str) -> BindResult<&str> {
    for part in table_name.split('.') {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(BindError::Other(format!(
                "invalid migration table name: {table_name}"
            )));
        }
    }
    Ok(table_name)
}

/// Ordered set of migrations plus the settings to run them.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    config: MigratorConfig,
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new(config: MigratorConfig) -> Self {
        Self {
            config,
            migrations: Vec::new(),
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Registered migrations, sorted by name.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Add a migration. A migration with the same name is replaced.
    pub fn add(&mut self, migration: Migration) -> &mut Self {
        match self
            .migrations
            .binary_search_by(|m| m.name.cmp(&migration.name))
        {
            Ok(idx) => self.migrations[idx] = migration,
            Err(idx) => self.migrations.insert(idx, migration),
        }
        self
    }

    pub fn add_sql(&mut self, name: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.add(Migration::sql(name, sql))
    }

    pub fn add_func<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a dyn Executor) -> BoxFuture<'a, BindResult<()>> + Send + Sync + 'static,
    {
        self.add(Migration::func(name, f))
    }

    /// Load `.sql` and `.sql.tmpl` files from `dir`. Returns the number of migrations added.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> BindResult<usize> {
        let dir = dir.as_ref();
        let registry = StyleRegistry::global();
        let entries = fs::read_dir(dir).map_err(|e| {
            BindError::Other(format!(
                "failed to read migrations dir {}: {e}",
                dir.display()
            ))
        })?;

        // base name -> (dialect-specific?, migration)
        let mut by_name: BTreeMap<String, (bool, Migration)> = BTreeMap::new();

        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((base, dialect, kind)) = parse_migration_filename(file_name, registry) else {
                continue;
            };

            let specific = match dialect {
                None => false,
                Some(d) if self.config.dialect.as_deref() == Some(d) => true,
                Some(d) => {
                    tracing::debug!(target: "sqlbind.migrate", file = file_name, dialect = d, "skipping migration for another dialect");
                    continue;
                }
            };

            if let Some((existing_specific, _)) = by_name.get(base) {
                if *existing_specific == specific {
                    return Err(BindError::Other(format!(
                        "duplicate migration '{base}' in {}",
                        dir.display()
                    )));
                }
                if *existing_specific {
                    continue;
                }
            }

            let body = fs::read_to_string(&path)?;
            let migration = match kind {
                FileKind::Sql => Migration::sql(base, body),
                FileKind::Template => Migration::template(base, body),
            };
            by_name.insert(base.to_string(), (specific, migration));
        }

        let count = by_name.len();
        for (_, (_, migration)) in by_name {
            self.add(migration);
        }
        tracing::debug!(target: "sqlbind.migrate", dir = %dir.display(), count, "loaded migrations");
        Ok(count)
    }

    /// Render a template migration against the configured context.
    pub fn render(&self, name: &str, template: &str) -> BindResult<String> {
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&tinytemplate::format_unescaped);
        tt.add_template(name, template)?;
        Ok(tt.render(name, &self.config.context)?)
    }

    async fn ensure_table(&self, exec: &(dyn Executor + '_)) -> BindResult<()> {
        let table = validate_table_name(&self.config.table)?;
        exec.batch_execute(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (name VARCHAR(255) PRIMARY KEY)"
        ))
        .await
    }

    /// Names recorded in the version table, creating the table if needed.
    pub async fn applied(&self, exec: &(dyn Executor + '_)) -> BindResult<Vec<String>> {
        self.ensure_table(exec).await?;
        let table = validate_table_name(&self.config.table)?;
        let rows = exec
            .query(&format!("SELECT name FROM {table} ORDER BY name"), &[])
            .await?;
        rows.into_iter()
            .map(|row| match row.try_get("name")? {
                Value::Text(name) => Ok(name.clone()),
                other => Err(BindError::decode(
                    "name",
                    format!("expected text, got {}", other.type_name()),
                )),
            })
            .collect()
    }

    /// Migrations not yet recorded in the version table.
    pub async fn pending(&self, exec: &(dyn Executor + '_)) -> BindResult<Vec<&Migration>> {
        let applied: HashSet<String> = self.applied(exec).await?.into_iter().collect();
        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.name))
            .collect())
    }

    async fn apply(&self, exec: &(dyn Executor + '_), migration: &Migration) -> BindResult<()> {
        match &migration.source {
            MigrationSource::Sql(sql) => exec.batch_execute(sql).await?,
            MigrationSource::Template(template) => {
                let sql = self.render(&migration.name, template)?;
                exec.batch_execute(&sql).await?;
            }
            MigrationSource::Func(f) => f(exec).await?,
        }

        let table = validate_table_name(&self.config.table)?;
        let insert = format!("INSERT INTO {table} (name) VALUES (?)");
        let insert = rebind(style_for(exec.driver_name()), &insert);
        exec.execute(&insert, &[Value::Text(migration.name.clone())])
            .await?;
        Ok(())
    }

    /// Apply every pending migration in name order, one transaction each.
    pub async fn run<T: Transactor>(&self, conn: &mut T) -> BindResult<MigrationReport> {
        let applied: HashSet<String> = self.applied(&*conn).await?.into_iter().collect();
        let mut report = MigrationReport::default();

        for migration in &self.migrations {
            if applied.contains(&migration.name) {
                report.skipped.push(migration.name.clone());
                continue;
            }

            let tx = conn.begin().await?;
            match self.apply(&tx, migration).await {
                Ok(()) => tx.commit().await.map_err(|e| {
                    BindError::migration(&migration.name, format!("commit failed: {e}"))
                })?,
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(
                            target: "sqlbind.migrate",
                            migration = %migration.name,
                            error = %rollback_err,
                            "rollback failed"
                        );
                    }
                    tracing::error!(
                        target: "sqlbind.migrate",
                        migration = %migration.name,
                        error = %err,
                        "migration failed, aborting"
                    );
                    return Err(BindError::migration(&migration.name, err.to_string()));
                }
            }

            tracing::info!(target: "sqlbind.migrate", migration = %migration.name, "applied migration");
            report.applied.push(migration.name.clone());
        }

        Ok(report)
    }
}
