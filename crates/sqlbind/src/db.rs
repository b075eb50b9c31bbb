//! `Db`: an executor paired with its placeholder style and bind mode.

use crate::bind::{BindMode, BindSource, Leniency};
use crate::client::{Executor, Row, Transaction, Transactor};
use crate::error::BindResult;
use crate::named::{bind_named_batch, bind_named_with, named_in};
use crate::rebind::rebind;
use crate::slices::expand_slices;
use crate::style::{PlaceholderStyle, style_for};
use crate::value::Value;
use std::borrow::Cow;

/// Configuration for [`Db`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Bind `NULL` for names missing from the argument instead of failing.
    pub lenient: bool,
    /// Placeholder style override. `None` resolves it from the executor's driver name.
    pub style: Option<PlaceholderStyle>,
    /// Emit a `tracing` debug event with the rewritten SQL before each call.
    pub log_sql: bool,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            lenient: false,
            style: None,
            log_sql: true,
            max_sql_length: Some(200),
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn style(mut self, style: PlaceholderStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

/// A database handle that rewrites queries for its driver before executing them.
///
/// Queries passed to [`Db::exec`], [`Db::query`], [`Db::exec_in`] and [`Db::query_in`] use `?`
/// placeholders; named variants use `:name`.
///
/// ```ignore
/// let db = Db::new(client);
/// db.named_exec("INSERT INTO person (first_name) VALUES (:first)", &person).await?;
/// let rows = db.query_in("SELECT * FROM person WHERE id IN (?)", vec![Value::list([1, 2])]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Db<E> {
    executor: E,
    style: PlaceholderStyle,
    config: DbConfig,
}

/// A transaction opened from a [`Db`]; shares its style and bind mode.
pub type Tx<'a> = Db<Box<dyn Transaction + 'a>>;

impl<E: Executor> Db<E> {
    pub fn new(executor: E) -> Self {
        Self::with_config(executor, DbConfig::default())
    }

    pub fn with_config(executor: E, config: DbConfig) -> Self {
        let style = config
            .style
            .unwrap_or_else(|| style_for(executor.driver_name()));
        Self {
            executor,
            style,
            config,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn style(&self) -> PlaceholderStyle {
        self.style
    }

    /// Return this handle with a different bind mode.
    pub fn with_mode(mut self, mode: BindMode) -> Self {
        self.config.lenient = mode.is_lenient();
        self
    }

    /// Rewrite `?` placeholders for this handle's style.
    pub fn rebind<'q>(&self, sql: &'q str) -> Cow<'q, str> {
        rebind(self.style, sql)
    }

    /// Compile a named query and bind `arg` with this handle's mode.
    pub fn bind_named<A: BindSource + ?Sized>(
        &self,
        sql: &str,
        arg: &A,
    ) -> BindResult<(String, Vec<Value>)> {
        bind_named_with(self.style, sql, arg, self.bind_mode())
    }

    fn log(&self, op: &'static str, sql: &str, args: &[Value]) {
        if !self.config.log_sql {
            return;
        }
        let shown = match self.config.max_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while !sql.is_char_boundary(end) {
                    end -= 1;
                }
                Cow::Owned(format!("{}...", &sql[..end]))
            }
            _ => Cow::Borrowed(sql),
        };
        tracing::debug!(
            target: "sqlbind.query",
            op,
            style = %self.style,
            args = args.len(),
            sql = %shown,
            "sql"
        );
    }

    async fn run_exec(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
        self.log("execute", sql, args);
        self.executor.execute(sql, args).await
    }

    async fn run_query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
        self.log("query", sql, args);
        self.executor.query(sql, args).await
    }

    /// Execute a `?` query.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
        self.run_exec(&self.rebind(sql), args).await
    }

    /// Run a `?` query and return all rows.
    pub async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
        self.run_query(&self.rebind(sql), args).await
    }

    /// Execute a `:name` query bound from `arg`.
    pub async fn named_exec<A: BindSource + Sync + ?Sized>(
        &self,
        sql: &str,
        arg: &A,
    ) -> BindResult<u64> {
        let (sql, args) = self.bind_named(sql, arg)?;
        self.run_exec(&sql, &args).await
    }

    /// Run a `:name` query bound from `arg` and return all rows.
    pub async fn named_query<A: BindSource + Sync + ?Sized>(
        &self,
        sql: &str,
        arg: &A,
    ) -> BindResult<Vec<Row>> {
        let (sql, args) = self.bind_named(sql, arg)?;
        self.run_query(&sql, &args).await
    }

    /// Insert every element of `rows` with one multi-row `INSERT ... VALUES` statement.
    pub async fn named_exec_batch<A: BindSource + Sync>(
        &self,
        sql: &str,
        rows: &[A],
    ) -> BindResult<u64> {
        let (sql, args) = bind_named_batch(self.style, sql, rows, self.bind_mode())?;
        self.run_exec(&sql, &args).await
    }

    /// Execute a `:name` query whose arguments may hold lists for `IN (...)`.
    pub async fn named_exec_in<A: BindSource + Sync + ?Sized>(
        &self,
        sql: &str,
        arg: &A,
    ) -> BindResult<u64> {
        let (sql, args) = named_in(self.style, sql, arg, self.bind_mode())?;
        self.run_exec(&sql, &args).await
    }

    /// Run a `:name` query whose arguments may hold lists for `IN (...)`.
    pub async fn named_query_in<A: BindSource + Sync + ?Sized>(
        &self,
        sql: &str,
        arg: &A,
    ) -> BindResult<Vec<Row>> {
        let (sql, args) = named_in(self.style, sql, arg, self.bind_mode())?;
        self.run_query(&sql, &args).await
    }

    /// Execute a `?` query, expanding list arguments first.
    pub async fn exec_in(&self, sql: &str, args: Vec<Value>) -> BindResult<u64> {
        let (sql, args) = expand_slices(sql, args)?;
        self.run_exec(&self.rebind(&sql), &args).await
    }

    /// Run a `?` query, expanding list arguments first.
    pub async fn query_in(&self, sql: &str, args: Vec<Value>) -> BindResult<Vec<Row>> {
        let (sql, args) = expand_slices(sql, args)?;
        self.run_query(&self.rebind(&sql), &args).await
    }
}

impl<E: Transactor> Db<E> {
    /// Open a transaction that inherits this handle's style and bind mode.
    pub async fn begin(&mut self) -> BindResult<Tx<'_>> {
        let tx = self.executor.begin().await?;
        Ok(Db {
            executor: tx,
            style: self.style,
            config: self.config.clone(),
        })
    }
}

impl Tx<'_> {
    pub async fn commit(self) -> BindResult<()> {
        self.executor.commit().await
    }

    pub async fn rollback(self) -> BindResult<()> {
        self.executor.rollback().await
    }
}

impl<E> Leniency for Db<E> {
    fn is_lenient(&self) -> bool {
        self.config.lenient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        driver: &'static str,
        calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    #[async_trait]
    impl Executor for Recorder {
        fn driver_name(&self) -> &str {
            self.driver
        }

        async fn execute(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), args.to_vec()));
            Ok(1)
        }

        async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
            self.execute(sql, args).await?;
            Ok(Vec::new())
        }
    }

    fn recorder(driver: &'static str) -> Recorder {
        Recorder {
            driver,
            ..Default::default()
        }
    }

    fn last_call(db: &Db<Recorder>) -> (String, Vec<Value>) {
        db.executor().calls.lock().unwrap().last().cloned().unwrap()
    }

    #[tokio::test]
    async fn style_comes_from_driver_name() {
        let db = Db::new(recorder("postgres"));
        assert_eq!(db.style(), PlaceholderStyle::Dollar);
        db.exec("SELECT ? , ?", &[Value::Int(1), Value::Int(2)])
            .await
            .unwrap();
        assert_eq!(last_call(&db).0, "SELECT $1 , $2");

        let db = Db::with_config(
            recorder("postgres"),
            DbConfig::new().style(PlaceholderStyle::At),
        );
        assert_eq!(db.rebind("x = ?"), "x = @p1");
    }

    #[tokio::test]
    async fn named_exec_binds_in_order() {
        let db = Db::new(recorder("sqlserver"));
        let arg = HashMap::from([("a", 1_i64), ("b", 2)]);
        db.named_exec("UPDATE t SET a = :a WHERE b = :b", &arg)
            .await
            .unwrap();
        assert_eq!(
            last_call(&db),
            (
                "UPDATE t SET a = @p1 WHERE b = @p2".to_string(),
                vec![Value::Int(1), Value::Int(2)]
            )
        );
    }

    #[tokio::test]
    async fn mode_controls_missing_names() {
        let arg = HashMap::from([("a", 1_i64)]);
        let strict = Db::new(recorder("mysql"));
        assert!(strict.named_exec("SELECT :a, :b", &arg).await.is_err());

        let lenient = Db::new(recorder("mysql")).with_mode(BindMode::Lenient);
        assert!(lenient.is_lenient());
        lenient.named_exec("SELECT :a, :b", &arg).await.unwrap();
        assert_eq!(last_call(&lenient).1, vec![Value::Int(1), Value::Null]);
    }

    #[tokio::test]
    async fn query_in_expands_then_rebinds() {
        let db = Db::new(recorder("postgres"));
        db.query_in(
            "SELECT * FROM t WHERE a = ? AND id IN (?)",
            vec![Value::Int(0), Value::list([7, 8])],
        )
        .await
        .unwrap();
        assert_eq!(
            last_call(&db).0,
            "SELECT * FROM t WHERE a = $1 AND id IN ($2, $3)"
        );
    }

    #[tokio::test]
    async fn batch_insert() {
        let db = Db::new(recorder("sqlite3"));
        let rows = vec![HashMap::from([("a", 1_i64)]), HashMap::from([("a", 2_i64)])];
        db.named_exec_batch("INSERT INTO t (a) VALUES (:a)", &rows)
            .await
            .unwrap();
        assert_eq!(
            last_call(&db),
            (
                "INSERT INTO t (a) VALUES (?),(?)".to_string(),
                vec![Value::Int(1), Value::Int(2)]
            )
        );
    }
}
