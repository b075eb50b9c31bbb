//! Executor traits: the minimal "run SQL with positional arguments" capability.
//!
//! Everything in this crate that touches a database goes through [`Executor`]. Adapters for
//! `tokio-postgres` and `deadpool-postgres` live in [`crate::pg`] and [`crate::pool`].

use crate::error::{BindError, BindResult};
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

/// A result row: shared column names plus one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    /// Like [`Row::get`] but a missing column is a [`BindError::Decode`].
    pub fn try_get(&self, name: &str) -> BindResult<&Value> {
        self.get(name)
            .ok_or_else(|| BindError::decode(name, "column not found"))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Runs SQL with positional arguments.
///
/// Implementors receive SQL already rewritten for their placeholder style, which is resolved
/// from [`Executor::driver_name`] through the style registry.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Registry key for this executor's placeholder style, e.g. `"postgres"`.
    fn driver_name(&self) -> &str;

    /// Execute a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, args: &[Value]) -> BindResult<u64>;

    /// Execute a query and return all rows.
    async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>>;

    /// Execute one or more statements without arguments.
    ///
    /// The default runs `sql` as a single argument-less statement.
    async fn batch_execute(&self, sql: &str) -> BindResult<()> {
        self.execute(sql, &[]).await.map(|_| ())
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for &E {
    fn driver_name(&self) -> &str {
        (**self).driver_name()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
        (**self).execute(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
        (**self).query(sql, args).await
    }

    async fn batch_execute(&self, sql: &str) -> BindResult<()> {
        (**self).batch_execute(sql).await
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Box<E> {
    fn driver_name(&self) -> &str {
        (**self).driver_name()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
        (**self).execute(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
        (**self).query(sql, args).await
    }

    async fn batch_execute(&self, sql: &str) -> BindResult<()> {
        (**self).batch_execute(sql).await
    }
}

/// An open transaction. Dropping it without committing rolls back on drivers that support it.
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self: Box<Self>) -> BindResult<()>;

    async fn rollback(self: Box<Self>) -> BindResult<()>;
}

/// Something that can open a transaction.
#[async_trait]
pub trait Transactor: Executor {
    async fn begin(&mut self) -> BindResult<Box<dyn Transaction + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_by_name() {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(columns, vec![Value::Int(1), Value::Text("a".into())]);
        assert_eq!(row.get("name"), Some(&Value::Text("a".into())));
        assert_eq!(row.get("missing"), None);
        assert!(row.try_get("missing").is_err());
        assert_eq!(row.len(), 2);
    }
}
