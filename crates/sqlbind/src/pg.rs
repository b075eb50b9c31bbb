//! tokio-postgres adapter: [`Value`] encoding, row decoding and executor impls.

use crate::client::{Executor, Row, Transaction, Transactor};
use crate::error::{BindError, BindResult};
use crate::value::Value;
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};

type EncodeResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// Driver name the tokio-postgres executors report.
pub const DRIVER_NAME: &str = "postgres";

fn encode<T: ToSql>(value: T, ty: &Type, out: &mut BytesMut, kind: &str) -> EncodeResult {
    if !T::accepts(ty) {
        return Err(format!("cannot encode {kind} value as Postgres type {ty}").into());
    }
    value.to_sql(ty, out)
}

fn is_text(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        let kind = self.type_name();
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => encode(*v, ty, out, kind),
            Value::Int(v) => match *ty {
                Type::INT2 => encode(i16::try_from(*v)?, ty, out, kind),
                Type::INT4 => encode(i32::try_from(*v)?, ty, out, kind),
                Type::OID => encode(u32::try_from(*v)?, ty, out, kind),
                Type::FLOAT4 => encode(*v as f32, ty, out, kind),
                Type::FLOAT8 => encode(*v as f64, ty, out, kind),
                _ if is_text(ty) => encode(v.to_string().as_str(), ty, out, kind),
                _ => encode(*v, ty, out, kind),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => encode(*v as f32, ty, out, kind),
                _ if is_text(ty) => encode(v.to_string().as_str(), ty, out, kind),
                _ => encode(*v, ty, out, kind),
            },
            Value::Text(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    encode(serde_json::Value::String(s.clone()), ty, out, kind)
                }
                _ => encode(s.as_str(), ty, out, kind),
            },
            Value::Bytes(b) => encode(b.as_slice(), ty, out, kind),
            Value::Uuid(u) => encode(*u, ty, out, kind),
            Value::Date(d) => encode(*d, ty, out, kind),
            Value::Timestamp(t) => encode(*t, ty, out, kind),
            Value::TimestampTz(t) => encode(*t, ty, out, kind),
            Value::Json(j) => encode(j, ty, out, kind),
            Value::List(items) => match ty.kind() {
                Kind::Array(_) => items.to_sql(ty, out),
                _ => Err(format!(
                    "list value bound to non-array Postgres type {ty}; expand it with an IN query"
                )
                .into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> BindResult<Option<T>>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| BindError::decode(row.columns()[idx].name(), e.to_string()))
}

fn list<'a, T>(row: &'a tokio_postgres::Row, idx: usize, f: fn(T) -> Value) -> BindResult<Value>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    Ok(get::<Vec<Option<T>>>(row, idx)?
        .map(|items| {
            Value::List(
                items
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, f))
                    .collect(),
            )
        })
        .unwrap_or(Value::Null))
}

fn decode_column(row: &tokio_postgres::Row, idx: usize) -> BindResult<Value> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(Value::Uuid),
        Type::DATE => get::<NaiveDate>(row, idx)?.map(Value::Date),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?.map(Value::TimestampTz),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        Type::BOOL_ARRAY => return list::<bool>(row, idx, Value::Bool),
        Type::INT4_ARRAY => return list::<i32>(row, idx, |v| Value::Int(v.into())),
        Type::INT8_ARRAY => return list::<i64>(row, idx, Value::Int),
        Type::FLOAT8_ARRAY => return list::<f64>(row, idx, Value::Float),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => return list::<String>(row, idx, Value::Text),
        Type::UUID_ARRAY => return list::<uuid::Uuid>(row, idx, Value::Uuid),
        _ if is_text(ty) => get::<String>(row, idx)?.map(Value::Text),
        _ => {
            return Err(BindError::decode(
                row.columns()[idx].name(),
                format!("unsupported Postgres type {ty}"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Convert tokio-postgres rows into [`Row`]s sharing one column list.
pub fn decode_rows(rows: Vec<tokio_postgres::Row>) -> BindResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|idx| decode_column(row, idx))
                .collect::<BindResult<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&columns), values))
        })
        .collect()
}

#[async_trait]
impl Executor for tokio_postgres::Client {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
        Ok(tokio_postgres::Client::execute(self, sql, &params(args)).await?)
    }

    async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
        decode_rows(tokio_postgres::Client::query(self, sql, &params(args)).await?)
    }

    async fn batch_execute(&self, sql: &str) -> BindResult<()> {
        Ok(tokio_postgres::Client::batch_execute(self, sql).await?)
    }
}

#[async_trait]
impl Transactor for tokio_postgres::Client {
    async fn begin(&mut self) -> BindResult<Box<dyn Transaction + '_>> {
        let tx = self.transaction().await?;
        Ok(Box::new(tx))
    }
}

#[async_trait]
impl<'a> Executor for tokio_postgres::Transaction<'a> {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> BindResult<u64> {
        Ok(tokio_postgres::Transaction::execute(self, sql, &params(args)).await?)
    }

    async fn query(&self, sql: &str, args: &[Value]) -> BindResult<Vec<Row>> {
        decode_rows(tokio_postgres::Transaction::query(self, sql, &params(args)).await?)
    }

    async fn batch_execute(&self, sql: &str) -> BindResult<()> {
        Ok(tokio_postgres::Transaction::batch_execute(self, sql).await?)
    }
}

#[async_trait]
impl<'a> Transaction for tokio_postgres::Transaction<'a> {
    async fn commit(self: Box<Self>) -> BindResult<()> {
        Ok(tokio_postgres::Transaction::commit(*self).await?)
    }

    async fn rollback(self: Box<Self>) -> BindResult<()> {
        Ok(tokio_postgres::Transaction::rollback(*self).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: &Value, ty: &Type) -> Result<Vec<u8>, String> {
        let mut buf = BytesMut::new();
        value
            .to_sql(ty, &mut buf)
            .map(|_| buf.to_vec())
            .map_err(|e| e.to_string())
    }

    #[test]
    fn ints_narrow_to_column_width() {
        assert_eq!(encoded(&Value::Int(7), &Type::INT4).unwrap(), 7i32.to_be_bytes());
        assert_eq!(encoded(&Value::Int(7), &Type::INT2).unwrap(), 7i16.to_be_bytes());
        assert_eq!(encoded(&Value::Int(7), &Type::INT8).unwrap(), 7i64.to_be_bytes());
        assert!(encoded(&Value::Int(1 << 40), &Type::INT4).is_err());
    }

    #[test]
    fn mismatched_types_are_errors() {
        let err = encoded(&Value::Bool(true), &Type::UUID).unwrap_err();
        assert!(err.contains("bool"));
    }

    #[test]
    fn lists_need_array_types() {
        let list = Value::list([1_i64, 2]);
        assert!(encoded(&list, &Type::INT8).is_err());
        assert!(encoded(&list, &Type::INT8_ARRAY).is_ok());
    }

    #[test]
    fn null_is_null() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            Value::Null.to_sql(&Type::TEXT, &mut buf).unwrap(),
            IsNull::Yes
        ));
    }
}
