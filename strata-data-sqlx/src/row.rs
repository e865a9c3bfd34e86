//! Conversions between [`Value`]s and SQLite statement parameters / rows.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Decode, Row, Sqlite, TypeInfo, ValueRef};
use strata_data::{DataError, Value, Values};

use crate::error::SqlxErrorExt;

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Build a query for `sql` with `params` bound in order.
pub(crate) fn bind_all<'q>(sql: &'q str, params: &[Value]) -> SqliteQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_value(query, value))
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
    }
}

/// Decode every column of `row` by its storage class.
pub(crate) fn decode_row(row: &SqliteRow) -> Result<Values, DataError> {
    let mut values = Values::new();
    for (idx, column) in row.columns().iter().enumerate() {
        values.insert(column.name(), decode_column(row, idx)?);
    }
    Ok(values)
}

fn decode_column(row: &SqliteRow, idx: usize) -> Result<Value, DataError> {
    let storage_class = {
        let raw = row.try_get_raw(idx).map_err(SqlxErrorExt::into_data_error)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };
    let value = match storage_class.as_str() {
        "INTEGER" => Value::Int(get(row, idx)?),
        "BOOLEAN" => Value::Bool(get(row, idx)?),
        "REAL" | "NUMERIC" => Value::Float(get(row, idx)?),
        "TEXT" | "DATE" | "TIME" | "DATETIME" => Value::Text(get(row, idx)?),
        other => {
            return Err(DataError::Other(format!(
                "unsupported SQLite storage class '{other}' in column {idx}"
            )))
        }
    };
    Ok(value)
}

fn get<'r, T: Decode<'r, Sqlite>>(row: &'r SqliteRow, idx: usize) -> Result<T, DataError> {
    row.try_get_unchecked(idx)
        .map_err(SqlxErrorExt::into_data_error)
}
