//! Binding and decoding [`SqlValue`] for SQLite.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::core::traits::Dialect;
use crate::core::{SemanticType, SqlValue};
use crate::error::Result;

use super::SqliteDialect;

/// Bind parameters in call order.
pub(crate) fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null(_) => query.bind(None::<i64>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}

/// Semantic types of a row's columns, preferring `hint` when it fits.
pub(crate) fn row_kinds(row: &SqliteRow, hint: Option<&[SemanticType]>) -> Vec<SemanticType> {
    match hint {
        Some(kinds) if kinds.len() == row.columns().len() => kinds.to_vec(),
        _ => (0..row.columns().len()).map(|idx| value_kind(row, idx)).collect(),
    }
}

/// Declared type of a column, or the storage class of its value when the
/// column is an expression with no declared type.
fn value_kind(row: &SqliteRow, idx: usize) -> SemanticType {
    let declared = SqliteDialect.semantic_type(row.columns()[idx].type_info().name());
    if declared != SemanticType::Opaque {
        return declared;
    }
    match row.try_get_raw(idx) {
        Ok(value) if !value.is_null() => SqliteDialect.semantic_type(value.type_info().name()),
        _ => declared,
    }
}

/// Decode column `idx` as `kind`.
///
/// SQLite values carry a storage class rather than a declared type, so
/// decoding relies on SQLite's own conversions instead of sqlx's type check.
pub(crate) fn decode_value(row: &SqliteRow, idx: usize, kind: SemanticType) -> Result<SqlValue> {
    let value = match kind {
        SemanticType::Bool => row
            .try_get_unchecked::<Option<bool>, _>(idx)?
            .map(SqlValue::Bool),
        SemanticType::Int => row
            .try_get_unchecked::<Option<i32>, _>(idx)?
            .map(SqlValue::I32),
        SemanticType::Long => row
            .try_get_unchecked::<Option<i64>, _>(idx)?
            .map(SqlValue::I64),
        SemanticType::Float => row
            .try_get_unchecked::<Option<f64>, _>(idx)?
            .map(SqlValue::F64),
        SemanticType::Text => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(SqlValue::Text),
        SemanticType::DateTime => row
            .try_get_unchecked::<Option<chrono::NaiveDateTime>, _>(idx)?
            .map(SqlValue::DateTime),
        SemanticType::Opaque => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(idx)?
            .map(SqlValue::Bytes),
    };
    Ok(value.unwrap_or(SqlValue::Null(kind)))
}
