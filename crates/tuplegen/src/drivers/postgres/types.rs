//! Conversion between [`SqlValue`] and the PostgreSQL wire format.

use std::error::Error;

use bytes::BytesMut;
use rust_decimal::prelude::ToPrimitive;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::Row;

use crate::core::traits::Dialect;
use crate::core::{SemanticType, SqlValue};
use crate::error::{Result, TupleGenError};

use super::PostgresDialect;

type BoxError = Box<dyn Error + Sync + Send>;

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            SqlValue::Null(_) => Ok(IsNull::Yes),
            SqlValue::Bool(v) => match ty.name() {
                "int2" | "int4" | "int8" => encode_int(i64::from(*v), ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::I32(v) => encode_int(i64::from(*v), ty, out),
            SqlValue::I64(v) => encode_int(*v, ty, out),
            SqlValue::F64(v) => match ty.name() {
                "float4" => (*v as f32).to_sql(ty, out),
                "numeric" => rust_decimal::Decimal::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Text(v) => v.to_sql(ty, out),
            SqlValue::DateTime(v) => match ty.name() {
                "timestamptz" => v.and_utc().to_sql(ty, out),
                "date" => v.date().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Encode an integer for whatever integer-like type the server expects.
fn encode_int(v: i64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match ty.name() {
        "int2" => i16::try_from(v)?.to_sql(ty, out),
        "int4" => i32::try_from(v)?.to_sql(ty, out),
        "float4" => (v as f32).to_sql(ty, out),
        "float8" => (v as f64).to_sql(ty, out),
        "numeric" => rust_decimal::Decimal::from(v).to_sql(ty, out),
        "bool" => (v != 0).to_sql(ty, out),
        "text" | "varchar" | "bpchar" => v.to_string().to_sql(ty, out),
        _ => v.to_sql(ty, out),
    }
}

/// Raw bytes of a value of any type.
struct RawBytes(Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawBytes(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode column `idx` of `row`, whose server type is `ty`.
pub(crate) fn decode_value(row: &Row, idx: usize, ty: &Type) -> Result<SqlValue> {
    let semantic = PostgresDialect.semantic_type(ty.name());
    let value = match semantic {
        SemanticType::Bool => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        SemanticType::Int => match ty.name() {
            "int2" => row
                .try_get::<_, Option<i16>>(idx)?
                .map(|v| SqlValue::I32(i32::from(v))),
            _ => row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::I32),
        },
        SemanticType::Long => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::I64),
        SemanticType::Float => match ty.name() {
            "float4" => row
                .try_get::<_, Option<f32>>(idx)?
                .map(|v| SqlValue::F64(f64::from(v))),
            "numeric" => match row.try_get::<_, Option<rust_decimal::Decimal>>(idx)? {
                Some(d) => Some(SqlValue::F64(d.to_f64().ok_or_else(|| {
                    TupleGenError::Transaction(format!("numeric value {} does not fit a float", d))
                })?)),
                None => None,
            },
            _ => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::F64),
        },
        SemanticType::Text => row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text),
        SemanticType::DateTime => match ty.name() {
            "timestamptz" => row
                .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
                .map(|v| SqlValue::DateTime(v.naive_utc())),
            "date" => row
                .try_get::<_, Option<chrono::NaiveDate>>(idx)?
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(SqlValue::DateTime),
            _ => row
                .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
                .map(SqlValue::DateTime),
        },
        SemanticType::Opaque => row
            .try_get::<_, Option<RawBytes>>(idx)?
            .map(|raw| SqlValue::Bytes(raw.0)),
    };
    Ok(value.unwrap_or(SqlValue::Null(semantic)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_encodes_as_null() {
        let mut buf = BytesMut::new();
        let is_null = SqlValue::Null(SemanticType::Int)
            .to_sql(&Type::INT4, &mut buf)
            .unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_int_narrows_to_int4() {
        let mut buf = BytesMut::new();
        SqlValue::I64(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &7i32.to_be_bytes());
    }

    #[test]
    fn test_int_out_of_range_for_int2() {
        let mut buf = BytesMut::new();
        assert!(SqlValue::I64(100_000).to_sql(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn test_int_widens_to_int8() {
        let mut buf = BytesMut::new();
        SqlValue::I32(-1).to_sql(&Type::INT8, &mut buf).unwrap();
        assert_eq!(&buf[..], &(-1i64).to_be_bytes());
    }
}
