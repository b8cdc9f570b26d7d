//! Portable value kinds and the conversions allowed between them.
//!
//! Every native column type is mapped to one [`SemanticType`] by its
//! dialect. When a retained column changes semantic type between two
//! versions of a record type, [`Conversion::between`] decides whether the
//! change can be reconciled:
//!
//! | from \ to | bool | int | long | float | text | datetime | opaque |
//! |-----------|------|-----|------|-------|------|----------|--------|
//! | bool      | =    | 0/1 | 0/1  |       | yes  |          |        |
//! | int       |      | =   | wide | wide  | yes  |          |        |
//! | long      |      | chk | =    | wide  | yes  |          |        |
//! | float     |      |     |      | =     | yes  |          |        |
//! | text      |      |     |      |       | =    |          | utf8   |
//! | datetime  |      |     |      |       | yes  | =        |        |
//! | opaque    |      |     |      |       |      |          | =      |
//!
//! `chk` is a range-checked narrowing that fails at reconcile time for
//! values outside the target range. Blank cells have no conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// Portable value kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Bool,
    Int,
    Long,
    Float,
    Text,
    DateTime,
    /// Fallback for native types with no mapping.
    Opaque,
}

impl SemanticType {
    /// Rust type used for fields of this kind in generated source.
    pub fn rust_type(self) -> &'static str {
        match self {
            SemanticType::Bool => "bool",
            SemanticType::Int => "i32",
            SemanticType::Long => "i64",
            SemanticType::Float => "f64",
            SemanticType::Text => "String",
            SemanticType::DateTime => "::tuplegen::chrono::NaiveDateTime",
            SemanticType::Opaque => "Vec<u8>",
        }
    }

    /// Rust expression for the zero value in generated source.
    pub fn zero_literal(self) -> &'static str {
        match self {
            SemanticType::Bool => "false",
            SemanticType::Int => "0i32",
            SemanticType::Long => "0i64",
            SemanticType::Float => "0.0f64",
            SemanticType::Text => "String::new()",
            SemanticType::DateTime => "::tuplegen::chrono::NaiveDateTime::default()",
            SemanticType::Opaque => "Vec::new()",
        }
    }

    /// Zero value of this kind.
    pub fn zero_value(self) -> SqlValue {
        match self {
            SemanticType::Bool => SqlValue::Bool(false),
            SemanticType::Int => SqlValue::I32(0),
            SemanticType::Long => SqlValue::I64(0),
            SemanticType::Float => SqlValue::F64(0.0),
            SemanticType::Text => SqlValue::Text(String::new()),
            SemanticType::DateTime => SqlValue::DateTime(chrono::NaiveDateTime::default()),
            SemanticType::Opaque => SqlValue::Bytes(Vec::new()),
        }
    }

    /// Native type used when a column is declared without one.
    pub fn default_native(self) -> &'static str {
        match self {
            SemanticType::Bool => "BOOLEAN",
            SemanticType::Int => "INTEGER",
            SemanticType::Long => "BIGINT",
            SemanticType::Float => "DOUBLE PRECISION",
            SemanticType::Text => "TEXT",
            SemanticType::DateTime => "TIMESTAMP",
            SemanticType::Opaque => "BLOB",
        }
    }

    /// Variant path used in generated source.
    pub fn variant_name(self) -> &'static str {
        match self {
            SemanticType::Bool => "Bool",
            SemanticType::Int => "Int",
            SemanticType::Long => "Long",
            SemanticType::Float => "Float",
            SemanticType::Text => "Text",
            SemanticType::DateTime => "DateTime",
            SemanticType::Opaque => "Opaque",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Bool => "bool",
            SemanticType::Int => "int",
            SemanticType::Long => "long",
            SemanticType::Float => "float",
            SemanticType::Text => "text",
            SemanticType::DateTime => "datetime",
            SemanticType::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// A defined conversion between two semantic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    /// Same type, value copied.
    Identity,
    /// Lossless numeric widening.
    Widen,
    /// Range-checked narrowing from long to int.
    Narrow,
    /// `false`/`true` become 0/1.
    BoolToNumber,
    /// Rendered with the value's display form.
    ToText,
    /// UTF-8 bytes of the text.
    TextToBytes,
}

impl Conversion {
    /// Conversion from `from` to `to`, if one is defined.
    pub fn between(from: SemanticType, to: SemanticType) -> Option<Conversion> {
        use SemanticType::*;

        if from == to {
            return Some(Conversion::Identity);
        }
        match (from, to) {
            (Int, Long) | (Int, Float) | (Long, Float) => Some(Conversion::Widen),
            (Long, Int) => Some(Conversion::Narrow),
            (Bool, Int) | (Bool, Long) => Some(Conversion::BoolToNumber),
            (Bool | Int | Long | Float | DateTime, Text) => Some(Conversion::ToText),
            (Text, Opaque) => Some(Conversion::TextToBytes),
            _ => None,
        }
    }

    /// Apply the conversion to a value, producing a value of kind `to`.
    ///
    /// NULL stays NULL. Fails only for out-of-range narrowing or a value
    /// whose kind does not match the conversion.
    pub fn apply(self, value: &SqlValue, to: SemanticType) -> Result<SqlValue, String> {
        if value.is_null() {
            return Ok(SqlValue::Null(to));
        }
        let converted = match (self, value, to) {
            (Conversion::Identity, v, _) => Some(v.clone()),
            (Conversion::Widen, SqlValue::I32(v), SemanticType::Long) => {
                Some(SqlValue::I64(i64::from(*v)))
            }
            (Conversion::Widen, SqlValue::I32(v), SemanticType::Float) => {
                Some(SqlValue::F64(f64::from(*v)))
            }
            (Conversion::Widen, SqlValue::I64(v), SemanticType::Float) => {
                Some(SqlValue::F64(*v as f64))
            }
            (Conversion::Narrow, SqlValue::I64(v), SemanticType::Int) => {
                let narrowed = i32::try_from(*v)
                    .map_err(|_| format!("value {} is out of range for int", v))?;
                Some(SqlValue::I32(narrowed))
            }
            (Conversion::BoolToNumber, SqlValue::Bool(b), SemanticType::Int) => {
                Some(SqlValue::I32(i32::from(*b)))
            }
            (Conversion::BoolToNumber, SqlValue::Bool(b), SemanticType::Long) => {
                Some(SqlValue::I64(i64::from(*b)))
            }
            (Conversion::ToText, v, SemanticType::Text) => Some(SqlValue::Text(v.to_string())),
            (Conversion::TextToBytes, SqlValue::Text(s), SemanticType::Opaque) => {
                Some(SqlValue::Bytes(s.as_bytes().to_vec()))
            }
            _ => None,
        };
        converted.ok_or_else(|| format!("{:?} cannot be applied to {:?} for {}", self, value, to))
    }

    /// Rust expression converting `expr` (an `Option` of the source field
    /// type) into an `Option` of the target field type.
    ///
    /// Narrowing uses `?` and must be rendered inside a function returning
    /// the library `Result`.
    pub fn render(self, expr: &str, to: SemanticType, type_name: &str, column: &str) -> String {
        match (self, to) {
            (Conversion::Identity, _) => format!("{}.clone()", expr),
            (Conversion::Widen, SemanticType::Long) => format!("{}.map(i64::from)", expr),
            (Conversion::Widen, _) => format!("{}.map(|v| v as f64)", expr),
            (Conversion::Narrow, _) => format!(
                "{}.map(i32::try_from).transpose().map_err(|_| ::tuplegen::TupleGenError::record({:?}, {:?}))?",
                expr,
                type_name,
                format!("{} is out of range for int", column)
            ),
            (Conversion::BoolToNumber, SemanticType::Long) => format!("{}.map(i64::from)", expr),
            (Conversion::BoolToNumber, _) => format!("{}.map(i32::from)", expr),
            (Conversion::ToText, _) => format!("{}.as_ref().map(|v| v.to_string())", expr),
            (Conversion::TextToBytes, _) => {
                format!("{}.as_ref().map(|v| v.as_bytes().to_vec())", expr)
            }
        }
    }
}
