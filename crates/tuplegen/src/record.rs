//! Record instances and the typed accessor interface of generated types.
//!
//! A [`Record`] is an untyped instance of a [`LoadedType`]: the handle plus
//! one [`SqlValue`] per column. Generated structs implement [`Tuple`] so a
//! record can be turned into its typed form and back.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::codegen::TypeSpec;
use crate::core::{Conversion, SemanticType, SqlValue};
use crate::error::{Result, TupleGenError};
use crate::loader::LoadedType;

/// Instance of a loaded record type.
#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<LoadedType>,
    values: Vec<SqlValue>,
}

impl Record {
    /// Values must already match the type's columns.
    pub(crate) fn new(ty: Arc<LoadedType>, values: Vec<SqlValue>) -> Self {
        Self { ty, values }
    }

    /// The type this record was materialized with.
    pub fn loaded_type(&self) -> &Arc<LoadedType> {
        &self.ty
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Value of a column by exact name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.ty.column_index(column).map(|i| &self.values[i])
    }

    /// Replace a column value, converting it to the column's semantic type
    /// when a conversion exists.
    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) -> Result<()> {
        let idx = self.ty.column_index(column).ok_or_else(|| TupleGenError::UnknownAttribute {
            type_name: self.ty.qualified_name().to_string(),
            name: column.to_string(),
        })?;
        let target = self.ty.spec().columns[idx].semantic_type;
        self.values[idx] = coerce(self.ty.qualified_name(), column, value.into(), target)?;
        Ok(())
    }

    /// Convert into the generated struct `T`.
    ///
    /// `T` must have the name, version and columns this record was loaded with.
    pub fn into_tuple<T: Tuple>(self) -> Result<T> {
        let spec = self.ty.spec();
        if !tuple_matches::<T>(spec) {
            return Err(TupleGenError::record(
                self.ty.qualified_name(),
                format!(
                    "record is version {} but a different shape, {} version {}, was requested",
                    spec.version,
                    T::NAME,
                    T::VERSION
                ),
            ));
        }
        T::from_values(self.values)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.ty.spec().simple_name())?;
        for (i, (column, value)) in self.ty.spec().columns.iter().zip(&self.values).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", column.name, value)?;
        }
        f.write_str("}")
    }
}

/// A record read in for-update mode, with the primary key values of its
/// source row as they were read.
#[derive(Debug, Clone)]
pub struct KeyedRecord {
    record: Record,
    table: String,
    key_columns: Vec<String>,
    key_values: Vec<SqlValue>,
}

impl KeyedRecord {
    pub(crate) fn new(
        record: Record,
        table: String,
        key_columns: Vec<String>,
        key_values: Vec<SqlValue>,
    ) -> Self {
        Self {
            record,
            table,
            key_columns,
            key_values,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Mutable access for edits before an update. Key values keep
    /// identifying the row as originally read.
    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Source table, with the table prefix applied.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn key_values(&self) -> &[SqlValue] {
        &self.key_values
    }
}

/// Typed accessor interface implemented by generated record structs.
pub trait Tuple: Sized {
    /// Qualified type name.
    const NAME: &'static str;
    /// Version of the shape.
    const VERSION: u32;
    /// Column names and kinds in field order.
    const COLUMNS: &'static [(&'static str, SemanticType)];

    fn from_values(values: Vec<SqlValue>) -> Result<Self>;

    fn into_values(self) -> Vec<SqlValue>;
}

/// Whether the generated struct `T` was built from exactly `spec`.
pub(crate) fn tuple_matches<T: Tuple>(spec: &TypeSpec) -> bool {
    T::NAME == spec.qualified_name
        && T::VERSION == spec.version
        && T::COLUMNS.len() == spec.columns.len()
        && T::COLUMNS
            .iter()
            .zip(&spec.columns)
            .all(|((name, kind), column)| *name == column.name && *kind == column.semantic_type)
}

/// Check that `T` has the columns the rows of `statement` are read as.
///
/// Called by generated statement code before any row is decoded, so a
/// tuple of another shape fails without touching the database.
pub fn check_columns<T: Tuple>(
    statement: &str,
    columns: &[(&'static str, SemanticType)],
) -> Result<()> {
    if T::COLUMNS == columns {
        return Ok(());
    }
    let describe = |cols: &[(&str, SemanticType)]| {
        cols.iter()
            .map(|(name, kind)| format!("{} {}", name, kind))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(TupleGenError::record(
        T::NAME,
        format!(
            "{} reads rows as ({}) but {} has ({})",
            statement,
            describe(columns),
            T::NAME,
            describe(T::COLUMNS)
        ),
    ))
}

/// Values at `key_indexes`, in key order.
pub fn key_values(values: &[SqlValue], key_indexes: &[usize]) -> Vec<SqlValue> {
    key_indexes
        .iter()
        .filter_map(|&i| values.get(i).cloned())
        .collect()
}

/// Parameters of a keyed update: the non-key values in column order,
/// then the key values.
pub fn update_values(values: Vec<SqlValue>, key_indexes: &[usize]) -> Vec<SqlValue> {
    let keys = key_values(&values, key_indexes);
    let mut params: Vec<SqlValue> = values
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !key_indexes.contains(i))
        .map(|(_, value)| value)
        .collect();
    params.extend(keys);
    params
}

/// Rust field types a generated struct can hold.
pub trait FieldValue: Sized {
    const SEMANTIC_TYPE: SemanticType;

    /// `None` when `value` is of another kind.
    fn from_value(value: SqlValue) -> Option<Self>;

    fn into_value(value: Option<Self>) -> SqlValue;
}

macro_rules! field_value {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl FieldValue for $ty {
            const SEMANTIC_TYPE: SemanticType = SemanticType::$kind;

            fn from_value(value: SqlValue) -> Option<Self> {
                match value {
                    SqlValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(value: Option<Self>) -> SqlValue {
                value.map_or(SqlValue::Null(SemanticType::$kind), SqlValue::$variant)
            }
        }
    };
}

field_value!(bool, Bool, Bool);
field_value!(i32, Int, I32);
field_value!(i64, Long, I64);
field_value!(f64, Float, F64);
field_value!(String, Text, Text);
field_value!(NaiveDateTime, DateTime, DateTime);
field_value!(Vec<u8>, Opaque, Bytes);

/// Take the next value for a generated field, converting it to the field's
/// kind when a conversion exists.
pub fn take_field<T: FieldValue>(
    values: &mut impl Iterator<Item = SqlValue>,
    type_name: &str,
    column: &str,
) -> Result<Option<T>> {
    let value = values
        .next()
        .ok_or_else(|| TupleGenError::record(type_name, format!("missing value for {}", column)))?;
    if value.is_null() {
        return Ok(None);
    }
    let value = coerce(type_name, column, value, T::SEMANTIC_TYPE)?;
    T::from_value(value).map(Some).ok_or_else(|| {
        TupleGenError::record(
            type_name,
            format!("{} does not hold a {} value", column, T::SEMANTIC_TYPE),
        )
    })
}

/// Display form of a generated field; `null` when absent.
pub fn display_field<T: FieldValue + Clone>(value: &Option<T>) -> String {
    T::into_value(value.clone()).to_string()
}

/// Convert `value` to `target`, keeping NULLs typed.
pub(crate) fn coerce(
    type_name: &str,
    column: &str,
    value: SqlValue,
    target: SemanticType,
) -> Result<SqlValue> {
    let kind = value.semantic_type();
    if kind == target {
        return Ok(value);
    }
    if value.is_null() {
        return Ok(SqlValue::Null(target));
    }
    let conversion = Conversion::between(kind, target).ok_or_else(|| {
        TupleGenError::record(
            type_name,
            format!("{} expects {} but got {}", column, target, kind),
        )
    })?;
    conversion
        .apply(&value, target)
        .map_err(|e| TupleGenError::record(type_name, format!("{}: {}", column, e)))
}
