//! Defined queries and updates.
//!
//! A [`StatementSpec`] fixes one SQL text with `?` placeholders together
//! with the kinds of its parameters. Queries also name the record type
//! their rows take, and a query defined over a table carries the keyed
//! write statements for that table so generated code can insert, update
//! and delete rows of that shape.

use serde::{Deserialize, Serialize};

use crate::core::identifier::{simple_name, validate_qualified_name};
use crate::core::traits::Dialect;
use crate::core::{ColumnDescriptor, SemanticType, SqlValue};
use crate::dialect::count_placeholders;
use crate::error::{Result, TupleGenError};

/// A named SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSpec {
    pub qualified_name: String,
    /// Statement text; `?` marks parameters and `$$` the table prefix.
    pub sql: String,
    /// Kind of each `?`, in order.
    pub params: Vec<SemanticType>,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    /// Rows are shaped as the record type `tuple_name`.
    Query {
        tuple_name: String,
        columns: Vec<ColumnDescriptor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<TableWrites>,
    },
    /// Returns an affected-row count.
    Update,
}

/// Keyed write statements for the table a query reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWrites {
    pub table: String,
    pub key_columns: Vec<String>,
    /// Result positions of the key columns.
    pub key_indexes: Vec<usize>,
    /// Every column, in result order.
    pub insert_sql: String,
    /// Non-key columns, then the key columns as predicate. `None` when
    /// every selected column is part of the key.
    pub update_sql: Option<String>,
    pub delete_sql: String,
}

impl TableWrites {
    /// Write statements for `table` whose rows are read as `columns`.
    ///
    /// `table` must already have its prefix resolved. Fails with
    /// `NoPrimaryKey` when `key_columns` is empty and with a `Record` error
    /// when a key column is not among `columns`.
    pub fn new(
        dialect: &impl Dialect,
        type_name: &str,
        table: &str,
        columns: &[ColumnDescriptor],
        key_columns: Vec<String>,
    ) -> Result<Self> {
        if key_columns.is_empty() {
            return Err(TupleGenError::NoPrimaryKey(table.to_string()));
        }
        let mut key_indexes = Vec::with_capacity(key_columns.len());
        for key in &key_columns {
            let idx = columns.iter().position(|c| &c.name == key).ok_or_else(|| {
                TupleGenError::record(
                    type_name,
                    format!("primary key column {} of {} is not selected", key, table),
                )
            })?;
            key_indexes.push(idx);
        }

        let all: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let assigned: Vec<String> = all
            .iter()
            .filter(|c| !key_columns.contains(c))
            .cloned()
            .collect();
        let update_sql = if assigned.is_empty() {
            None
        } else {
            Some(dialect.update_sql(table, &assigned, &key_columns)?)
        };

        Ok(Self {
            insert_sql: dialect.insert_sql(table, &all)?,
            update_sql,
            delete_sql: dialect.delete_sql(table, &key_columns)?,
            table: table.to_string(),
            key_columns,
            key_indexes,
        })
    }
}

impl StatementSpec {
    /// A query whose rows take the shape of `tuple_name`.
    pub fn query(
        qualified_name: &str,
        sql: &str,
        args: &[SqlValue],
        tuple_name: &str,
        columns: Vec<ColumnDescriptor>,
        table: Option<TableWrites>,
    ) -> Result<Self> {
        Self::checked(
            qualified_name,
            sql,
            args,
            StatementKind::Query {
                tuple_name: tuple_name.to_string(),
                columns,
                table,
            },
        )
    }

    /// A statement run for its affected-row count.
    pub fn update(qualified_name: &str, sql: &str, args: &[SqlValue]) -> Result<Self> {
        Self::checked(qualified_name, sql, args, StatementKind::Update)
    }

    fn checked(qualified_name: &str, sql: &str, args: &[SqlValue], kind: StatementKind) -> Result<Self> {
        validate_qualified_name(qualified_name)?;
        let placeholders = count_placeholders(sql);
        if placeholders != args.len() {
            return Err(TupleGenError::record(
                qualified_name,
                format!(
                    "statement has {} parameters but {} sample arguments were given",
                    placeholders,
                    args.len()
                ),
            ));
        }
        Ok(Self {
            qualified_name: qualified_name.to_string(),
            sql: sql.to_string(),
            params: args.iter().map(SqlValue::semantic_type).collect(),
            kind,
        })
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.qualified_name)
    }

    /// Check `args` against the declared parameter kinds.
    pub fn check_args(&self, args: &[SqlValue]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(TupleGenError::record(
                &self.qualified_name,
                format!("expected {} arguments, got {}", self.params.len(), args.len()),
            ));
        }
        for (i, (arg, kind)) in args.iter().zip(&self.params).enumerate() {
            if arg.semantic_type() != *kind {
                return Err(TupleGenError::record(
                    &self.qualified_name,
                    format!("argument {} is {} but {} is declared", i, arg.semantic_type(), kind),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SqliteDialect;

    fn item_columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::declared("id", SemanticType::Long),
            ColumnDescriptor::declared("name", SemanticType::Text),
            ColumnDescriptor::declared("qty", SemanticType::Long),
        ]
    }

    #[test]
    fn test_params_follow_sample_arguments() {
        let spec = StatementSpec::update(
            "app.Restock",
            "UPDATE item SET qty = qty + ? WHERE name = ?",
            &[5i64.into(), "bolt".into()],
        )
        .unwrap();
        assert_eq!(spec.params, vec![SemanticType::Long, SemanticType::Text]);
        assert_eq!(spec.simple_name(), "Restock");
        assert!(spec.check_args(&[1i64.into(), "nut".into()]).is_ok());
        assert!(spec.check_args(&["nut".into(), 1i64.into()]).is_err());
        assert!(spec.check_args(&[1i64.into()]).is_err());
    }

    #[test]
    fn test_argument_count_must_match_placeholders() {
        let err = StatementSpec::update("app.Bad", "DELETE FROM item WHERE id = ?", &[]).unwrap_err();
        assert!(matches!(err, TupleGenError::Record { .. }));

        // A quoted question mark is not a parameter.
        assert!(StatementSpec::update("app.Ok", "UPDATE item SET name = '?'", &[]).is_ok());
    }

    #[test]
    fn test_table_writes() {
        let writes =
            TableWrites::new(&SqliteDialect::new(), "app.Item", "item", &item_columns(), vec!["id".into()])
                .unwrap();
        assert_eq!(writes.key_indexes, vec![0]);
        assert_eq!(
            writes.insert_sql,
            "INSERT INTO \"item\" (\"id\", \"name\", \"qty\") VALUES (?, ?, ?)"
        );
        assert_eq!(
            writes.update_sql.as_deref(),
            Some("UPDATE \"item\" SET \"name\" = ?, \"qty\" = ? WHERE \"id\" = ?")
        );
        assert_eq!(writes.delete_sql, "DELETE FROM \"item\" WHERE \"id\" = ?");
    }

    #[test]
    fn test_table_writes_need_selected_key() {
        let dialect = SqliteDialect::new();
        let err = TableWrites::new(&dialect, "app.Item", "item", &item_columns(), vec![]).unwrap_err();
        assert!(matches!(err, TupleGenError::NoPrimaryKey(_)));

        let err = TableWrites::new(&dialect, "app.Item", "item", &item_columns()[1..], vec!["id".into()])
            .unwrap_err();
        assert!(matches!(err, TupleGenError::Record { .. }));

    }

    #[test]
    fn test_key_only_table_has_no_update() {
        let writes = TableWrites::new(
            &SqliteDialect::new(),
            "app.Link",
            "item",
            &item_columns()[..1],
            vec!["id".into()],
        )
        .unwrap();
        assert!(writes.update_sql.is_none());
        assert_eq!(writes.delete_sql, "DELETE FROM \"item\" WHERE \"id\" = ?");
    }
}
