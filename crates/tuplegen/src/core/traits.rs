//! Core traits shared by the dialect implementations.
//!
//! # Design Patterns
//!
//! - **Strategy**: each [`Dialect`] supplies its own quoting, placeholder
//!   syntax and native type table.
//! - **Template Method**: [`Dialect::prepare_sql`], [`Dialect::quote_table`]
//!   and the keyed write statements are built from the per-dialect
//!   primitives.

use super::identifier::validate_identifier;
use super::semantic::SemanticType;
use crate::dialect::{replace_table_prefix, rewrite_placeholders, TypeMapTable};
use crate::error::Result;

/// SQL syntax strategy for a database engine.
pub trait Dialect: Send + Sync {
    /// Dialect name (e.g., "postgres", "sqlite").
    fn name(&self) -> &str;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Placeholder for the 1-based parameter `index`.
    fn param_placeholder(&self, index: usize) -> String;

    /// Native type name to semantic type table.
    fn type_map(&self) -> &TypeMapTable;

    /// Map a native type name to its semantic type.
    fn semantic_type(&self, native: &str) -> SemanticType {
        self.type_map().lookup(native)
    }

    /// Quote a possibly schema-qualified table name (`schema.table`).
    fn quote_table(&self, table: &str) -> Result<String> {
        let mut parts = Vec::new();
        for part in table.split('.') {
            validate_identifier(part)?;
            parts.push(self.quote_ident(part));
        }
        Ok(parts.join("."))
    }

    /// `INSERT INTO table (columns) VALUES (?, ...)`.
    fn insert_sql(&self, table: &str, columns: &[String]) -> Result<String> {
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_table(table)?,
            quoted.join(", "),
            vec!["?"; columns.len()].join(", ")
        ))
    }

    /// `UPDATE table SET a = ?, ... WHERE k = ? AND ...`. Parameters are the
    /// assigned values followed by the key values.
    fn update_sql(&self, table: &str, assigned: &[String], keys: &[String]) -> Result<String> {
        let assignments: Vec<String> = assigned
            .iter()
            .map(|c| format!("{} = ?", self.quote_ident(c)))
            .collect();
        Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            self.quote_table(table)?,
            assignments.join(", "),
            self.key_predicate(keys)
        ))
    }

    /// `DELETE FROM table WHERE k = ? AND ...`.
    fn delete_sql(&self, table: &str, keys: &[String]) -> Result<String> {
        Ok(format!(
            "DELETE FROM {} WHERE {}",
            self.quote_table(table)?,
            self.key_predicate(keys)
        ))
    }

    /// `k1 = ? AND k2 = ?` over the key columns.
    fn key_predicate(&self, keys: &[String]) -> String {
        keys.iter()
            .map(|k| format!("{} = ?", self.quote_ident(k)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Substitute the table prefix for `$$` and render `?` placeholders in
    /// this dialect's syntax.
    fn prepare_sql(&self, sql: &str, table_prefix: &str) -> String {
        let prefixed = replace_table_prefix(sql, table_prefix);
        rewrite_placeholders(&prefixed, |i| self.param_placeholder(i))
    }
}
