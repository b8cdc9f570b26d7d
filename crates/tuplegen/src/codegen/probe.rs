//! Column descriptors from a query result shape or a table definition.

use tracing::debug;

use crate::core::traits::Dialect;
use crate::core::ColumnDescriptor;
use crate::db::ConnectionManager;
use crate::error::{Result, TupleGenError};

/// Introspects result shapes through a [`ConnectionManager`].
///
/// Every failure, connectivity included, surfaces as
/// [`TupleGenError::Probe`] naming the query or table.
pub struct SchemaProbe<'a> {
    db: &'a ConnectionManager,
}

impl<'a> SchemaProbe<'a> {
    pub fn new(db: &'a ConnectionManager) -> Self {
        Self { db }
    }

    /// Columns of a query's result, in result order. The query is prepared,
    /// not executed.
    pub async fn probe_query(&self, sql: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut session = self
            .db
            .session()
            .await
            .map_err(|e| TupleGenError::probe(sql, e))?;
        let columns = session
            .describe(sql)
            .await
            .map_err(|e| TupleGenError::probe(sql, e))?;
        if columns.is_empty() {
            return Err(TupleGenError::probe(sql, "statement returns no columns"));
        }
        Ok(self.descriptors(columns))
    }

    /// Columns of a table, in declaration order.
    pub async fn probe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut session = self
            .db
            .session()
            .await
            .map_err(|e| TupleGenError::probe(table, e))?;
        let exists = session
            .table_exists(table)
            .await
            .map_err(|e| TupleGenError::probe(table, e))?;
        if !exists {
            return Err(TupleGenError::probe(table, "table does not exist"));
        }
        let columns = session
            .table_columns(table)
            .await
            .map_err(|e| TupleGenError::probe(table, e))?;
        if columns.is_empty() {
            return Err(TupleGenError::probe(table, "table has no visible columns"));
        }
        Ok(self.descriptors(columns))
    }

    fn descriptors(&self, columns: Vec<(String, String)>) -> Vec<ColumnDescriptor> {
        let dialect = self.db.dialect();
        columns
            .into_iter()
            .map(|(name, native)| {
                let semantic = dialect.semantic_type(&native);
                debug!("probed column {} {} -> {}", name, native, semantic);
                ColumnDescriptor::new(name, native, semantic)
            })
            .collect()
    }
}
