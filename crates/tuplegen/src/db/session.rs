//! Dialect-aware operations on one pooled connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::core::traits::Dialect;
use crate::core::{SemanticType, SqlValue};
use crate::dialect::replace_table_prefix;
use crate::drivers::{DialectImpl, SessionImpl};
use crate::error::{Result, TupleGenError};
use crate::loader::LoadedType;
use crate::record::{KeyedRecord, Record, Tuple};

/// State shared by every session of one [`ConnectionManager`](super::ConnectionManager).
pub(crate) struct DbContext {
    pub(crate) dialect: DialectImpl,
    pub(crate) table_prefix: String,
    primary_keys: RwLock<HashMap<String, Vec<String>>>,
}

impl DbContext {
    pub(crate) fn new(dialect: DialectImpl, table_prefix: String) -> Self {
        Self {
            dialect,
            table_prefix,
            primary_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Caller SQL rendered for the dialect.
    pub(crate) fn prepare(&self, sql: &str) -> String {
        self.dialect.prepare_sql(sql, &self.table_prefix)
    }

    /// Table name with `$$` replaced by the prefix.
    pub(crate) fn resolve_table(&self, table: &str) -> String {
        replace_table_prefix(table, &self.table_prefix)
    }
}

/// One pooled connection plus the manager's shared context.
pub(crate) struct Session {
    pub(crate) inner: SessionImpl,
    ctx: Arc<DbContext>,
}

impl Session {
    pub(crate) fn new(inner: SessionImpl, ctx: Arc<DbContext>) -> Self {
        Self { inner, ctx }
    }

    pub(crate) async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let sql = self.ctx.prepare(sql);
        self.inner.execute(&sql, params).await
    }

    pub(crate) async fn query_each<F>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        f: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<SqlValue>) -> Result<()> + Send,
    {
        let sql = self.ctx.prepare(sql);
        self.inner.query_each(&sql, params, None, f).await
    }

    pub(crate) async fn query_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Vec<SqlValue>>> {
        let mut rows = Vec::new();
        self.query_each(sql, params, |row| {
            rows.push(row);
            Ok(())
        })
        .await?;
        Ok(rows)
    }

    /// Stream rows materialized as records of `ty`.
    pub(crate) async fn query_records<F>(
        &mut self,
        ty: &Arc<LoadedType>,
        sql: &str,
        params: &[SqlValue],
        mut f: F,
    ) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()> + Send,
    {
        let sql = self.ctx.prepare(sql);
        let hint = ty.spec().semantic_types();
        self.inner
            .query_each(&sql, params, Some(&hint), |values| f(ty.materialize(values)?))
            .await
    }

    /// Stream rows decoded as the generated struct `T`.
    pub(crate) async fn query_tuples<T, F>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        mut f: F,
    ) -> Result<u64>
    where
        T: Tuple,
        F: FnMut(T) -> Result<()> + Send,
    {
        let sql = self.ctx.prepare(sql);
        let hint: Vec<SemanticType> = T::COLUMNS.iter().map(|(_, kind)| *kind).collect();
        self.inner
            .query_each(&sql, params, Some(&hint), |values| f(T::from_values(values)?))
            .await
    }

    /// Stream records of `ty` along with the primary key values of `table`
    /// as read. The key columns must be part of the result.
    pub(crate) async fn query_for_update<F>(
        &mut self,
        ty: &Arc<LoadedType>,
        table: &str,
        sql: &str,
        params: &[SqlValue],
        mut f: F,
    ) -> Result<u64>
    where
        F: FnMut(KeyedRecord) -> Result<()> + Send,
    {
        let table = self.ctx.resolve_table(table);
        let key_columns = self.primary_key(&table).await?;
        if key_columns.is_empty() {
            return Err(TupleGenError::NoPrimaryKey(table));
        }
        let mut key_indices = Vec::with_capacity(key_columns.len());
        for key in &key_columns {
            let idx = ty.column_index(key).ok_or_else(|| {
                TupleGenError::record(
                    ty.qualified_name(),
                    format!("primary key column {} of {} is not selected", key, table),
                )
            })?;
            key_indices.push(idx);
        }

        self.query_records(ty, sql, params, |record| {
            let key_values = key_indices
                .iter()
                .map(|&i| record.values()[i].clone())
                .collect();
            f(KeyedRecord::new(
                record,
                table.clone(),
                key_columns.clone(),
                key_values,
            ))
        })
        .await
    }

    /// Insert every column of `record` into `table`.
    pub(crate) async fn insert(&mut self, table: &str, record: &Record) -> Result<u64> {
        let columns: Vec<String> = record
            .loaded_type()
            .spec()
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let sql = self
            .ctx
            .dialect
            .insert_sql(&self.ctx.resolve_table(table), &columns)?;
        self.execute(&sql, record.values()).await
    }

    /// Update the non-key columns of the row `keyed` was read from.
    pub(crate) async fn update(&mut self, keyed: &KeyedRecord) -> Result<u64> {
        let record = keyed.record();

        let mut assigned = Vec::new();
        let mut params = Vec::new();
        for (column, value) in record.loaded_type().spec().columns.iter().zip(record.values()) {
            if keyed.key_columns().contains(&column.name) {
                continue;
            }
            assigned.push(column.name.clone());
            params.push(value.clone());
        }
        if assigned.is_empty() {
            debug!("update of {} skipped: only key columns selected", keyed.table());
            return Ok(0);
        }
        params.extend(keyed.key_values().iter().cloned());

        let sql = self
            .ctx
            .dialect
            .update_sql(keyed.table(), &assigned, keyed.key_columns())?;
        self.execute(&sql, &params).await
    }

    /// Delete the row `keyed` was read from.
    pub(crate) async fn delete(&mut self, keyed: &KeyedRecord) -> Result<u64> {
        let sql = self.ctx.dialect.delete_sql(keyed.table(), keyed.key_columns())?;
        self.execute(&sql, keyed.key_values()).await
    }

    pub(crate) async fn describe(&mut self, sql: &str) -> Result<Vec<(String, String)>> {
        let sql = self.ctx.prepare(sql);
        self.inner.describe(&sql).await
    }

    pub(crate) async fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        let table = self.ctx.resolve_table(table);
        self.inner.table_columns(&table).await
    }

    /// Primary key columns of `table` in key order, cached per table.
    pub(crate) async fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let table = self.ctx.resolve_table(table);
        if let Some(keys) = self.ctx.primary_keys.read().await.get(&table) {
            return Ok(keys.clone());
        }
        let keys = self.inner.primary_key(&table).await?;
        debug!("primary key of {}: {:?}", table, keys);
        self.ctx
            .primary_keys
            .write()
            .await
            .insert(table, keys.clone());
        Ok(keys)
    }

    pub(crate) async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let table = self.ctx.resolve_table(table);
        self.inner.table_exists(&table).await
    }
}
