//! Unit of work on one pooled connection.

use std::sync::Arc;

use tracing::debug;

use crate::core::SqlValue;
use crate::error::Result;
use crate::loader::LoadedType;
use crate::record::{KeyedRecord, Record, Tuple};

use super::session::Session;

/// An open transaction holding one pooled connection.
///
/// Finish it with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping it while still open closes the connection instead of returning
/// it to the pool, which makes the server discard the transaction.
pub struct Transaction {
    session: Session,
    open: bool,
}

impl Transaction {
    pub(crate) async fn begin(mut session: Session) -> Result<Self> {
        session.inner.begin().await?;
        debug!("transaction started");
        Ok(Self {
            session,
            open: true,
        })
    }

    /// Execute a statement, returning the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.session.execute(sql, params).await
    }

    /// Stream raw rows to `f`, returning the row count.
    pub async fn query_each<F>(&mut self, sql: &str, params: &[SqlValue], f: F) -> Result<u64>
    where
        F: FnMut(Vec<SqlValue>) -> Result<()> + Send,
    {
        self.session.query_each(sql, params, f).await
    }

    /// Collect all rows of a query.
    pub async fn query_rows(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        self.session.query_rows(sql, params).await
    }

    /// Stream rows materialized as records of `ty`.
    pub async fn query_records<F>(
        &mut self,
        ty: &Arc<LoadedType>,
        sql: &str,
        params: &[SqlValue],
        f: F,
    ) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()> + Send,
    {
        self.session.query_records(ty, sql, params, f).await
    }

    /// Stream rows decoded as the generated struct `T`.
    pub async fn query_tuples<T, F>(&mut self, sql: &str, params: &[SqlValue], f: F) -> Result<u64>
    where
        T: Tuple,
        F: FnMut(T) -> Result<()> + Send,
    {
        self.session.query_tuples(sql, params, f).await
    }

    /// Stream records of `ty` with the primary key of `table` as read, for
    /// later [`update`](Self::update) or [`delete`](Self::delete).
    pub async fn query_for_update<F>(
        &mut self,
        ty: &Arc<LoadedType>,
        table: &str,
        sql: &str,
        params: &[SqlValue],
        f: F,
    ) -> Result<u64>
    where
        F: FnMut(KeyedRecord) -> Result<()> + Send,
    {
        self.session.query_for_update(ty, table, sql, params, f).await
    }

    pub async fn insert(&mut self, table: &str, record: &Record) -> Result<u64> {
        self.session.insert(table, record).await
    }

    pub async fn update(&mut self, keyed: &KeyedRecord) -> Result<u64> {
        self.session.update(keyed).await
    }

    pub async fn delete(&mut self, keyed: &KeyedRecord) -> Result<u64> {
        self.session.delete(keyed).await
    }

    pub async fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        self.session.primary_key(table).await
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.session.table_exists(table).await
    }

    /// Commit and release the connection.
    pub async fn commit(mut self) -> Result<()> {
        self.session.inner.commit().await?;
        self.open = false;
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back and release the connection.
    pub async fn rollback(mut self) -> Result<()> {
        self.session.inner.rollback().await?;
        self.open = false;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.open {
            self.session.inner.detach();
        }
    }
}
