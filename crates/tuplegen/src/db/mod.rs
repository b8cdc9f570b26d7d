//! Connection pooling, parameterized statements and scoped transactions.
//!
//! Caller SQL uses `?` placeholders bound in argument order, and `$$` in
//! table names for the configured table prefix. Both are rewritten for the
//! dialect before the statement reaches the driver.

mod session;
mod transaction;

pub use transaction::Transaction;

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::codegen::SchemaProbe;
use crate::config::DatabaseConfig;
use crate::core::SqlValue;
use crate::drivers::{DialectImpl, PoolImpl};
use crate::error::Result;
use crate::loader::LoadedType;
use crate::record::{Record, Tuple};

use session::{DbContext, Session};

/// Pooled database access for one configured database.
///
/// Cheap to clone; clones share the pool and the primary key cache.
#[derive(Clone)]
pub struct ConnectionManager {
    pool: PoolImpl,
    ctx: Arc<DbContext>,
}

impl ConnectionManager {
    /// Create the pool and verify connectivity.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let dialect = DialectImpl::from_kind(config.dialect);
        let pool = PoolImpl::connect(config).await?;
        info!(
            "Connection manager ready ({}, pool size {}, table prefix '{}')",
            config.dialect, config.pool_size, config.table_prefix
        );
        Ok(Self {
            pool,
            ctx: Arc::new(DbContext::new(dialect, config.table_prefix.clone())),
        })
    }

    pub fn dialect(&self) -> &DialectImpl {
        &self.ctx.dialect
    }

    pub fn table_prefix(&self) -> &str {
        &self.ctx.table_prefix
    }

    pub(crate) async fn session(&self) -> Result<Session> {
        let inner = self.pool.session().await?;
        Ok(Session::new(inner, self.ctx.clone()))
    }

    /// Execute one statement outside any explicit transaction.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.session().await?.execute(sql, params).await
    }

    /// Stream rows to `f` one at a time, returning the row count.
    pub async fn query_each<F>(&self, sql: &str, params: &[SqlValue], f: F) -> Result<u64>
    where
        F: FnMut(Vec<SqlValue>) -> Result<()> + Send,
    {
        self.session().await?.query_each(sql, params, f).await
    }

    /// Collect all rows of a query.
    pub async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        self.session().await?.query_rows(sql, params).await
    }

    /// Stream rows materialized as records of `ty`.
    pub async fn query_records<F>(
        &self,
        ty: &Arc<LoadedType>,
        sql: &str,
        params: &[SqlValue],
        f: F,
    ) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()> + Send,
    {
        self.session().await?.query_records(ty, sql, params, f).await
    }

    /// Stream rows decoded as the generated struct `T`.
    pub async fn query_tuples<T, F>(&self, sql: &str, params: &[SqlValue], f: F) -> Result<u64>
    where
        T: Tuple,
        F: FnMut(T) -> Result<()> + Send,
    {
        self.session().await?.query_tuples(sql, params, f).await
    }

    /// Primary key columns of `table`, cached after the first lookup.
    pub async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        self.session().await?.primary_key(table).await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.session().await?.table_exists(table).await
    }

    /// Schema introspection through this manager's pool.
    pub fn probe(&self) -> SchemaProbe<'_> {
        SchemaProbe::new(self)
    }

    /// Acquire a connection and begin a transaction on it.
    pub async fn begin(&self) -> Result<Transaction> {
        Transaction::begin(self.session().await?).await
    }

    /// Run `body` in a transaction, committing on `Ok` and rolling back on `Err`.
    ///
    /// The body error is returned even when the rollback itself fails; the
    /// rollback failure is logged. If `body` panics the transaction is
    /// dropped open and its connection closed.
    ///
    /// ```ignore
    /// let moved = db
    ///     .within(|tx| {
    ///         Box::pin(async move {
    ///             tx.execute("UPDATE $$account SET balance = balance - ? WHERE id = ?", &[10.into(), 1.into()]).await?;
    ///             tx.execute("UPDATE $$account SET balance = balance + ? WHERE id = ?", &[10.into(), 2.into()]).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn within<T, F>(&self, body: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let mut tx = self.begin().await?;
        match body(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed after error ({}): {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Run `SELECT 1` on a pooled connection.
    pub async fn health_check(&self) -> Result<()> {
        self.query_rows("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
