//! PostgreSQL connection pool and sessions.

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::TryStreamExt;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::traits::Dialect;
use crate::core::{SemanticType, SqlValue};
use crate::error::{Result, TupleGenError};

use super::types::decode_value;
use super::PostgresDialect;

/// PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Create a pool and verify that a connection can be made.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("tuplegen");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| TupleGenError::pool(e.to_string(), "creating PostgreSQL pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| TupleGenError::pool(e.to_string(), "connecting to PostgreSQL"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    /// Acquire a session holding one pooled connection.
    pub async fn session(&self) -> Result<PgSession> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| TupleGenError::pool(e.to_string(), "acquiring PostgreSQL session"))?;
        Ok(PgSession {
            client: Some(client),
        })
    }

    /// Close the pool; outstanding sessions are dropped when released.
    pub fn close(&self) {
        self.pool.close();
    }
}

/// One pooled PostgreSQL connection.
pub struct PgSession {
    client: Option<Object>,
}

fn as_params(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl PgSession {
    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| TupleGenError::Transaction("connection was detached".into()))
    }

    /// Execute a statement, returning the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let client = self.client()?;
        debug!("execute: {}", sql);
        let stmt = client.prepare(sql).await?;
        Ok(client.execute(&stmt, &as_params(params)).await?)
    }

    /// Stream result rows to `f` one at a time.
    ///
    /// Values are decoded by server type; `_hint` is not needed because
    /// PostgreSQL reports exact result types.
    pub async fn query_each<F>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        _hint: Option<&[SemanticType]>,
        mut f: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<SqlValue>) -> Result<()> + Send,
    {
        let client = self.client()?;
        debug!("query: {}", sql);
        let stmt = client.prepare(sql).await?;
        let types: Vec<_> = stmt.columns().iter().map(|c| c.type_().clone()).collect();

        let stream = client
            .query_raw(&stmt, params.iter().map(|p| p as &(dyn ToSql + Sync)))
            .await?;
        futures::pin_mut!(stream);

        let mut count = 0u64;
        while let Some(row) = stream.try_next().await? {
            let mut values = Vec::with_capacity(types.len());
            for (idx, ty) in types.iter().enumerate() {
                values.push(decode_value(&row, idx, ty)?);
            }
            f(values)?;
            count += 1;
        }
        Ok(count)
    }

    /// Column names and native types of a query's result.
    pub async fn describe(&mut self, sql: &str) -> Result<Vec<(String, String)>> {
        let stmt = self.client()?.prepare(sql).await?;
        Ok(stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.type_().name().to_string()))
            .collect())
    }

    /// Column names and native types of a table, in ordinal order.
    pub async fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        let regclass = PostgresDialect.quote_table(table)?;
        let rows = self
            .client()?
            .query(
                "SELECT a.attname::text, t.typname::text \
                 FROM pg_catalog.pg_attribute a \
                 JOIN pg_catalog.pg_type t ON t.oid = a.atttypid \
                 WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum",
                &[&regclass],
            )
            .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push((row.try_get::<_, String>(0)?, row.try_get::<_, String>(1)?));
        }
        Ok(columns)
    }

    /// Primary key columns of a table, in key order.
    pub async fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let regclass = PostgresDialect.quote_table(table)?;
        let rows = self
            .client()?
            .query(
                "SELECT a.attname::text \
                 FROM pg_catalog.pg_index i \
                 JOIN pg_catalog.pg_attribute a \
                   ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
                 WHERE i.indrelid = to_regclass($1) AND i.indisprimary \
                 ORDER BY array_position(i.indkey::int2[], a.attnum)",
                &[&regclass],
            )
            .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(row.try_get::<_, String>(0)?);
        }
        Ok(columns)
    }

    /// Whether a table or view exists.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let regclass = PostgresDialect.quote_table(table)?;
        let row = self
            .client()?
            .query_one("SELECT to_regclass($1) IS NOT NULL", &[&regclass])
            .await?;
        Ok(row.try_get::<_, bool>(0)?)
    }

    /// Begin a read-committed transaction.
    pub async fn begin(&mut self) -> Result<()> {
        self.client()?
            .batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED")
            .await?;
        Ok(())
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.client()?.batch_execute("COMMIT").await?;
        Ok(())
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.client()?.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    /// Remove the connection from the pool and close it.
    pub fn detach(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("Closing PostgreSQL connection with an unfinished transaction");
            drop(Object::take(client));
        }
    }
}
