//! SQLite connection pool and sessions.

use std::time::Duration;

use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Column, Executor, Sqlite, Statement, TypeInfo};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::{SemanticType, SqlValue};
use crate::error::{Result, TupleGenError};

use super::types::{bind_all, decode_value, row_kinds};

/// SQLite connection pool.
#[derive(Clone)]
pub struct SqlitePool {
    pool: sqlx::SqlitePool,
}

impl SqlitePool {
    /// Open (creating if configured) the database file and verify access.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| TupleGenError::Config("database.path is required for sqlite".into()))?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(config.create_if_missing)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size as u32)
            .connect_with(options)
            .await?;

        // Test connection
        sqlx::query("SELECT 1").execute(&pool).await?;

        info!("Connected to SQLite: {}", path.display());

        Ok(Self { pool })
    }

    /// Acquire a session holding one pooled connection.
    pub async fn session(&self) -> Result<SqliteSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| TupleGenError::pool(e.to_string(), "acquiring SQLite session"))?;
        Ok(SqliteSession { conn: Some(conn) })
    }

    /// Close the pool and wait for connections to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// One pooled SQLite connection.
pub struct SqliteSession {
    conn: Option<PoolConnection<Sqlite>>,
}

/// Split `schema.table` into its parts.
fn split_schema(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}

/// `pragma_table_info` call and its arguments for a table.
fn table_info(table: &str) -> (&'static str, Vec<SqlValue>) {
    match split_schema(table) {
        (Some(schema), name) => (
            "pragma_table_info(?, ?)",
            vec![SqlValue::from(name), SqlValue::from(schema)],
        ),
        (None, name) => ("pragma_table_info(?)", vec![SqlValue::from(name)]),
    }
}

impl SqliteSession {
    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| TupleGenError::Transaction("connection was detached".into()))
    }

    /// Execute a statement, returning the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        debug!("execute: {}", sql);
        let conn = self.conn()?;
        let result = bind_all(sqlx::query(sql), params).execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Stream result rows to `f` one at a time, decoding with `hint` when
    /// it matches the result width and by declared type otherwise.
    pub async fn query_each<F>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        hint: Option<&[SemanticType]>,
        mut f: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<SqlValue>) -> Result<()> + Send,
    {
        debug!("query: {}", sql);
        let conn = self.conn()?;
        let mut rows = bind_all(sqlx::query(sql), params).fetch(conn);

        let mut count = 0u64;
        while let Some(row) = rows.try_next().await? {
            let kinds = row_kinds(&row, hint);
            let mut values = Vec::with_capacity(kinds.len());
            for (idx, kind) in kinds.iter().enumerate() {
                values.push(decode_value(&row, idx, *kind)?);
            }
            f(values)?;
            count += 1;
        }
        Ok(count)
    }

    /// Column names and declared types of a query's result.
    pub async fn describe(&mut self, sql: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let stmt = conn.prepare(sql).await?;
        Ok(stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.type_info().name().to_string()))
            .collect())
    }

    /// Column names and declared types of a table, in ordinal order.
    pub async fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        let (source, params) = table_info(table);
        let sql = format!("SELECT name, type FROM {} ORDER BY cid", source);
        let mut columns = Vec::new();
        self.query_each(
            &sql,
            &params,
            Some(&[SemanticType::Text, SemanticType::Text]),
            |row| {
                let mut row = row.into_iter();
                let name = row.next().and_then(|v| v.as_str().map(str::to_string));
                let native = row.next().and_then(|v| v.as_str().map(str::to_string));
                columns.push((name.unwrap_or_default(), native.unwrap_or_default()));
                Ok(())
            },
        )
        .await?;
        Ok(columns)
    }

    /// Primary key columns of a table, in key order.
    pub async fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let (source, params) = table_info(table);
        let sql = format!("SELECT name FROM {} WHERE pk > 0 ORDER BY pk", source);
        let mut columns = Vec::new();
        self.query_each(&sql, &params, Some(&[SemanticType::Text]), |row| {
            if let Some(SqlValue::Text(name)) = row.into_iter().next() {
                columns.push(name);
            }
            Ok(())
        })
        .await?;
        Ok(columns)
    }

    /// Whether a table or view exists.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let (schema, name) = split_schema(table);
        let master = match schema {
            Some(schema) => format!("\"{}\".sqlite_master", schema.replace('"', "\"\"")),
            None => "sqlite_master".to_string(),
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE type IN ('table', 'view') AND name = ?",
            master
        );
        let mut found = 0i64;
        self.query_each(&sql, &[SqlValue::from(name)], Some(&[SemanticType::Long]), |row| {
            found = row.first().and_then(SqlValue::as_i64).unwrap_or(0);
            Ok(())
        })
        .await?;
        Ok(found > 0)
    }

    /// Begin a transaction.
    pub async fn begin(&mut self) -> Result<()> {
        self.conn()?.execute("BEGIN").await?;
        Ok(())
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.conn()?.execute("COMMIT").await?;
        Ok(())
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.conn()?.execute("ROLLBACK").await?;
        Ok(())
    }

    /// Remove the connection from the pool and close it.
    pub fn detach(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Closing SQLite connection with an unfinished transaction");
            drop(conn.detach());
        }
    }
}
