//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL through `deadpool-postgres`/`tokio-postgres`
//! - [`sqlite`]: SQLite through `sqlx`
//!
//! # Static dispatch
//!
//! Dialects, pools and sessions are wrapped in enums with one variant per
//! driver. Each method is a `match` that forwards to the driver, so there
//! is no vtable and generic row mappers pass straight through.
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` with a dialect, pool and session
//! 2. Add a variant to [`DialectImpl`], [`PoolImpl`] and [`SessionImpl`]
//! 3. Add the dialect to [`DialectKind`]

pub mod postgres;
pub mod sqlite;

pub use postgres::{PgPool, PgSession, PostgresDialect};
pub use sqlite::{SqliteDialect, SqlitePool, SqliteSession};

use crate::config::{DatabaseConfig, DialectKind};
use crate::core::traits::Dialect;
use crate::core::{SemanticType, SqlValue};
use crate::dialect::TypeMapTable;
use crate::error::{Result, TupleGenError};

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Sqlite(SqliteDialect),
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.name(),
            DialectImpl::Sqlite(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> String {
        match self {
            DialectImpl::Postgres(d) => d.quote_ident(name),
            DialectImpl::Sqlite(d) => d.quote_ident(name),
        }
    }

    fn param_placeholder(&self, index: usize) -> String {
        match self {
            DialectImpl::Postgres(d) => d.param_placeholder(index),
            DialectImpl::Sqlite(d) => d.param_placeholder(index),
        }
    }

    fn type_map(&self) -> &TypeMapTable {
        match self {
            DialectImpl::Postgres(d) => d.type_map(),
            DialectImpl::Sqlite(d) => d.type_map(),
        }
    }
}

impl DialectImpl {
    /// Dialect for a configured database kind.
    pub fn from_kind(kind: DialectKind) -> Self {
        match kind {
            DialectKind::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            DialectKind::Sqlite => DialectImpl::Sqlite(SqliteDialect::new()),
        }
    }

    /// Create a dialect implementation from a database type string.
    ///
    /// # Errors
    ///
    /// Returns an error if the database type is not recognized.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectImpl::Postgres(PostgresDialect::new())),
            "sqlite" | "sqlite3" => Ok(DialectImpl::Sqlite(SqliteDialect::new())),
            _ => Err(TupleGenError::Config(format!(
                "Unknown database type: '{}'. Supported: postgres, sqlite",
                name
            ))),
        }
    }
}

/// Enum-based static dispatch for connection pools.
#[derive(Clone)]
pub enum PoolImpl {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl PoolImpl {
    /// Connect the pool for the configured dialect.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.dialect {
            DialectKind::Postgres => Ok(PoolImpl::Postgres(PgPool::connect(config).await?)),
            DialectKind::Sqlite => Ok(PoolImpl::Sqlite(SqlitePool::connect(config).await?)),
        }
    }

    /// Acquire a session.
    pub async fn session(&self) -> Result<SessionImpl> {
        match self {
            PoolImpl::Postgres(p) => Ok(SessionImpl::Postgres(p.session().await?)),
            PoolImpl::Sqlite(p) => Ok(SessionImpl::Sqlite(p.session().await?)),
        }
    }

    /// Close the pool.
    pub async fn close(&self) {
        match self {
            PoolImpl::Postgres(p) => p.close(),
            PoolImpl::Sqlite(p) => p.close().await,
        }
    }
}

/// Enum-based static dispatch for sessions.
///
/// SQL reaching a session is already in the dialect's syntax.
pub enum SessionImpl {
    Postgres(PgSession),
    Sqlite(SqliteSession),
}

impl SessionImpl {
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        match self {
            SessionImpl::Postgres(s) => s.execute(sql, params).await,
            SessionImpl::Sqlite(s) => s.execute(sql, params).await,
        }
    }

    pub async fn query_each<F>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        hint: Option<&[SemanticType]>,
        f: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<SqlValue>) -> Result<()> + Send,
    {
        match self {
            SessionImpl::Postgres(s) => s.query_each(sql, params, hint, f).await,
            SessionImpl::Sqlite(s) => s.query_each(sql, params, hint, f).await,
        }
    }

    pub async fn describe(&mut self, sql: &str) -> Result<Vec<(String, String)>> {
        match self {
            SessionImpl::Postgres(s) => s.describe(sql).await,
            SessionImpl::Sqlite(s) => s.describe(sql).await,
        }
    }

    pub async fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        match self {
            SessionImpl::Postgres(s) => s.table_columns(table).await,
            SessionImpl::Sqlite(s) => s.table_columns(table).await,
        }
    }

    pub async fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        match self {
            SessionImpl::Postgres(s) => s.primary_key(table).await,
            SessionImpl::Sqlite(s) => s.primary_key(table).await,
        }
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        match self {
            SessionImpl::Postgres(s) => s.table_exists(table).await,
            SessionImpl::Sqlite(s) => s.table_exists(table).await,
        }
    }

    pub async fn begin(&mut self) -> Result<()> {
        match self {
            SessionImpl::Postgres(s) => s.begin().await,
            SessionImpl::Sqlite(s) => s.begin().await,
        }
    }

    pub async fn commit(&mut self) -> Result<()> {
        match self {
            SessionImpl::Postgres(s) => s.commit().await,
            SessionImpl::Sqlite(s) => s.commit().await,
        }
    }

    pub async fn rollback(&mut self) -> Result<()> {
        match self {
            SessionImpl::Postgres(s) => s.rollback().await,
            SessionImpl::Sqlite(s) => s.rollback().await,
        }
    }

    /// Close the underlying connection instead of returning it to the pool.
    pub fn detach(&mut self) {
        match self {
            SessionImpl::Postgres(s) => s.detach(),
            SessionImpl::Sqlite(s) => s.detach(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_name() {
        assert_eq!(DialectImpl::from_name("PostgreSQL").unwrap().name(), "postgres");
        assert_eq!(DialectImpl::from_name("sqlite3").unwrap().name(), "sqlite");
        assert!(DialectImpl::from_name("oracle").is_err());
    }

    #[test]
    fn test_dialect_dispatch_placeholders() {
        let pg = DialectImpl::from_kind(DialectKind::Postgres);
        let lite = DialectImpl::from_kind(DialectKind::Sqlite);
        assert_eq!(pg.prepare_sql("a = ? AND b = ?", ""), "a = $1 AND b = $2");
        assert_eq!(lite.prepare_sql("a = ? AND b = ?", ""), "a = ? AND b = ?");
        assert_eq!(pg.semantic_type("int8"), SemanticType::Long);
        assert_eq!(lite.semantic_type("int8"), SemanticType::Long);
    }
}
