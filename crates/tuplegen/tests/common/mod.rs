//! Shared setup for integration tests against a temporary SQLite database.

#![allow(dead_code)]

use tempfile::TempDir;
use tuplegen::{Config, ConnectionManager, TypeFactory};

pub struct TestDb {
    pub dir: TempDir,
    pub config: Config,
    pub db: ConnectionManager,
}

impl TestDb {
    pub async fn new() -> Self {
        Self::with_prefix("").await
    }

    pub async fn with_prefix(prefix: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            Config::sqlite(dir.path().join("app.db")).with_code_dir(dir.path().join("generated"));
        config.database.table_prefix = prefix.to_string();
        let db = ConnectionManager::connect(&config.database).await.unwrap();
        Self { dir, config, db }
    }

    pub fn factory(&self) -> TypeFactory {
        TypeFactory::new(self.db.clone(), &self.config.codegen)
    }

    pub async fn exec(&self, sql: &str) {
        self.db.execute(sql, &[]).await.unwrap();
    }

    pub async fn count(&self, table: &str) -> i64 {
        let rows = self
            .db
            .query_rows(&format!("SELECT COUNT(*) FROM {}", table), &[])
            .await
            .unwrap();
        rows[0][0].as_i64().unwrap()
    }
}
