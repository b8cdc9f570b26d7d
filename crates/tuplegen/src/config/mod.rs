//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Describe the connection for logs, with the password masked.
    pub fn connection_string(&self) -> String {
        match self.dialect {
            DialectKind::Postgres => format!(
                "host={} port={} dbname={} user={} password=****",
                self.host, self.port, self.database, self.user
            ),
            DialectKind::Sqlite => format!(
                "sqlite://{}",
                self.path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
        }
    }

    /// Replace every `$$` in `sql` with the configured table prefix.
    pub fn apply_prefix(&self, sql: &str) -> String {
        crate::dialect::replace_table_prefix(sql, &self.table_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_postgres_defaults() {
        let config = Config::from_yaml(
            r#"
database:
  host: localhost
  database: app
  user: app
  password: secret
"#,
        )
        .unwrap();
        assert_eq!(config.database.dialect, DialectKind::Postgres);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.versioning.table, "$$version");
        assert_eq!(config.codegen.namespace, "tuplegen.generated");
        assert_eq!(config.codegen.toolchain, ToolchainKind::Syn);
    }

    #[test]
    fn test_from_yaml_sqlite() {
        let config = Config::from_yaml(
            r#"
database:
  dialect: sqlite
  path: /tmp/app.db
  table_prefix: app_
codegen:
  code_dir: out
  toolchain: rustfmt
"#,
        )
        .unwrap();
        assert_eq!(config.database.dialect, DialectKind::Sqlite);
        assert_eq!(config.codegen.code_dir, Path::new("out"));
        assert_eq!(config.codegen.toolchain, ToolchainKind::Rustfmt);
        assert_eq!(config.database.apply_prefix("SELECT * FROM $$t"), "SELECT * FROM app_t");
    }

    #[test]
    fn test_connection_string_masks_password() {
        let mut config = Config::sqlite("x.db").database;
        config.dialect = DialectKind::Postgres;
        config.host = "db".into();
        config.password = "hunter2".into();
        let s = config.connection_string();
        assert!(s.contains("host=db"));
        assert!(!s.contains("hunter2"));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(Config::from_yaml("database: [").is_err());
    }
}
