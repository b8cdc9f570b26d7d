//! Configuration validation.

use super::{Config, DialectKind};
use crate::core::identifier::validate_qualified_name;
use crate::error::{Result, TupleGenError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;

    match db.dialect {
        DialectKind::Postgres => {
            if db.host.is_empty() {
                return Err(TupleGenError::Config("database.host is required".into()));
            }
            if db.database.is_empty() {
                return Err(TupleGenError::Config(
                    "database.database is required".into(),
                ));
            }
            if db.user.is_empty() {
                return Err(TupleGenError::Config("database.user is required".into()));
            }
        }
        DialectKind::Sqlite => {
            if db.path.as_deref().map_or(true, |p| p.as_os_str().is_empty()) {
                return Err(TupleGenError::Config(
                    "database.path is required for sqlite".into(),
                ));
            }
        }
    }

    if db.pool_size == 0 {
        return Err(TupleGenError::Config(
            "database.pool_size must be at least 1".into(),
        ));
    }

    if !db
        .table_prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(TupleGenError::Config(format!(
            "database.table_prefix may only contain letters, digits and '_', got '{}'",
            db.table_prefix
        )));
    }

    if config.codegen.code_dir.as_os_str().is_empty() {
        return Err(TupleGenError::Config(
            "codegen.code_dir must not be empty".into(),
        ));
    }

    validate_qualified_name(&config.codegen.namespace)
        .map_err(|e| TupleGenError::Config(format!("codegen.namespace: {}", e)))?;

    let table = config.versioning.table.replace("$$", "");
    if table.is_empty()
        || !table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(TupleGenError::Config(format!(
            "versioning.table must be a plain identifier, got '{}'",
            config.versioning.table
        )));
    }

    Ok(())
}
