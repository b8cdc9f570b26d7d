//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection configuration.
    pub database: DatabaseConfig,

    /// Generated record type configuration.
    #[serde(default)]
    pub codegen: CodegenConfig,

    /// Schema version tracking configuration.
    #[serde(default)]
    pub versioning: VersioningConfig,
}

impl Config {
    /// Configuration for a SQLite database file with default codegen and versioning.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                dialect: DialectKind::Sqlite,
                path: Some(path.into()),
                ..DatabaseConfig::default()
            },
            codegen: CodegenConfig::default(),
            versioning: VersioningConfig::default(),
        }
    }

    /// Override the code directory.
    pub fn with_code_dir(mut self, code_dir: impl Into<PathBuf>) -> Self {
        self.codegen.code_dir = code_dir.into();
        self
    }
}

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    Sqlite,
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectKind::Postgres => write!(f, "postgres"),
            DialectKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Database connection configuration.
///
/// Host, port, database and credentials apply to PostgreSQL; `path` applies
/// to SQLite. `table_prefix` replaces every `$$` in statement text.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database dialect.
    #[serde(default)]
    pub dialect: DialectKind,

    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SQLite database file.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Substituted for `$$` in table names.
    #[serde(default)]
    pub table_prefix: String,

    /// Maximum pooled connections (default: 8).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Create the SQLite file when missing (default: true).
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            host: String::new(),
            port: default_pg_port(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            path: None,
            table_prefix: String::new(),
            pool_size: default_pool_size(),
            create_if_missing: true,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("path", &self.path)
            .field("table_prefix", &self.table_prefix)
            .field("pool_size", &self.pool_size)
            .field("create_if_missing", &self.create_if_missing)
            .finish()
    }
}

/// Where generated record types live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Root for generated source and artifact manifests.
    #[serde(default = "default_code_dir")]
    pub code_dir: PathBuf,

    /// Namespace applied to unqualified type names.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Checker run on synthesized source.
    #[serde(default)]
    pub toolchain: ToolchainKind,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            code_dir: default_code_dir(),
            namespace: default_namespace(),
            toolchain: ToolchainKind::default(),
        }
    }
}

/// Build toolchains for synthesized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    /// In-process parse with `syn`.
    #[default]
    Syn,
    /// External `rustfmt` process.
    Rustfmt,
}

/// Schema version table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Version table name; `$$` is replaced by the table prefix.
    #[serde(default = "default_version_table")]
    pub table: String,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            table: default_version_table(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_code_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_namespace() -> String {
    "tuplegen.generated".to_string()
}

fn default_version_table() -> String {
    "$$version".to_string()
}
