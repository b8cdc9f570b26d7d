//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific identifier quoting, `$n` parameter
//! placeholders and the native type table.

use crate::core::traits::Dialect;
use crate::core::SemanticType;
use crate::dialect::TypeMapTable;

/// Native PostgreSQL type names, as reported by `pg_type.typname` and by
/// `format_type`, keyed in normalized (uppercase) form.
static PG_TYPES: TypeMapTable = TypeMapTable::new(&[
    ("BOOL", SemanticType::Bool),
    ("BOOLEAN", SemanticType::Bool),
    ("INT2", SemanticType::Int),
    ("SMALLINT", SemanticType::Int),
    ("INT4", SemanticType::Int),
    ("INT", SemanticType::Int),
    ("INTEGER", SemanticType::Int),
    ("SERIAL", SemanticType::Int),
    ("SMALLSERIAL", SemanticType::Int),
    ("INT8", SemanticType::Long),
    ("BIGINT", SemanticType::Long),
    ("BIGSERIAL", SemanticType::Long),
    ("FLOAT4", SemanticType::Float),
    ("REAL", SemanticType::Float),
    ("FLOAT8", SemanticType::Float),
    ("DOUBLE PRECISION", SemanticType::Float),
    ("NUMERIC", SemanticType::Float),
    ("DECIMAL", SemanticType::Float),
    ("TEXT", SemanticType::Text),
    ("VARCHAR", SemanticType::Text),
    ("CHARACTER VARYING", SemanticType::Text),
    ("BPCHAR", SemanticType::Text),
    ("CHAR", SemanticType::Text),
    ("CHARACTER", SemanticType::Text),
    ("NAME", SemanticType::Text),
    ("CITEXT", SemanticType::Text),
    ("TIMESTAMP", SemanticType::DateTime),
    ("TIMESTAMP WITHOUT TIME ZONE", SemanticType::DateTime),
    ("TIMESTAMPTZ", SemanticType::DateTime),
    ("TIMESTAMP WITH TIME ZONE", SemanticType::DateTime),
    ("DATE", SemanticType::DateTime),
]);

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        // Handle names that contain double quotes by doubling them
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn type_map(&self) -> &TypeMapTable {
        &PG_TYPES
    }
}
