//! SQLite SQL dialect (Strategy pattern).

use crate::core::traits::Dialect;
use crate::core::SemanticType;
use crate::dialect::TypeMapTable;

/// Declared SQLite column types. SQLite accepts any declared type name, so
/// only the common spellings are listed; everything else is opaque.
///
/// `INT` and `INTEGER` have integer affinity and hold 64-bit values (rowid
/// keys included), and `INTEGER` is also the storage class name of
/// undeclared integer values, so both map to `Long`.
static SQLITE_TYPES: TypeMapTable = TypeMapTable::new(&[
    ("BOOLEAN", SemanticType::Bool),
    ("TINYINT", SemanticType::Int),
    ("SMALLINT", SemanticType::Int),
    ("INT2", SemanticType::Int),
    ("INT", SemanticType::Long),
    ("INTEGER", SemanticType::Long),
    ("MEDIUMINT", SemanticType::Int),
    ("BIGINT", SemanticType::Long),
    ("INT8", SemanticType::Long),
    ("UNSIGNED BIG INT", SemanticType::Long),
    ("DATE", SemanticType::DateTime),
    ("DATETIME", SemanticType::DateTime),
    ("TIMESTAMP", SemanticType::DateTime),
    ("DECIMAL", SemanticType::Float),
    ("DOUBLE", SemanticType::Float),
    ("DOUBLE PRECISION", SemanticType::Float),
    ("NUMERIC", SemanticType::Float),
    ("REAL", SemanticType::Float),
    ("FLOAT", SemanticType::Float),
    ("CHARACTER", SemanticType::Text),
    ("NCHAR", SemanticType::Text),
    ("NATIVE CHARACTER", SemanticType::Text),
    ("CHAR", SemanticType::Text),
    ("VARCHAR", SemanticType::Text),
    ("VARYING CHARACTER", SemanticType::Text),
    ("NVARCHAR", SemanticType::Text),
    ("TEXT", SemanticType::Text),
    ("CLOB", SemanticType::Text),
]);

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Create a new SQLite dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn type_map(&self) -> &TypeMapTable {
        &SQLITE_TYPES
    }
}
