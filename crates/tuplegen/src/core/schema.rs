//! Column metadata produced by schema probes.

use serde::{Deserialize, Serialize};

use super::semantic::SemanticType;

/// One column of a probed query result or table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the database.
    pub name: String,

    /// Native type name as reported by the database.
    pub source_type: String,

    /// Portable kind derived from `source_type`.
    pub semantic_type: SemanticType,
}

impl ColumnDescriptor {
    /// Create a descriptor from a probed column.
    pub fn new(
        name: impl Into<String>,
        source_type: impl Into<String>,
        semantic_type: SemanticType,
    ) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            semantic_type,
        }
    }

    /// Create a descriptor for a column declared directly by semantic type.
    pub fn declared(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self::new(name, semantic_type.default_native(), semantic_type)
    }
}
