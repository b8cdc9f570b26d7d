//! Data form of the reconciliation procedure.
//!
//! The synthesizer renders `reconcile_from` as Rust source for typed use.
//! The same mapping is kept as a [`ReconcilePlan`] in the artifact manifest
//! so a loaded type can reconcile untyped [`Record`](crate::record::Record)s.

use serde::{Deserialize, Serialize};

use crate::core::{ColumnDescriptor, Conversion, SemanticType, SqlValue};
use crate::error::{Result, TupleGenError};

use super::spec::{Evolution, TypeSpec};

/// Where one field of the new shape gets its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    /// Converted from a predecessor column.
    Copy {
        from_column: String,
        from_index: usize,
        conversion: Conversion,
    },
    /// Semantic type's zero value.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlan {
    pub column: String,
    pub semantic_type: SemanticType,
    pub source: FieldSource,
}

/// Field-by-field mapping from a predecessor shape to a successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub predecessor_name: String,
    pub predecessor_version: u32,
    /// Columns of the predecessor shape, in field order.
    pub predecessor_columns: Vec<ColumnDescriptor>,
    pub fields: Vec<FieldPlan>,
}

impl ReconcilePlan {
    /// Plan for `spec` evolved from `evolution.predecessor`.
    ///
    /// Fails with `IncompatibleRetype` when a retained column has no
    /// defined conversion.
    pub fn from_evolution(spec: &TypeSpec, evolution: &Evolution) -> Result<Self> {
        evolution.diff.check_conversions(&spec.qualified_name)?;
        let predecessor = &evolution.predecessor;

        let mut fields = Vec::with_capacity(spec.columns.len());
        for column in &spec.columns {
            let retained = evolution.diff.retained.iter().find(|r| r.name == column.name);
            let source = match retained {
                Some(r) => {
                    let from_index = predecessor.position(&r.source_name).ok_or_else(|| {
                        TupleGenError::UnknownAttribute {
                            type_name: predecessor.qualified_name.clone(),
                            name: r.source_name.clone(),
                        }
                    })?;
                    let conversion = r.conversion().ok_or(TupleGenError::IncompatibleRetype {
                        type_name: spec.qualified_name.clone(),
                        column: r.name.clone(),
                        from: r.from,
                        to: r.to,
                    })?;
                    FieldSource::Copy {
                        from_column: r.source_name.clone(),
                        from_index,
                        conversion,
                    }
                }
                None => FieldSource::Zero,
            };
            fields.push(FieldPlan {
                column: column.name.clone(),
                semantic_type: column.semantic_type,
                source,
            });
        }

        Ok(Self {
            predecessor_name: predecessor.qualified_name.clone(),
            predecessor_version: predecessor.version,
            predecessor_columns: predecessor.columns.clone(),
            fields,
        })
    }

    /// Whether `spec` is exactly the shape this plan reconciles from.
    pub fn accepts(&self, spec: &TypeSpec) -> bool {
        spec.qualified_name == self.predecessor_name
            && spec.version == self.predecessor_version
            && spec.columns == self.predecessor_columns
    }

    /// Map predecessor values to successor values.
    pub fn apply(&self, type_name: &str, old: &[SqlValue]) -> Result<Vec<SqlValue>> {
        if old.len() != self.predecessor_columns.len() {
            return Err(TupleGenError::record(
                type_name,
                format!(
                    "predecessor {} v{} has {} columns, got {} values",
                    self.predecessor_name,
                    self.predecessor_version,
                    self.predecessor_columns.len(),
                    old.len()
                ),
            ));
        }

        self.fields
            .iter()
            .map(|field| match &field.source {
                FieldSource::Zero => Ok(field.semantic_type.zero_value()),
                FieldSource::Copy {
                    from_index,
                    conversion,
                    ..
                } => conversion
                    .apply(&old[*from_index], field.semantic_type)
                    .map_err(|e| {
                        TupleGenError::record(type_name, format!("column {}: {}", field.column, e))
                    }),
            })
            .collect()
    }
}
