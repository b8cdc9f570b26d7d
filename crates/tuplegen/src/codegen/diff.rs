//! Column-level difference between two versions of a record type.

use serde::{Deserialize, Serialize};

use crate::core::{ColumnDescriptor, Conversion, SemanticType};
use crate::error::{Result, TupleGenError};

use super::spec::TypeSpec;

/// A column present in both versions, possibly renamed or retyped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedColumn {
    /// Name in the current version.
    pub name: String,
    /// Name in the predecessor.
    pub source_name: String,
    pub from: SemanticType,
    pub to: SemanticType,
}

impl RetainedColumn {
    pub fn is_renamed(&self) -> bool {
        self.name != self.source_name
    }

    pub fn is_retyped(&self) -> bool {
        self.from != self.to
    }

    /// Conversion carrying a predecessor value into this column.
    pub fn conversion(&self) -> Option<Conversion> {
        Conversion::between(self.from, self.to)
    }
}

/// Added, removed and retained columns between a predecessor and its successor.
///
/// The three sets are disjoint. `added` follows the successor's column
/// order, `removed` and `retained` follow the predecessor's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDiff {
    pub added: Vec<ColumnDescriptor>,
    pub removed: Vec<ColumnDescriptor>,
    pub retained: Vec<RetainedColumn>,
}

impl SpecDiff {
    /// Diff two specifications, matching columns by name.
    pub fn between(prior: &TypeSpec, current: &TypeSpec) -> Self {
        let pairs = current
            .columns
            .iter()
            .map(|c| (c.clone(), Some(c.name.clone())))
            .collect::<Vec<_>>();
        Self::from_origins(prior, &pairs)
    }

    /// Diff from current columns tagged with the predecessor column they
    /// were derived from.
    ///
    /// An explicit origin claims its predecessor column first; columns with
    /// no claimed origin fall back to matching by their own name.
    pub(crate) fn from_origins(
        prior: &TypeSpec,
        current: &[(ColumnDescriptor, Option<String>)],
    ) -> Self {
        let mut claimed: Vec<Option<usize>> = vec![None; current.len()];
        let mut taken = vec![false; prior.columns.len()];

        for (i, (_, origin)) in current.iter().enumerate() {
            if let Some(pos) = origin.as_deref().and_then(|o| prior.position(o)) {
                if !taken[pos] {
                    taken[pos] = true;
                    claimed[i] = Some(pos);
                }
            }
        }
        for (i, (column, _)) in current.iter().enumerate() {
            if claimed[i].is_some() {
                continue;
            }
            if let Some(pos) = prior.position(&column.name) {
                if !taken[pos] {
                    taken[pos] = true;
                    claimed[i] = Some(pos);
                }
            }
        }

        let mut added = Vec::new();
        let mut retained = Vec::new();
        for (i, (column, _)) in current.iter().enumerate() {
            match claimed[i] {
                Some(pos) => {
                    let source = &prior.columns[pos];
                    retained.push((
                        pos,
                        RetainedColumn {
                            name: column.name.clone(),
                            source_name: source.name.clone(),
                            from: source.semantic_type,
                            to: column.semantic_type,
                        },
                    ));
                }
                None => added.push(column.clone()),
            }
        }
        retained.sort_by_key(|(pos, _)| *pos);

        let removed = prior
            .columns
            .iter()
            .zip(taken.iter())
            .filter(|(_, taken)| !**taken)
            .map(|(c, _)| c.clone())
            .collect();

        Self {
            added,
            removed,
            retained: retained.into_iter().map(|(_, r)| r).collect(),
        }
    }

    /// True when nothing was added, removed, renamed or retyped.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self
                .retained
                .iter()
                .all(|r| !r.is_renamed() && !r.is_retyped())
    }

    /// Fail on the first retained column whose retype has no conversion.
    pub fn check_conversions(&self, type_name: &str) -> Result<()> {
        match self.retained.iter().find(|r| r.conversion().is_none()) {
            Some(r) => Err(TupleGenError::IncompatibleRetype {
                type_name: type_name.to_string(),
                column: r.name.clone(),
                from: r.from,
                to: r.to,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(columns: &[(&str, SemanticType)]) -> TypeSpec {
        TypeSpec {
            qualified_name: "app.T".into(),
            version: 1,
            columns: columns
                .iter()
                .map(|(n, t)| ColumnDescriptor::declared(*n, *t))
                .collect(),
            predecessor_name: None,
        }
    }

    #[test]
    fn test_between_partitions_columns() {
        let prior = spec(&[
            ("a", SemanticType::Text),
            ("b", SemanticType::Int),
            ("c", SemanticType::Bool),
        ]);
        let current = spec(&[
            ("d", SemanticType::Float),
            ("b", SemanticType::Long),
            ("a", SemanticType::Text),
        ]);
        let diff = SpecDiff::between(&prior, &current);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "d");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].name, "c");
        let retained: Vec<_> = diff.retained.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(retained, vec!["a", "b"]);
        assert!(diff.retained[1].is_retyped());
        assert!(!diff.is_unchanged());
    }

    #[test]
    fn test_origin_claims_before_name() {
        let prior = spec(&[("a", SemanticType::Text)]);
        let current = vec![
            (ColumnDescriptor::declared("a", SemanticType::Int), None),
            (
                ColumnDescriptor::declared("b", SemanticType::Text),
                Some("a".to_string()),
            ),
        ];
        let diff = SpecDiff::from_origins(&prior, &current);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "a");
        assert_eq!(diff.retained.len(), 1);
        assert_eq!(diff.retained[0].name, "b");
        assert_eq!(diff.retained[0].source_name, "a");
        assert!(diff.retained[0].is_renamed());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_identical_specs_unchanged() {
        let prior = spec(&[("a", SemanticType::Text), ("b", SemanticType::Int)]);
        assert!(SpecDiff::between(&prior, &prior).is_unchanged());
    }

    #[test]
    fn test_check_conversions() {
        let prior = spec(&[("a", SemanticType::Text)]);
        let current = spec(&[("a", SemanticType::Int)]);
        let diff = SpecDiff::between(&prior, &current);
        match diff.check_conversions("app.T") {
            Err(TupleGenError::IncompatibleRetype { column, from, to, .. }) => {
                assert_eq!(column, "a");
                assert_eq!(from, SemanticType::Text);
                assert_eq!(to, SemanticType::Int);
            }
            other => panic!("expected IncompatibleRetype, got {:?}", other),
        }
    }
}
