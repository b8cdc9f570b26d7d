//! Record type specifications and the builder that edits them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::identifier::{rust_field_name, simple_name, validate_qualified_name};
use crate::core::{ColumnDescriptor, SemanticType};
use crate::error::{Result, TupleGenError};

use super::diff::SpecDiff;

/// One version of a generated record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    /// Dotted name identifying the type across versions.
    pub qualified_name: String,

    /// 1 for a fresh type, predecessor version + 1 for an evolution.
    pub version: u32,

    /// Columns in field order.
    pub columns: Vec<ColumnDescriptor>,

    /// Qualified name of the type this version was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_name: Option<String>,
}

impl TypeSpec {
    /// Last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.qualified_name)
    }

    /// Position of a column by exact name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn semantic_types(&self) -> Vec<SemanticType> {
        self.columns.iter().map(|c| c.semantic_type).collect()
    }

    /// Rust field name of each column, in column order.
    pub fn field_names(&self) -> Result<Vec<String>> {
        self.columns.iter().map(|c| rust_field_name(&c.name)).collect()
    }
}

/// A finished specification plus, for an evolution, what it evolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltSpec {
    pub spec: TypeSpec,
    pub evolution: Option<Evolution>,
}

/// Predecessor spec and the column diff leading away from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evolution {
    pub predecessor: TypeSpec,
    pub diff: SpecDiff,
}

#[derive(Debug, Clone)]
struct PendingColumn {
    descriptor: ColumnDescriptor,
    /// Predecessor column this one was carried over from.
    origin: Option<String>,
}

/// Mutable specification under construction.
///
/// ```ignore
/// let mut builder = TypeSpecBuilder::new_spec("app.T")?;
/// builder
///     .add_column("Col1", SemanticType::Text)?
///     .add_column("Col2", SemanticType::Int)?;
/// let v1 = builder.build()?;
///
/// let mut builder = TypeSpecBuilder::evolve(&v1.spec);
/// builder.add_column("Col3", SemanticType::Bool)?;
/// let v2 = builder.build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TypeSpecBuilder {
    qualified_name: String,
    version: u32,
    columns: Vec<PendingColumn>,
    prior: Option<TypeSpec>,
}

impl TypeSpecBuilder {
    /// Start an empty specification at version 1.
    pub fn new_spec(qualified_name: &str) -> Result<Self> {
        validate_qualified_name(qualified_name)?;
        Ok(Self {
            qualified_name: qualified_name.to_string(),
            version: 1,
            columns: Vec::new(),
            prior: None,
        })
    }

    /// Build against a previously persisted specification.
    ///
    /// Columns are matched to the prior spec by name; the version becomes
    /// one past the prior version.
    pub fn against(mut self, prior: TypeSpec) -> Self {
        self.version = prior.version + 1;
        self.prior = Some(prior);
        self
    }

    /// Raise the version to at least `version`.
    ///
    /// Used when an earlier build of the same name was destroyed, so its
    /// version numbers are not handed out again.
    pub fn at_least_version(mut self, version: u32) -> Self {
        self.version = self.version.max(version);
        self
    }

    /// Start from the columns of `prior`, ready for edits.
    pub fn evolve(prior: &TypeSpec) -> Self {
        Self {
            qualified_name: prior.qualified_name.clone(),
            version: prior.version + 1,
            columns: carried(prior),
            prior: Some(prior.clone()),
        }
    }

    /// Start a differently named type whose predecessor is `prior`.
    pub fn copy_to(prior: &TypeSpec, new_name: &str) -> Result<Self> {
        validate_qualified_name(new_name)?;
        Ok(Self {
            qualified_name: new_name.to_string(),
            version: 1,
            columns: carried(prior),
            prior: Some(prior.clone()),
        })
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn prior(&self) -> Option<&TypeSpec> {
        self.prior.as_ref()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().map(|c| &c.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.descriptor.name == name)
    }

    fn unknown(&self, name: &str) -> TupleGenError {
        TupleGenError::UnknownAttribute {
            type_name: self.qualified_name.clone(),
            name: name.to_string(),
        }
    }

    /// Append a column declared by semantic type.
    pub fn add_column(&mut self, name: &str, semantic_type: SemanticType) -> Result<&mut Self> {
        self.add_descriptor(ColumnDescriptor::declared(name, semantic_type))
    }

    /// Append a probed column.
    pub fn add_descriptor(&mut self, descriptor: ColumnDescriptor) -> Result<&mut Self> {
        if self.contains(&descriptor.name) {
            return Err(TupleGenError::DuplicateAttribute {
                type_name: self.qualified_name.clone(),
                name: descriptor.name,
                semantic_type: descriptor.semantic_type,
            });
        }
        rust_field_name(&descriptor.name)?;
        self.columns.push(PendingColumn {
            descriptor,
            origin: None,
        });
        Ok(self)
    }

    pub fn remove_column(&mut self, name: &str) -> Result<&mut Self> {
        let idx = self.index_of(name).ok_or_else(|| self.unknown(name))?;
        self.columns.remove(idx);
        Ok(self)
    }

    /// Rename a column in place. Against a prior spec the column stays
    /// retained, reading from its old name.
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<&mut Self> {
        let idx = self.index_of(old).ok_or_else(|| self.unknown(old))?;
        if old == new {
            return Ok(self);
        }
        if let Some(existing) = self.index_of(new) {
            return Err(TupleGenError::DuplicateAttribute {
                type_name: self.qualified_name.clone(),
                name: new.to_string(),
                semantic_type: self.columns[existing].descriptor.semantic_type,
            });
        }
        rust_field_name(new)?;

        let column = &mut self.columns[idx];
        if column.origin.is_none() && self.prior.as_ref().is_some_and(|p| p.position(old).is_some())
        {
            column.origin = Some(old.to_string());
        }
        column.descriptor.name = new.to_string();
        Ok(self)
    }

    /// Change a column's semantic type, keeping its position.
    pub fn retype_column(&mut self, name: &str, semantic_type: SemanticType) -> Result<&mut Self> {
        let idx = self.index_of(name).ok_or_else(|| self.unknown(name))?;
        let descriptor = &mut self.columns[idx].descriptor;
        if descriptor.semantic_type != semantic_type {
            descriptor.semantic_type = semantic_type;
            descriptor.source_type = semantic_type.default_native().to_string();
        }
        Ok(self)
    }

    /// Added, removed and retained columns relative to `prior`.
    pub fn diff_against(&self, prior: &TypeSpec) -> SpecDiff {
        let tagged: Vec<_> = self
            .columns
            .iter()
            .map(|c| (c.descriptor.clone(), c.origin.clone()))
            .collect();
        SpecDiff::from_origins(prior, &tagged)
    }

    /// Finish the specification.
    ///
    /// With a prior spec, retained columns come first in the prior spec's
    /// order, then added columns in the order they were added.
    pub fn build(self) -> Result<BuiltSpec> {
        self.check_field_names()?;

        let Some(prior) = self.prior.clone() else {
            return Ok(BuiltSpec {
                spec: TypeSpec {
                    qualified_name: self.qualified_name,
                    version: self.version,
                    columns: self.columns.into_iter().map(|c| c.descriptor).collect(),
                    predecessor_name: None,
                },
                evolution: None,
            });
        };

        let diff = self.diff_against(&prior);
        let by_name = |name: &str| {
            self.columns
                .iter()
                .find(|c| c.descriptor.name == name)
                .map(|c| c.descriptor.clone())
        };
        let mut columns = Vec::with_capacity(self.columns.len());
        for retained in &diff.retained {
            columns.extend(by_name(&retained.name));
        }
        columns.extend(diff.added.iter().cloned());

        Ok(BuiltSpec {
            spec: TypeSpec {
                qualified_name: self.qualified_name,
                version: self.version,
                columns,
                predecessor_name: Some(prior.qualified_name.clone()),
            },
            evolution: Some(Evolution {
                predecessor: prior,
                diff,
            }),
        })
    }

    fn check_field_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            let field = rust_field_name(&column.descriptor.name)?;
            if !seen.insert(field.clone()) {
                return Err(TupleGenError::invalid_name(
                    &column.descriptor.name,
                    format!(
                        "maps to field `{}` which another column of {} already uses",
                        field, self.qualified_name
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn carried(prior: &TypeSpec) -> Vec<PendingColumn> {
    prior
        .columns
        .iter()
        .map(|c| PendingColumn {
            descriptor: c.clone(),
            origin: Some(c.name.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1() -> TypeSpec {
        let mut b = TypeSpecBuilder::new_spec("app.T").unwrap();
        b.add_column("Col1", SemanticType::Text)
            .unwrap()
            .add_column("Col2", SemanticType::Int)
            .unwrap();
        b.build().unwrap().spec
    }

    #[test]
    fn test_new_spec_validates_name() {
        assert!(TypeSpecBuilder::new_spec("app.T").is_ok());
        assert!(TypeSpecBuilder::new_spec("app.2T").is_err());
        assert!(TypeSpecBuilder::new_spec("").is_err());
    }

    #[test]
    fn test_duplicate_attribute_is_case_sensitive() {
        let mut b = TypeSpecBuilder::new_spec("app.T").unwrap();
        b.add_column("x", SemanticType::Int).unwrap();
        let err = b.add_column("x", SemanticType::Text).unwrap_err();
        assert!(matches!(err, TupleGenError::DuplicateAttribute { .. }));
        assert!(b.add_column("X", SemanticType::Text).is_ok());
        assert!(b.contains("X"));
    }

    #[test]
    fn test_case_variants_collide_at_build() {
        let mut b = TypeSpecBuilder::new_spec("app.T").unwrap();
        b.add_column("x", SemanticType::Int).unwrap();
        b.add_column("X", SemanticType::Int).unwrap();
        assert!(matches!(
            b.build().unwrap_err(),
            TupleGenError::InvalidName { .. }
        ));
    }

    #[test]
    fn test_remove_unknown_attribute() {
        let mut b = TypeSpecBuilder::new_spec("app.T").unwrap();
        let err = b.remove_column("missing").unwrap_err();
        assert!(matches!(err, TupleGenError::UnknownAttribute { .. }));
    }

    #[test]
    fn test_fresh_build_has_no_evolution() {
        let spec = v1();
        assert_eq!(spec.version, 1);
        assert_eq!(spec.column_names(), vec!["Col1", "Col2"]);
        assert_eq!(spec.predecessor_name, None);
    }

    #[test]
    fn test_evolve_appends_added_after_retained() {
        let prior = v1();
        let mut b = TypeSpecBuilder::evolve(&prior);
        b.add_column("Col3", SemanticType::Bool).unwrap();
        let built = b.build().unwrap();

        assert_eq!(built.spec.version, 2);
        assert_eq!(built.spec.column_names(), vec!["Col1", "Col2", "Col3"]);
        assert_eq!(built.spec.predecessor_name.as_deref(), Some("app.T"));
        let evolution = built.evolution.unwrap();
        assert_eq!(evolution.diff.added.len(), 1);
        assert_eq!(evolution.diff.retained.len(), 2);
        assert!(evolution.diff.removed.is_empty());
    }

    #[test]
    fn test_against_orders_retained_by_prior() {
        let prior = v1();
        let mut b = TypeSpecBuilder::new_spec("app.T").unwrap().against(prior);
        b.add_column("New", SemanticType::Long).unwrap();
        b.add_column("Col2", SemanticType::Int).unwrap();
        b.add_column("Col1", SemanticType::Text).unwrap();
        let built = b.build().unwrap();
        assert_eq!(built.spec.column_names(), vec!["Col1", "Col2", "New"]);
    }

    #[test]
    fn test_remove_records_removed_column() {
        let prior = v1();
        let mut b = TypeSpecBuilder::evolve(&prior);
        b.remove_column("Col1").unwrap();
        let built = b.build().unwrap();
        assert_eq!(built.spec.column_names(), vec!["Col2"]);
        let diff = built.evolution.unwrap().diff;
        assert_eq!(diff.removed[0].name, "Col1");
    }

    #[test]
    fn test_rename_keeps_column_retained() {
        let prior = v1();
        let mut b = TypeSpecBuilder::evolve(&prior);
        b.rename_column("Col2", "Count").unwrap();
        let diff = b.diff_against(&prior);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.retained[1].name, "Count");
        assert_eq!(diff.retained[1].source_name, "Col2");
    }

    #[test]
    fn test_retype_marks_retained_retyped() {
        let prior = v1();
        let mut b = TypeSpecBuilder::evolve(&prior);
        b.retype_column("Col2", SemanticType::Long).unwrap();
        let diff = b.diff_against(&prior);
        assert!(diff.retained[1].is_retyped());
        assert_eq!(diff.retained[1].from, SemanticType::Int);
        assert_eq!(diff.retained[1].to, SemanticType::Long);
    }

    #[test]
    fn test_at_least_version_never_lowers() {
        let built = TypeSpecBuilder::new_spec("app.T")
            .unwrap()
            .at_least_version(4)
            .build()
            .unwrap();
        assert_eq!(built.spec.version, 4);
        assert_eq!(built.spec.predecessor_name, None);

        let evolved = TypeSpecBuilder::evolve(&v1()).at_least_version(1);
        assert_eq!(evolved.version(), 2);
    }

    #[test]
    fn test_copy_to_new_name() {
        let prior = v1();
        let built = TypeSpecBuilder::copy_to(&prior, "app.U")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(built.spec.qualified_name, "app.U");
        assert_eq!(built.spec.version, 1);
        assert_eq!(built.spec.predecessor_name.as_deref(), Some("app.T"));
        assert!(built.evolution.unwrap().diff.is_unchanged());
    }
}
