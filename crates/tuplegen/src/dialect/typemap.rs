//! Native type name to semantic type tables.
//!
//! Lookups are case-insensitive and ignore type parameters, so
//! `varchar(20)`, `VARCHAR (20)` and `VARCHAR` all resolve through the
//! `VARCHAR` entry. Names with no entry map to [`SemanticType::Opaque`].

use crate::core::SemanticType;

/// Static mapping table for one dialect.
#[derive(Debug)]
pub struct TypeMapTable {
    entries: &'static [(&'static str, SemanticType)],
}

impl TypeMapTable {
    /// Create a table from `(UPPERCASE_NATIVE_NAME, semantic)` pairs.
    pub const fn new(entries: &'static [(&'static str, SemanticType)]) -> Self {
        Self { entries }
    }

    /// Semantic type for a native type name.
    pub fn lookup(&self, native: &str) -> SemanticType {
        let key = normalize_native(native);
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, semantic)| *semantic)
            .unwrap_or(SemanticType::Opaque)
    }

    /// Number of native names in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Uppercase, drop `(...)` parameters and collapse whitespace.
pub fn normalize_native(native: &str) -> String {
    let mut out = String::with_capacity(native.len());
    let mut depth = 0usize;
    for c in native.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ => out.push(c.to_ascii_uppercase()),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
