//! Identifier validation for SQL names and generated Rust names.
//!
//! SQL identifiers (table and column names) cannot be bound as statement
//! parameters, so every identifier that reaches SQL text is validated and
//! then quoted by the dialect. Qualified type names such as
//! `app.model.Customer` become both a Rust type name and a directory path
//! under the code directory, so each dotted segment must be a plain Rust
//! identifier.

use crate::error::{Result, TupleGenError};

/// Maximum identifier length (PostgreSQL truncates at 63 bytes).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Rust keywords that cannot be used as bare field names.
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Validate a SQL identifier for security issues.
///
/// Rejects empty names, names containing null bytes and names exceeding
/// the maximum identifier length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TupleGenError::invalid_name(name, "identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(TupleGenError::invalid_name(
            name,
            "identifier contains a null byte",
        ));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TupleGenError::invalid_name(
            name,
            format!(
                "identifier exceeds {} bytes (got {})",
                MAX_IDENTIFIER_LENGTH,
                name.len()
            ),
        ));
    }

    Ok(())
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_double(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

fn is_rust_ident(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    segment != "_" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a dotted name such as `app.model.Customer`.
pub fn validate_qualified_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TupleGenError::invalid_name(name, "name cannot be empty"));
    }
    for segment in name.split('.') {
        if !is_rust_ident(segment) {
            return Err(TupleGenError::invalid_name(
                name,
                format!("segment '{}' is not a valid identifier", segment),
            ));
        }
        if RUST_KEYWORDS.contains(&segment) {
            return Err(TupleGenError::invalid_name(
                name,
                format!("segment '{}' is a reserved word", segment),
            ));
        }
    }
    Ok(())
}

/// Split a qualified name into its namespace segments and simple name.
pub fn split_qualified_name(name: &str) -> (Vec<&str>, &str) {
    match name.rsplit_once('.') {
        Some((namespace, simple)) => (namespace.split('.').collect(), simple),
        None => (Vec::new(), name),
    }
}

/// Simple (last segment) name of a qualified name.
pub fn simple_name(name: &str) -> &str {
    split_qualified_name(name).1
}

/// Map a column name to a Rust field name.
///
/// Lowercases ASCII letters, replaces anything other than letters, digits
/// and `_` with `_`, prefixes names starting with a digit and escapes
/// keywords as raw identifiers.
pub fn rust_field_name(column: &str) -> Result<String> {
    validate_identifier(column)?;

    let mut field: String = column
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if field.starts_with(|c: char| c.is_ascii_digit()) {
        field.insert(0, '_');
    }
    if field.chars().all(|c| c == '_') {
        return Err(TupleGenError::invalid_name(
            column,
            "column name has no usable characters for a field",
        ));
    }
    if RUST_KEYWORDS.contains(&field.as_str()) {
        if matches!(field.as_str(), "self" | "crate" | "super") {
            field.push('_');
        } else {
            field.insert_str(0, "r#");
        }
    }
    Ok(field)
}

/// Type name for a table: `$$order_item` becomes `OrderItem`.
///
/// Drops the table prefix marker and any schema, then joins the remaining
/// words in upper camel case.
pub fn type_name_for_table(table: &str) -> Result<String> {
    let base = table.rsplit('.').next().unwrap_or(table).replace("$$", "");
    let mut name: String = base
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'T');
    }
    validate_qualified_name(&name)
        .map_err(|_| TupleGenError::invalid_name(table, "table name has no usable characters for a type"))?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a\0b").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_err());
    }

    #[test]
    fn test_quote_double() {
        assert_eq!(quote_double("users").unwrap(), "\"users\"");
        assert_eq!(quote_double("a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn test_qualified_names() {
        assert!(validate_qualified_name("app.model.Customer").is_ok());
        assert!(validate_qualified_name("T").is_ok());
        assert!(validate_qualified_name("app..T").is_err());
        assert!(validate_qualified_name("app.1T").is_err());
        assert!(validate_qualified_name("app.fn.T").is_err());
        assert!(validate_qualified_name("app/T").is_err());
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(
            split_qualified_name("app.model.Customer"),
            (vec!["app", "model"], "Customer")
        );
        assert_eq!(split_qualified_name("T"), (Vec::<&str>::new(), "T"));
        assert_eq!(simple_name("a.b.C"), "C");
    }

    #[test]
    fn test_type_name_for_table() {
        assert_eq!(type_name_for_table("$$order_item").unwrap(), "OrderItem");
        assert_eq!(type_name_for_table("public.customers").unwrap(), "Customers");
        assert_eq!(type_name_for_table("2024 sales").unwrap(), "T2024Sales");
        assert!(type_name_for_table("$$").is_err());
    }

    #[test]
    fn test_rust_field_name() {
        assert_eq!(rust_field_name("Col1").unwrap(), "col1");
        assert_eq!(rust_field_name("first name").unwrap(), "first_name");
        assert_eq!(rust_field_name("1st").unwrap(), "_1st");
        assert_eq!(rust_field_name("type").unwrap(), "r#type");
        assert_eq!(rust_field_name("self").unwrap(), "self_");
        assert!(rust_field_name("--").is_err());
    }
}
