//! Specifications of the generated sources, shared by `build.rs` and the tests.

use tuplegen::codegen::{StatementSpec, TableWrites, TypeSpec, TypeSpecBuilder};
use tuplegen::drivers::SqliteDialect;
use tuplegen::{ColumnDescriptor, Result, SemanticType, SqlValue};

use SemanticType::{Bool, DateTime, Float, Int, Long, Opaque, Text};

pub const CONV: &str = "generated.Conv";

/// Columns of `generated.Conv` version 1 with their kind in version 2.
/// Together they cover every defined conversion.
pub const CONVERSIONS: &[(&str, SemanticType, SemanticType)] = &[
    ("flag_long", Bool, Long),
    ("flag_int", Bool, Int),
    ("small_long", Int, Long),
    ("small_float", Int, Float),
    ("big_float", Long, Float),
    ("narrow", Long, Int),
    ("bool_text", Bool, Text),
    ("int_text", Int, Text),
    ("long_text", Long, Text),
    ("float_text", Float, Text),
    ("when_text", DateTime, Text),
    ("body", Text, Opaque),
    ("same", Text, Text),
];

/// Version 1, plus a column version 2 removes and one it renames.
pub fn conv_v1() -> Result<TypeSpecBuilder> {
    let mut builder = TypeSpecBuilder::new_spec(CONV)?;
    for (name, from, _) in CONVERSIONS {
        builder.add_column(name, *from)?;
    }
    builder.add_column("gone", Int)?;
    builder.add_column("old_name", Int)?;
    Ok(builder)
}

/// Version 2: every retype, `gone` removed, `old_name` renamed to
/// `new_name` and `extra` added.
pub fn conv_v2(v1: &TypeSpec) -> Result<TypeSpecBuilder> {
    let mut builder = TypeSpecBuilder::evolve(v1);
    for (name, _, to) in CONVERSIONS {
        builder.retype_column(name, *to)?;
    }
    builder.remove_column("gone")?;
    builder.rename_column("old_name", "new_name")?;
    builder.add_column("extra", Long)?;
    Ok(builder)
}

pub const ITEM_TABLE: &str =
    "CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT NOT NULL, qty INTEGER)";

pub fn item_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::declared("id", Long),
        ColumnDescriptor::declared("name", Text),
        ColumnDescriptor::declared("qty", Long),
    ]
}

pub fn item_row() -> Result<TypeSpecBuilder> {
    let mut builder = TypeSpecBuilder::new_spec("generated.ItemRow")?;
    for column in item_columns() {
        builder.add_descriptor(column)?;
    }
    Ok(builder)
}

/// Items with at least `p1` in stock, with keyed writes on `item`.
pub fn items() -> Result<StatementSpec> {
    let columns = item_columns();
    let writes = TableWrites::new(
        &SqliteDialect::new(),
        "generated.Items",
        "item",
        &columns,
        vec!["id".to_string()],
    )?;
    StatementSpec::query(
        "generated.Items",
        "SELECT id, name, qty FROM item WHERE qty >= ? ORDER BY id",
        &[SqlValue::I64(0)],
        "generated.ItemRow",
        columns,
        Some(writes),
    )
}

/// Add `p1` to the stock of the item named `p2`.
pub fn restock() -> Result<StatementSpec> {
    StatementSpec::update(
        "generated.Restock",
        "UPDATE item SET qty = qty + ? WHERE name = ?",
        &[SqlValue::I64(0), SqlValue::from("")],
    )
}
