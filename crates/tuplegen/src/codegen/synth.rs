//! Rust source rendering for record types.
//!
//! A synthesized unit holds one struct with an `Option` field per column,
//! its [`Tuple`](crate::record::Tuple) implementation and a `Display`
//! rendering `T {a = 1, b = x}`. For an evolution the unit also carries the
//! predecessor's shape in a `v{N}` module and a `reconcile_from` function
//! mapping the old shape onto the new one.
//!
//! A defined statement renders as a unit struct holding the SQL and typed
//! `async` functions that bind one argument per `?` and decode rows into
//! any generated struct with the statement's columns.
//!
//! Output is deterministic for a given spec so the artifact hash only
//! changes when the shape does.

use crate::core::identifier::simple_name;
use crate::core::{ColumnDescriptor, SemanticType};
use crate::error::Result;

use super::reconcile::{FieldSource, ReconcilePlan};
use super::spec::{BuiltSpec, TypeSpec};
use super::statement::{StatementKind, StatementSpec, TableWrites};

/// Source text for one record type version.
#[derive(Debug, Clone)]
pub struct SynthesizedSource {
    pub spec: TypeSpec,
    pub source_text: String,
    /// Present when the spec evolved from a predecessor.
    pub plan: Option<ReconcilePlan>,
}

/// Source text for one defined statement.
#[derive(Debug, Clone)]
pub struct SynthesizedStatement {
    pub spec: StatementSpec,
    pub source_text: String,
}

/// Renders specifications into Rust source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSynthesizer;

impl SourceSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Render `built` into source text.
    ///
    /// Fails with `IncompatibleRetype` before rendering anything when a
    /// retained column has no defined conversion.
    pub fn synthesize(&self, built: &BuiltSpec) -> Result<SynthesizedSource> {
        let spec = &built.spec;
        let plan = built
            .evolution
            .as_ref()
            .map(|evolution| ReconcilePlan::from_evolution(spec, evolution))
            .transpose()?;

        let fields = spec.field_names()?;
        let mut out = String::new();

        out.push_str(&format!(
            "// @generated by tuplegen from {} version {}. Do not edit.\n\n",
            spec.qualified_name, spec.version
        ));
        out.push_str(&format!(
            "/// Record type `{}`, version {}.\n",
            spec.qualified_name, spec.version
        ));
        render_struct(&mut out, spec, &fields, "");
        out.push('\n');
        render_tuple_impl(&mut out, spec, &fields);
        out.push('\n');
        render_display(&mut out, spec, &fields);

        if let (Some(evolution), Some(plan)) = (&built.evolution, &plan) {
            let predecessor = &evolution.predecessor;
            let previous_fields = predecessor.field_names()?;
            let module = format!("v{}", predecessor.version);

            out.push('\n');
            out.push_str(&format!(
                "/// Shape of `{}` version {}.\n",
                predecessor.qualified_name, predecessor.version
            ));
            out.push_str(&format!("pub mod {} {{\n", module));
            render_struct(&mut out, predecessor, &previous_fields, "    ");
            out.push_str("}\n\n");

            render_reconcile(&mut out, spec, plan, &fields, &previous_fields, &module);
        }

        Ok(SynthesizedSource {
            spec: spec.clone(),
            source_text: out,
            plan,
        })
    }

    /// Render the accessors of a defined query or update.
    pub fn synthesize_statement(&self, spec: &StatementSpec) -> Result<SynthesizedStatement> {
        let name = spec.simple_name();
        let mut out = String::new();

        out.push_str(&format!(
            "// @generated by tuplegen from statement {}. Do not edit.\n\n",
            spec.qualified_name
        ));
        match &spec.kind {
            StatementKind::Query { tuple_name, .. } => out.push_str(&format!(
                "/// Query `{}`; rows take the shape of `{}`.\n",
                spec.qualified_name, tuple_name
            )),
            StatementKind::Update => {
                out.push_str(&format!("/// Update `{}`.\n", spec.qualified_name))
            }
        }
        out.push_str(&format!("pub struct {};\n\n", name));
        out.push_str(&format!("impl {} {{\n", name));
        out.push_str(&format!(
            "    pub const NAME: &'static str = {:?};\n",
            spec.qualified_name
        ));
        out.push_str(&format!("    pub const SQL: &'static str = {:?};\n", spec.sql));
        out.push_str("    pub const PARAMS: &'static [::tuplegen::SemanticType] = &[");
        out.push_str(
            &spec
                .params
                .iter()
                .map(|kind| format!("::tuplegen::SemanticType::{}", kind.variant_name()))
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push_str("];\n");

        let args = render_params(&spec.params);
        let bound = render_bound(&spec.params);

        match &spec.kind {
            StatementKind::Query {
                tuple_name,
                columns,
                table,
            } => {
                out.push_str(&format!(
                    "    pub const TUPLE: &'static str = {:?};\n",
                    tuple_name
                ));
                render_columns_const(&mut out, columns);
                if let Some(table) = table {
                    render_write_consts(&mut out, table);
                }
                out.push('\n');
                render_query_fns(&mut out, &args, &bound);
                if let Some(table) = table {
                    render_write_fns(&mut out, table);
                }
            }
            StatementKind::Update => {
                out.push('\n');
                render_update_fns(&mut out, &args, &bound);
            }
        }
        out.push_str("}\n");

        Ok(SynthesizedStatement {
            spec: spec.clone(),
            source_text: out,
        })
    }
}

/// `, p1: i64, p2: String` for the statement parameters.
fn render_params(params: &[SemanticType]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, kind)| format!(", p{}: {}", i + 1, kind.rust_type()))
        .collect()
}

/// `&[SqlValue::from(p1), ...]` binding the parameters in order.
fn render_bound(params: &[SemanticType]) -> String {
    let values: Vec<String> = (1..=params.len())
        .map(|i| format!("::tuplegen::SqlValue::from(p{})", i))
        .collect();
    format!("&[{}]", values.join(", "))
}

fn render_columns_const(out: &mut String, columns: &[ColumnDescriptor]) {
    out.push_str("    pub const COLUMNS: &'static [(&'static str, ::tuplegen::SemanticType)] = &[\n");
    for column in columns {
        out.push_str(&format!(
            "        ({:?}, ::tuplegen::SemanticType::{}),\n",
            column.name,
            column.semantic_type.variant_name()
        ));
    }
    out.push_str("    ];\n");
}

fn render_write_consts(out: &mut String, table: &TableWrites) {
    out.push_str(&format!("    pub const TABLE: &'static str = {:?};\n", table.table));
    out.push_str(&format!(
        "    pub const KEY_INDEXES: &'static [usize] = &[{}];\n",
        table
            .key_indexes
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    out.push_str(&format!(
        "    pub const INSERT_SQL: &'static str = {:?};\n",
        table.insert_sql
    ));
    if let Some(update_sql) = &table.update_sql {
        out.push_str(&format!(
            "    pub const UPDATE_SQL: &'static str = {:?};\n",
            update_sql
        ));
    }
    out.push_str(&format!(
        "    pub const DELETE_SQL: &'static str = {:?};\n",
        table.delete_sql
    ));
}

const CHECK_COLUMNS: &str =
    "        ::tuplegen::record::check_columns::<T>(Self::NAME, Self::COLUMNS)?;\n";

fn render_query_fns(out: &mut String, args: &str, bound: &str) {
    for (fn_name, receiver, handle, doc) in [
        ("query", "db: &::tuplegen::ConnectionManager", "db", "on a pooled connection"),
        ("query_in", "tx: &mut ::tuplegen::Transaction", "tx", "inside `tx`"),
    ] {
        out.push_str(&format!(
            "    /// Run the query {}, handing each row to `f`. Returns the row count.\n",
            doc
        ));
        out.push_str(&format!(
            "    pub async fn {}<T, F>({}{}, f: F) -> ::tuplegen::Result<u64>\n",
            fn_name, receiver, args
        ));
        out.push_str("    where\n");
        out.push_str("        T: ::tuplegen::record::Tuple,\n");
        out.push_str("        F: FnMut(T) -> ::tuplegen::Result<()> + Send,\n");
        out.push_str("    {\n");
        out.push_str(CHECK_COLUMNS);
        out.push_str(&format!(
            "        {}.query_tuples::<T, F>(Self::SQL, {}, f).await\n",
            handle, bound
        ));
        out.push_str("    }\n\n");
    }
}

fn render_write_fns(out: &mut String, table: &TableWrites) {
    let signature = |fn_name: &str, row: &str| {
        format!(
            "    pub async fn {}<T: ::tuplegen::record::Tuple>(\n        tx: &mut ::tuplegen::Transaction,\n        {}: T,\n    ) -> ::tuplegen::Result<u64> {{\n",
            fn_name, row
        )
    };

    out.push_str(&format!("    /// Insert `row` into `{}`.\n", doc_text(&table.table)));
    out.push_str(&signature("insert", "row"));
    out.push_str(CHECK_COLUMNS);
    out.push_str("        tx.execute(Self::INSERT_SQL, &row.into_values()).await\n");
    out.push_str("    }\n\n");

    out.push_str(&format!(
        "    /// Update the row of `{}` with the key of `row`.\n",
        doc_text(&table.table)
    ));
    if table.update_sql.is_some() {
        out.push_str(&signature("update", "row"));
        out.push_str(CHECK_COLUMNS);
        out.push_str("        let params = ::tuplegen::record::update_values(row.into_values(), Self::KEY_INDEXES);\n");
        out.push_str("        tx.execute(Self::UPDATE_SQL, &params).await\n");
    } else {
        out.push_str(&signature("update", "_row"));
        out.push_str(CHECK_COLUMNS);
        out.push_str("        // Every column is part of the key.\n");
        out.push_str("        Ok(0)\n");
    }
    out.push_str("    }\n\n");

    out.push_str(&format!(
        "    /// Delete the row of `{}` with the key of `row`.\n",
        doc_text(&table.table)
    ));
    out.push_str(&signature("delete", "row"));
    out.push_str(CHECK_COLUMNS);
    out.push_str("        let params = ::tuplegen::record::key_values(&row.into_values(), Self::KEY_INDEXES);\n");
    out.push_str("        tx.execute(Self::DELETE_SQL, &params).await\n");
    out.push_str("    }\n\n");
}

fn render_update_fns(out: &mut String, args: &str, bound: &str) {
    for (fn_name, receiver, handle, doc) in [
        ("update", "db: &::tuplegen::ConnectionManager", "db", "on a pooled connection"),
        ("update_in", "tx: &mut ::tuplegen::Transaction", "tx", "inside `tx`"),
    ] {
        out.push_str(&format!(
            "    /// Execute the statement {}. Returns the affected row count.\n",
            doc
        ));
        out.push_str(&format!(
            "    pub async fn {}({}{}) -> ::tuplegen::Result<u64> {{\n",
            fn_name, receiver, args
        ));
        out.push_str(&format!("        {}.execute(Self::SQL, {}).await\n", handle, bound));
        out.push_str("    }\n\n");
    }
}

fn render_struct(out: &mut String, spec: &TypeSpec, fields: &[String], indent: &str) {
    out.push_str(&format!(
        "{indent}#[derive(Debug, Clone, PartialEq, Default)]\n{indent}pub struct {} {{\n",
        spec.simple_name()
    ));
    for (column, field) in spec.columns.iter().zip(fields) {
        out.push_str(&format!(
            "{indent}    /// `{}`: {} ({})\n{indent}    pub {}: Option<{}>,\n",
            doc_text(&column.name),
            doc_text(&column.source_type),
            column.semantic_type,
            field,
            column.semantic_type.rust_type()
        ));
    }
    out.push_str(&format!("{indent}}}\n"));
}

/// Text safe to embed in a one-line doc comment.
fn doc_text(text: &str) -> String {
    text.replace(|c: char| c == '`' || c.is_control(), "'")
}

fn render_tuple_impl(out: &mut String, spec: &TypeSpec, fields: &[String]) {
    let name = spec.simple_name();
    out.push_str(&format!("impl ::tuplegen::record::Tuple for {} {{\n", name));
    out.push_str(&format!(
        "    const NAME: &'static str = {:?};\n",
        spec.qualified_name
    ));
    out.push_str(&format!("    const VERSION: u32 = {};\n", spec.version));
    out.push_str("    const COLUMNS: &'static [(&'static str, ::tuplegen::SemanticType)] = &[\n");
    for column in &spec.columns {
        out.push_str(&format!(
            "        ({:?}, ::tuplegen::SemanticType::{}),\n",
            column.name,
            column.semantic_type.variant_name()
        ));
    }
    out.push_str("    ];\n\n");

    out.push_str(
        "    fn from_values(values: Vec<::tuplegen::SqlValue>) -> ::tuplegen::Result<Self> {\n",
    );
    out.push_str("        if values.len() != Self::COLUMNS.len() {\n");
    out.push_str("            return Err(::tuplegen::TupleGenError::record(\n");
    out.push_str("                Self::NAME,\n");
    out.push_str(
        "                format!(\"expected {} values, got {}\", Self::COLUMNS.len(), values.len()),\n",
    );
    out.push_str("            ));\n");
    out.push_str("        }\n");
    out.push_str("        let mut values = values.into_iter();\n");
    out.push_str("        Ok(Self {\n");
    for (column, field) in spec.columns.iter().zip(fields) {
        out.push_str(&format!(
            "            {}: ::tuplegen::record::take_field(&mut values, Self::NAME, {:?})?,\n",
            field, column.name
        ));
    }
    out.push_str("        })\n");
    out.push_str("    }\n\n");

    out.push_str("    fn into_values(self) -> Vec<::tuplegen::SqlValue> {\n");
    out.push_str("        vec![\n");
    for field in fields {
        out.push_str(&format!(
            "            ::tuplegen::record::FieldValue::into_value(self.{}),\n",
            field
        ));
    }
    out.push_str("        ]\n");
    out.push_str("    }\n");
    out.push_str("}\n");
}

fn render_display(out: &mut String, spec: &TypeSpec, fields: &[String]) {
    let name = spec.simple_name();
    out.push_str(&format!("impl ::std::fmt::Display for {} {{\n", name));
    out.push_str("    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {\n");
    out.push_str(&format!("        f.write_str({:?})?;\n", format!("{} {{", name)));
    for (i, (column, field)) in spec.columns.iter().zip(fields).enumerate() {
        let label = if i == 0 {
            format!("{} = ", column.name)
        } else {
            format!(", {} = ", column.name)
        };
        out.push_str(&format!("        f.write_str({:?})?;\n", label));
        out.push_str(&format!(
            "        f.write_str(&::tuplegen::record::display_field(&self.{}))?;\n",
            field
        ));
    }
    out.push_str("        f.write_str(\"}\")\n");
    out.push_str("    }\n");
    out.push_str("}\n");
}

fn render_reconcile(
    out: &mut String,
    spec: &TypeSpec,
    plan: &ReconcilePlan,
    fields: &[String],
    previous_fields: &[String],
    module: &str,
) {
    let name = spec.simple_name();
    let previous = simple_name(&plan.predecessor_name);

    out.push_str(&format!("impl {} {{\n", name));
    out.push_str(&format!(
        "    /// Populate a version {} `{}` from a `{}` version {} instance.\n",
        spec.version, name, plan.predecessor_name, plan.predecessor_version
    ));
    out.push_str(&format!(
        "    pub fn reconcile_from(prev: &{}::{}) -> ::tuplegen::Result<Self> {{\n",
        module, previous
    ));
    out.push_str("        Ok(Self {\n");
    for (field_plan, field) in plan.fields.iter().zip(fields) {
        let expr = match &field_plan.source {
            FieldSource::Copy {
                from_index,
                conversion,
                ..
            } => conversion.render(
                &format!("prev.{}", previous_fields[*from_index]),
                field_plan.semantic_type,
                &spec.qualified_name,
                &field_plan.column,
            ),
            FieldSource::Zero => format!("Some({})", field_plan.semantic_type.zero_literal()),
        };
        out.push_str(&format!("            {}: {},\n", field, expr));
    }
    out.push_str("        })\n");
    out.push_str("    }\n");
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::spec::TypeSpecBuilder;
    use crate::core::SemanticType;
    use crate::error::TupleGenError;

    fn v1() -> BuiltSpec {
        let mut b = TypeSpecBuilder::new_spec("app.T").unwrap();
        b.add_column("Col1", SemanticType::Text).unwrap();
        b.add_column("Col2", SemanticType::Int).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_fresh_type_renders_struct_and_tuple() {
        let unit = SourceSynthesizer::new().synthesize(&v1()).unwrap();
        let src = &unit.source_text;

        assert!(unit.plan.is_none());
        assert!(src.contains("pub struct T {"));
        assert!(src.contains("pub col1: Option<String>,"));
        assert!(src.contains("pub col2: Option<i32>,"));
        assert!(src.contains("const VERSION: u32 = 1;"));
        assert!(src.contains("const NAME: &'static str = \"app.T\";"));
        assert!(!src.contains("reconcile_from"));
        syn::parse_file(src).unwrap();
    }

    #[test]
    fn test_evolution_renders_reconcile() {
        let mut b = TypeSpecBuilder::evolve(&v1().spec);
        b.add_column("Col3", SemanticType::Bool).unwrap();
        let unit = SourceSynthesizer::new()
            .synthesize(&b.build().unwrap())
            .unwrap();
        let src = &unit.source_text;

        assert!(src.contains("pub mod v1 {"));
        assert!(src.contains("pub fn reconcile_from(prev: &v1::T) -> ::tuplegen::Result<Self>"));
        assert!(src.contains("col1: prev.col1.clone(),"));
        assert!(src.contains("col3: Some(false),"));
        assert!(unit.plan.is_some());
        syn::parse_file(src).unwrap();
    }

    #[test]
    fn test_retype_renders_conversion() {
        let mut b = TypeSpecBuilder::evolve(&v1().spec);
        b.retype_column("Col2", SemanticType::Long).unwrap();
        let unit = SourceSynthesizer::new()
            .synthesize(&b.build().unwrap())
            .unwrap();
        assert!(unit.source_text.contains("col2: prev.col2.map(i64::from),"));
        syn::parse_file(&unit.source_text).unwrap();
    }

    #[test]
    fn test_incompatible_retype_fails() {
        let mut b = TypeSpecBuilder::evolve(&v1().spec);
        b.retype_column("Col1", SemanticType::Int).unwrap();
        let err = SourceSynthesizer::new()
            .synthesize(&b.build().unwrap())
            .unwrap_err();
        assert!(matches!(err, TupleGenError::IncompatibleRetype { .. }));
    }

    #[test]
    fn test_output_is_deterministic() {
        let built = v1();
        let a = SourceSynthesizer::new().synthesize(&built).unwrap();
        let b = SourceSynthesizer::new().synthesize(&built).unwrap();
        assert_eq!(a.source_text, b.source_text);
    }

    #[test]
    fn test_awkward_column_names_stay_quoted() {
        let mut b = TypeSpecBuilder::new_spec("app.Odd").unwrap();
        b.add_column("type", SemanticType::Text).unwrap();
        b.add_column("a \"b\" {c}", SemanticType::Int).unwrap();
        let unit = SourceSynthesizer::new()
            .synthesize(&b.build().unwrap())
            .unwrap();
        assert!(unit.source_text.contains("pub r#type: Option<String>,"));
        syn::parse_file(&unit.source_text).unwrap();
    }

    fn item_columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::declared("id", SemanticType::Long),
            ColumnDescriptor::declared("name", SemanticType::Text),
        ]
    }

    #[test]
    fn test_update_statement_binds_typed_arguments() {
        let spec = StatementSpec::update(
            "app.Rename",
            "UPDATE $$item SET name = ? WHERE id = ?",
            &["bolt".into(), 1i64.into()],
        )
        .unwrap();
        let unit = SourceSynthesizer::new().synthesize_statement(&spec).unwrap();
        let src = &unit.source_text;

        assert!(src.contains("pub struct Rename;"));
        assert!(src.contains(
            "pub async fn update(db: &::tuplegen::ConnectionManager, p1: String, p2: i64) -> ::tuplegen::Result<u64>"
        ));
        assert!(src.contains("pub async fn update_in(tx: &mut ::tuplegen::Transaction, p1: String, p2: i64)"));
        assert!(src.contains(
            "db.execute(Self::SQL, &[::tuplegen::SqlValue::from(p1), ::tuplegen::SqlValue::from(p2)]).await"
        ));
        assert!(!src.contains("COLUMNS"));
        syn::parse_file(src).unwrap();
    }

    #[test]
    fn test_table_query_renders_keyed_writes() {
        let writes = TableWrites::new(
            &crate::drivers::SqliteDialect::new(),
            "app.Item",
            "item",
            &item_columns(),
            vec!["id".into()],
        )
        .unwrap();
        let spec = StatementSpec::query(
            "app.Item",
            "SELECT id, name FROM $$item WHERE id > ?",
            &[0i64.into()],
            "app.ItemTuple",
            item_columns(),
            Some(writes),
        )
        .unwrap();
        let unit = SourceSynthesizer::new().synthesize_statement(&spec).unwrap();
        let src = &unit.source_text;

        assert!(src.contains("pub const TUPLE: &'static str = \"app.ItemTuple\";"));
        assert!(src.contains("(\"name\", ::tuplegen::SemanticType::Text),"));
        assert!(src.contains("pub const KEY_INDEXES: &'static [usize] = &[0];"));
        assert!(src.contains("pub async fn query<T, F>(db: &::tuplegen::ConnectionManager, p1: i64, f: F)"));
        assert!(src.contains("pub async fn query_in<T, F>(tx: &mut ::tuplegen::Transaction, p1: i64, f: F)"));
        for write in ["insert", "update", "delete"] {
            assert!(src.contains(&format!("pub async fn {}<T: ::tuplegen::record::Tuple>(", write)));
        }
        assert!(src.contains("update_values(row.into_values(), Self::KEY_INDEXES)"));
        syn::parse_file(src).unwrap();
    }

    #[test]
    fn test_key_only_table_update_is_a_no_op() {
        let columns = item_columns()[..1].to_vec();
        let writes = TableWrites::new(
            &crate::drivers::SqliteDialect::new(),
            "app.Ids",
            "item",
            &columns,
            vec!["id".into()],
        )
        .unwrap();
        let spec =
            StatementSpec::query("app.Ids", "SELECT id FROM item", &[], "app.IdsTuple", columns, Some(writes))
                .unwrap();
        let src = SourceSynthesizer::new()
            .synthesize_statement(&spec)
            .unwrap()
            .source_text;
        assert!(!src.contains("UPDATE_SQL"));
        assert!(src.contains("_row: T,"));
        assert!(src.contains("tx.query_tuples::<T, F>(Self::SQL, &[], f).await"));
        syn::parse_file(&src).unwrap();
    }

    #[test]
    fn test_native_type_names_cannot_break_doc_comments() {
        let mut b = TypeSpecBuilder::new_spec("app.Odd").unwrap();
        b.add_descriptor(crate::core::ColumnDescriptor::new(
            "n",
            "INT\n}\nfn injected() {}\n//",
            SemanticType::Int,
        ))
        .unwrap();
        let unit = SourceSynthesizer::new()
            .synthesize(&b.build().unwrap())
            .unwrap();
        assert!(unit.source_text.contains("/// `n`: INT'}'fn injected() {}'// (int)"));
        assert!(!unit.source_text.contains("\nfn injected"));
        syn::parse_file(&unit.source_text).unwrap();
    }
}
