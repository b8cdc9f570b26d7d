//! Defined queries, table queries and updates against SQLite.

mod common;

use common::TestDb;
use tuplegen::codegen::StatementKind;
use tuplegen::{ColumnDescriptor, SemanticType, SqlValue, TupleGenError};

async fn seed_items(t: &TestDb, table: &str) {
    t.exec(&format!(
        "CREATE TABLE {} (id INTEGER PRIMARY KEY, name TEXT NOT NULL, qty INTEGER)",
        table
    ))
    .await;
    for (id, name, qty) in [(1i64, "bolt", 10i64), (2, "nut", 0), (3, "washer", 7)] {
        t.db
            .execute(
                &format!("INSERT INTO {} (id, name, qty) VALUES (?, ?, ?)", table),
                &[id.into(), name.into(), qty.into()],
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_define_query_builds_row_type_and_accessors() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    let factory = t.factory();

    let built = factory
        .define_query("InStock", "SELECT id, name FROM item WHERE qty > ?", &[0i64.into()])
        .await
        .unwrap();
    assert!(built.success);
    assert!(built.source_path.ends_with("tuplegen/generated/InStock.rs"));
    assert!(built.manifest_path.exists());
    assert_eq!(built.spec.params, vec![SemanticType::Long]);

    let StatementKind::Query {
        tuple_name,
        columns,
        table,
    } = &built.spec.kind
    else {
        panic!("expected a query, got {:?}", built.spec.kind);
    };
    assert_eq!(tuple_name, "tuplegen.generated.InStockTuple");
    assert_eq!(
        columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["id", "name"]
    );
    assert!(table.is_none());

    // The row type is an ordinary record type.
    let row_type = factory.load("InStockTuple").await.unwrap();
    assert_eq!(row_type.spec().columns, *columns);

    let source = std::fs::read_to_string(&built.source_path).unwrap();
    assert!(source.contains("pub async fn query<T, F>(db: &::tuplegen::ConnectionManager, p1: i64, f: F)"));
    assert!(!source.contains("INSERT_SQL"));

    assert_eq!(
        factory.existing_statement("InStock").await.unwrap(),
        Some(built.spec.clone())
    );
    assert!(factory.existing_statement("Missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_define_query_checks_argument_count_first() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    let factory = t.factory();

    let err = factory
        .define_query("Broken", "SELECT id FROM item WHERE qty > ? AND id < ?", &[1i64.into()])
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::Record { .. }));
    assert!(factory.existing_spec("BrokenTuple").await.unwrap().is_none());
    assert!(factory.existing_statement("Broken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_define_query_for_table_resolves_prefix_and_key() {
    let t = TestDb::with_prefix("shop_").await;
    seed_items(&t, "shop_item").await;
    let factory = t.factory();

    let built = factory
        .define_query_for_table(
            "Stock",
            "$$item",
            "SELECT id, name, qty FROM $$item WHERE qty >= ?",
            &[0i64.into()],
        )
        .await
        .unwrap();
    let StatementKind::Query {
        table: Some(writes), ..
    } = &built.spec.kind
    else {
        panic!("expected table writes");
    };
    assert_eq!(writes.table, "shop_item");
    assert_eq!(writes.key_columns, vec!["id".to_string()]);
    assert_eq!(writes.key_indexes, vec![0]);
    assert_eq!(
        writes.insert_sql,
        "INSERT INTO \"shop_item\" (\"id\", \"name\", \"qty\") VALUES (?, ?, ?)"
    );

    let source = std::fs::read_to_string(&built.source_path).unwrap();
    for write in ["insert", "update", "delete"] {
        assert!(source.contains(&format!("pub async fn {}<T: ::tuplegen::record::Tuple>(", write)));
    }
}

#[tokio::test]
async fn test_define_query_for_table_needs_selected_primary_key() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    t.exec("CREATE TABLE note (body TEXT)").await;
    let factory = t.factory();

    let err = factory
        .define_query_for_table("Notes", "note", "SELECT body FROM note", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::NoPrimaryKey(_)));

    let err = factory
        .define_query_for_table("Names", "item", "SELECT name FROM item", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::Record { .. }));
    assert!(factory.existing_spec("NamesTuple").await.unwrap().is_none());
}

#[tokio::test]
async fn test_define_table_names_query_after_table() {
    let t = TestDb::with_prefix("shop_").await;
    t.exec("CREATE TABLE shop_order_item (id INTEGER PRIMARY KEY, sku TEXT, qty INTEGER)")
        .await;
    let factory = t.factory();

    let built = factory
        .define_table("$$order_item", Some("qty > ?"), &[1i64.into()])
        .await
        .unwrap();
    assert_eq!(built.spec.qualified_name, "tuplegen.generated.OrderItem");
    assert_eq!(
        built.spec.sql,
        "SELECT \"id\", \"sku\", \"qty\" FROM \"$$order_item\" WHERE qty > ?"
    );
    assert!(factory.load("OrderItemTuple").await.is_ok());

    let all = factory.define_table("$$order_item", None, &[]).await.unwrap();
    assert!(all.spec.params.is_empty());
    assert!(!all.spec.sql.contains("WHERE"));
}

#[tokio::test]
async fn test_define_update_leaves_data_untouched() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    let factory = t.factory();

    let built = factory
        .define_update(
            "Restock",
            "UPDATE item SET qty = qty + ? WHERE name = ?",
            &[5i64.into(), "bolt".into()],
        )
        .await
        .unwrap();
    assert!(built.success);
    assert_eq!(built.spec.kind, StatementKind::Update);
    assert_eq!(built.spec.params, vec![SemanticType::Long, SemanticType::Text]);

    let rows = t
        .db
        .query_rows("SELECT qty FROM item WHERE name = 'bolt'", &[])
        .await
        .unwrap();
    assert_eq!(rows, vec![vec![SqlValue::I64(10)]]);

    let source = std::fs::read_to_string(&built.source_path).unwrap();
    assert!(source.contains("pub async fn update_in(tx: &mut ::tuplegen::Transaction, p1: i64, p2: String)"));
}

#[tokio::test]
async fn test_rejected_update_is_not_generated() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    let factory = t.factory();

    assert!(factory
        .define_update("Bad", "UPDATE missing SET qty = ?", &[1i64.into()])
        .await
        .is_err());
    assert!(factory.existing_statement("Bad").await.unwrap().is_none());
}

#[tokio::test]
async fn test_statements_and_types_do_not_share_names() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    let factory = t.factory();

    factory
        .generate_from_columns("Thing", vec![ColumnDescriptor::declared("a", SemanticType::Int)])
        .await
        .unwrap();
    let err = factory
        .define_query("Thing", "SELECT id FROM item", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::InvalidName { .. }));

    factory.define_query("Ids", "SELECT id FROM item", &[]).await.unwrap();
    let err = factory
        .generate_from_columns("Ids", vec![ColumnDescriptor::declared("a", SemanticType::Int)])
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::InvalidName { .. }));
}

#[tokio::test]
async fn test_destroy_statement_keeps_row_type() {
    let t = TestDb::new().await;
    seed_items(&t, "item").await;
    let factory = t.factory();

    let built = factory.define_query("Ids", "SELECT id FROM item", &[]).await.unwrap();
    assert!(factory.destroy("Ids").await.unwrap());
    assert!(!built.source_path.exists());
    assert!(!built.manifest_path.exists());
    assert!(factory.existing_statement("Ids").await.unwrap().is_none());
    assert!(factory.existing_spec("IdsTuple").await.unwrap().is_some());
}
