//! Compiled record types and statements, called the way an application would.

use tempfile::TempDir;
use tuplegen::chrono::{NaiveDate, NaiveDateTime};
use tuplegen::record::Tuple;
use tuplegen::{Config, ConnectionManager, SemanticType, SqlValue, TupleGenError, TypeFactory};
use tuplegen_generated_tests::{conv_v1, conv_v2, items, specs};

fn when() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 29)
        .unwrap()
        .and_hms_opt(13, 5, 0)
        .unwrap()
}

/// One instance of the version 1 shape, as either generated struct.
macro_rules! conv_v1_sample {
    ($($ty:ident)::+) => {
        $($ty)::+ {
            flag_long: Some(true),
            flag_int: Some(false),
            small_long: Some(-7),
            small_float: Some(3),
            big_float: Some(1 << 40),
            narrow: Some(1234),
            bool_text: Some(true),
            int_text: Some(42),
            long_text: Some(5_000_000_000),
            float_text: Some(2.5),
            when_text: Some(when()),
            body: Some("héllo".to_string()),
            same: Some("kept".to_string()),
            gone: Some(9),
            old_name: Some(11),
        }
    };
}

#[test]
fn test_reconcile_from_applies_every_conversion() {
    let next = conv_v2::Conv::reconcile_from(&conv_v1_sample!(conv_v2::v1::Conv)).unwrap();

    assert_eq!(next.flag_long, Some(1i64));
    assert_eq!(next.flag_int, Some(0i32));
    assert_eq!(next.small_long, Some(-7i64));
    assert_eq!(next.small_float, Some(3.0));
    assert_eq!(next.big_float, Some(1_099_511_627_776.0));
    assert_eq!(next.narrow, Some(1234i32));
    assert_eq!(next.bool_text.as_deref(), Some("true"));
    assert_eq!(next.int_text.as_deref(), Some("42"));
    assert_eq!(next.long_text.as_deref(), Some("5000000000"));
    assert_eq!(next.float_text.as_deref(), Some("2.5"));
    assert_eq!(next.when_text.as_deref(), Some("2024-02-29 13:05:00"));
    assert_eq!(next.body, Some("héllo".as_bytes().to_vec()));
    assert_eq!(next.same.as_deref(), Some("kept"));
    assert_eq!(next.new_name, Some(11));
    assert_eq!(next.extra, Some(0));

    let names: Vec<&str> = conv_v2::Conv::COLUMNS.iter().map(|(name, _)| *name).collect();
    assert!(!names.contains(&"gone"));
    assert_eq!(names.last(), Some(&"extra"));
    assert_eq!(conv_v2::Conv::VERSION, 2);
}

#[test]
fn test_reconcile_from_keeps_nulls() {
    let next = conv_v2::Conv::reconcile_from(&conv_v2::v1::Conv::default()).unwrap();
    assert_eq!(next.narrow, None);
    assert_eq!(next.when_text, None);
    assert_eq!(next.body, None);
    // Added columns start at their zero value.
    assert_eq!(next.extra, Some(0));
}

#[test]
fn test_reconcile_from_rejects_out_of_range_narrowing() {
    let prev = conv_v2::v1::Conv {
        narrow: Some(i64::from(i32::MAX) + 1),
        ..Default::default()
    };
    let err = conv_v2::Conv::reconcile_from(&prev).unwrap_err();
    assert!(matches!(err, TupleGenError::Record { .. }));
    assert!(err.to_string().contains("narrow is out of range for int"));
}

#[test]
fn test_values_in_column_order() {
    let conv = conv_v1_sample!(conv_v1::Conv);
    let values = conv.clone().into_values();

    assert_eq!(values.len(), conv_v1::Conv::COLUMNS.len());
    assert_eq!(values[0], SqlValue::Bool(true));
    assert_eq!(values[5], SqlValue::I64(1234));
    assert_eq!(values[10], SqlValue::DateTime(when()));
    for (value, (_, kind)) in values.iter().zip(conv_v1::Conv::COLUMNS) {
        assert_eq!(value.semantic_type(), *kind);
    }
    assert_eq!(conv_v1::Conv::from_values(values).unwrap(), conv);
}

#[test]
fn test_from_values_converts_and_checks() {
    let mut values = conv_v1::Conv::default().into_values();
    assert!(values.iter().all(SqlValue::is_null));
    assert_eq!(values[2], SqlValue::Null(SemanticType::Int));

    // A driver may hand back a 64-bit integer for an int column.
    values[2] = SqlValue::I64(-7);
    let conv = conv_v1::Conv::from_values(values.clone()).unwrap();
    assert_eq!(conv.small_long, Some(-7));

    values[2] = SqlValue::from("seven");
    assert!(conv_v1::Conv::from_values(values.clone()).is_err());

    values.pop();
    let err = conv_v1::Conv::from_values(values).unwrap_err();
    assert!(err.to_string().contains("expected 15 values, got 14"));
}

#[test]
fn test_display_lists_columns() {
    let conv = conv_v1::Conv {
        int_text: Some(42),
        same: Some("kept".to_string()),
        ..Default::default()
    };
    let shown = conv.to_string();
    assert!(shown.starts_with("Conv {flag_long = null, flag_int = null"));
    assert!(shown.contains("int_text = 42"));
    assert!(shown.ends_with("same = kept, gone = null, old_name = null}"));
}

async fn factory(dir: &TempDir) -> TypeFactory {
    let config = Config::sqlite(dir.path().join("app.db")).with_code_dir(dir.path().join("code"));
    let db = ConnectionManager::connect(&config.database).await.unwrap();
    TypeFactory::new(db, &config.codegen)
}

#[tokio::test]
async fn test_compiled_and_loaded_reconciliation_agree() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(&dir).await;

    let v1 = factory.generate_from_spec(specs::conv_v1().unwrap()).await.unwrap();
    let v1_type = factory.load(specs::CONV).await.unwrap();
    let record = v1_type.record_from(conv_v1_sample!(conv_v1::Conv)).unwrap();

    factory
        .generate_from_spec(specs::conv_v2(&v1.spec).unwrap())
        .await
        .unwrap();
    let v2_type = factory.load(specs::CONV).await.unwrap();
    assert_eq!(v2_type.version(), 2);

    let loaded: conv_v2::Conv = v2_type.reconcile(&record).unwrap().into_tuple().unwrap();
    let compiled = conv_v2::Conv::reconcile_from(&conv_v1_sample!(conv_v2::v1::Conv)).unwrap();
    assert_eq!(loaded, compiled);

    // The version 1 struct does not fit the version 2 handle.
    assert!(v2_type.record_from(conv_v1::Conv::default()).is_err());
}

async fn item_db(dir: &TempDir) -> ConnectionManager {
    let config = Config::sqlite(dir.path().join("items.db"));
    let db = ConnectionManager::connect(&config.database).await.unwrap();
    db.execute(specs::ITEM_TABLE, &[]).await.unwrap();
    db
}

fn item(id: i64, name: &str, qty: i64) -> items::ItemRow {
    items::ItemRow {
        id: Some(id),
        name: Some(name.to_string()),
        qty: Some(qty),
    }
}

async fn stocked(db: &ConnectionManager, at_least: i64) -> Vec<items::ItemRow> {
    let mut rows = Vec::new();
    items::Items::query(db, at_least, |row: items::ItemRow| {
        rows.push(row);
        Ok(())
    })
    .await
    .unwrap();
    rows
}

#[tokio::test]
async fn test_generated_query_and_keyed_writes() {
    let dir = tempfile::tempdir().unwrap();
    let db = item_db(&dir).await;

    let mut tx = db.begin().await.unwrap();
    for row in [item(1, "bolt", 10), item(2, "nut", 0), item(3, "washer", 7)] {
        assert_eq!(items::Items::insert(&mut tx, row).await.unwrap(), 1);
    }
    tx.commit().await.unwrap();

    assert_eq!(stocked(&db, 1).await, vec![item(1, "bolt", 10), item(3, "washer", 7)]);
    assert_eq!(stocked(&db, 0).await.len(), 3);

    let mut tx = db.begin().await.unwrap();
    let mut seen = Vec::new();
    let count = items::Items::query_in(&mut tx, 0, |row: items::ItemRow| {
        seen.push(row);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(count, 3);

    let mut bolt = seen.remove(0);
    bolt.qty = Some(4);
    assert_eq!(items::Items::update(&mut tx, bolt).await.unwrap(), 1);
    assert_eq!(items::Items::delete(&mut tx, seen.remove(0)).await.unwrap(), 1);
    tx.commit().await.unwrap();

    assert_eq!(stocked(&db, 0).await, vec![item(1, "bolt", 4), item(3, "washer", 7)]);
}

#[tokio::test]
async fn test_generated_update_binds_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let db = item_db(&dir).await;
    db.execute(
        "INSERT INTO item (id, name, qty) VALUES (?, ?, ?)",
        &[1i64.into(), "bolt".into(), 10i64.into()],
    )
    .await
    .unwrap();

    assert_eq!(items::Restock::update(&db, 5, "bolt".to_string()).await.unwrap(), 1);
    assert_eq!(items::Restock::update(&db, 5, "gear".to_string()).await.unwrap(), 0);
    assert_eq!(stocked(&db, 0).await, vec![item(1, "bolt", 15)]);

    let mut tx = db.begin().await.unwrap();
    assert_eq!(
        items::Restock::update_in(&mut tx, 100, "bolt".to_string())
            .await
            .unwrap(),
        1
    );
    tx.rollback().await.unwrap();
    assert_eq!(stocked(&db, 0).await, vec![item(1, "bolt", 15)]);
}

#[tokio::test]
async fn test_rows_must_fit_the_statement_shape() {
    let dir = tempfile::tempdir().unwrap();
    let db = item_db(&dir).await;

    let err = items::Items::query(&db, 0, |_: conv_v1::Conv| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::Record { .. }));

    let mut tx = db.begin().await.unwrap();
    let err = items::Items::insert(&mut tx, conv_v1::Conv::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TupleGenError::Record { .. }));
    tx.rollback().await.unwrap();
}
