mod common;

use std::collections::BTreeSet;

use serde_json::{Value, json};
use sqlx::{
    Row, Sqlite, SqlitePool, migrate::MigrateDatabase, sqlite::SqlitePoolOptions,
};
use submission_transfer::{
    item::{
        csv::write_rows,
        rdbc::{InMemoryRecordStore, RecordStore, SqliteRecordStore},
    },
    record::{ChildItem, ChildTable},
    transfer::{ChildFailurePolicy, RecordExporterBuilder, RecordImporterBuilder},
};
use tempfile::NamedTempFile;

use common::{headers, init_logger, sample_actions, sample_errors, sample_fields, submission_row};

async fn file_pool(file: &NamedTempFile) -> Result<SqlitePool, sqlx::Error> {
    let database_path = file.path().to_str().unwrap();
    let connection_uri = format!("sqlite://{}", database_path);

    if !Sqlite::database_exists(&connection_uri)
        .await
        .unwrap_or(false)
    {
        Sqlite::create_database(&connection_uri).await?;
    }

    SqlitePool::connect(&connection_uri).await
}

async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

fn as_set(items: &[ChildItem]) -> BTreeSet<String> {
    items
        .iter()
        .map(|item| Value::Object(item.clone()).to_string())
        .collect()
}

fn source_csv() -> Vec<u8> {
    let rows = vec![
        submission_row("3", &sample_fields(), &sample_actions(), &sample_errors()),
        submission_row("3", &json!([]), &json!([]), &json!([])),
        submission_row("5", &sample_fields(), &json!([]), &json!([])),
        submission_row("7", &json!([]), &sample_actions(), &json!([])),
    ];
    write_rows(Vec::new(), &headers(), &rows).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn csv_should_round_trip_through_sqlite() -> Result<(), sqlx::Error> {
    init_logger();
    let database_file = NamedTempFile::new()?;
    let pool = file_pool(&database_file).await?;

    let store = SqliteRecordStore::new(&pool);
    store.create_schema().unwrap();

    let report = RecordImporterBuilder::new(&store)
        .build()
        .import_csv(source_csv().as_slice())
        .unwrap();
    assert!(report.is_complete_success());
    assert_eq!(report.record_ids, vec![1, 2, 3, 4]);

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM records_fields")
        .fetch_one(&pool)
        .await?
        .get("n");
    assert_eq!(count, 6);

    let exported = RecordExporterBuilder::new(&store)
        .build()
        .export_to_vec(&[3, 5])
        .unwrap();

    // Re-import into a second database; the rows must come back the same.
    let second_pool = memory_pool().await;
    let second = SqliteRecordStore::new(&second_pool);
    second.create_schema().unwrap();
    let report = RecordImporterBuilder::new(&second)
        .build()
        .import_csv(exported.as_slice())
        .unwrap();
    assert_eq!(report.imported_count(), 3);

    let before = store.fetch_aggregated(&[3, 5]).unwrap();
    let after = second.fetch_aggregated(&[3, 5]).unwrap();
    assert_eq!(before.len(), 3);
    for (left, right) in before.iter().zip(after.iter()) {
        assert_eq!(left.scalars, right.scalars);
        for table in ChildTable::ALL {
            assert_eq!(as_set(left.child(table)), as_set(right.child(table)));
        }
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sqlite_and_memory_stores_should_aggregate_alike() {
    let pool = memory_pool().await;
    let sqlite = SqliteRecordStore::new(&pool);
    sqlite.create_schema().unwrap();
    let memory = InMemoryRecordStore::new();

    for store in [&sqlite as &dyn RecordStore, &memory] {
        RecordImporterBuilder::new(store)
            .build()
            .import_csv(source_csv().as_slice())
            .unwrap();
    }

    let from_sqlite = sqlite.fetch_aggregated(&[3, 7]).unwrap();
    let from_memory = memory.fetch_aggregated(&[3, 7]).unwrap();

    assert_eq!(from_sqlite.len(), 3);
    assert_eq!(from_sqlite.len(), from_memory.len());
    for (left, right) in from_sqlite.iter().zip(from_memory.iter()) {
        assert_eq!(left.id, right.id);
        assert_eq!(left.scalars, right.scalars);
        for table in ChildTable::ALL {
            assert_eq!(as_set(left.child(table)), as_set(right.child(table)));
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_child_insert_should_leave_no_parent_row() {
    let pool = memory_pool().await;
    let store = SqliteRecordStore::new(&pool);
    store.create_schema().unwrap();
    sqlx::query("DROP TABLE records_actions")
        .execute(&pool)
        .await
        .unwrap();

    let report = RecordImporterBuilder::new(&store)
        .build()
        .import_csv(source_csv().as_slice())
        .unwrap();

    assert_eq!(report.imported_count(), 2);
    assert_eq!(report.step.failures.len(), 2);
    assert_eq!(
        report.step.failures.iter().map(|f| f.position).collect::<Vec<_>>(),
        vec![1, 4]
    );

    let parents: i64 = sqlx::query("SELECT COUNT(*) AS n FROM records")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    let fields: i64 = sqlx::query("SELECT COUNT(*) AS n FROM records_fields")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(parents, 2);
    assert_eq!(fields, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn skip_policy_should_keep_parent_when_children_fail() {
    let pool = memory_pool().await;
    let store = SqliteRecordStore::new(&pool);
    store.create_schema().unwrap();
    sqlx::query("DROP TABLE records_errors")
        .execute(&pool)
        .await
        .unwrap();

    let report = RecordImporterBuilder::new(&store)
        .child_failure(ChildFailurePolicy::Skip)
        .build()
        .import_csv(source_csv().as_slice())
        .unwrap();

    assert!(report.is_complete_success());
    assert_eq!(report.imported_count(), 4);
}
