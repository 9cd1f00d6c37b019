//! Integration tests for dbt test result monitoring
//!
//! The in-memory store covers the parse/upsert/alert flow. The PostgreSQL
//! tests need a live database (`DATABASE_URL`) and are ignored by default.

use data_warehouse::cli::monitor::record_results;
use data_warehouse::config::PostgresSettings;
use data_warehouse::monitoring::{
    InMemoryResultStore, PostgresResultStore, TestResultStore, TestStatus, alert_on_failures,
    parse_run_results,
};
use data_warehouse::storage;
use eyre::Result;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn write_run_results(dir: &Path, invocation: &str, unique_status: &str) -> Result<std::path::PathBuf> {
    let path = dir.join("run_results.json");
    let data = json!({
        "metadata": {
            "invocation_id": invocation,
            "generated_at": "2024-06-01T08:30:00.000000Z"
        },
        "results": [
            {
                "unique_id": "test.shop.not_null_orders_id.a1b2",
                "status": "pass",
                "timing": [{"name": "execute", "elapsed": 0.12}],
                "failures": 0
            },
            {
                "unique_id": "test.shop.unique_customers_id.c3d4",
                "status": unique_status,
                "message": "Got 2 results, configured to fail if != 0",
                "failures": 2
            },
            {
                "unique_id": "model.shop.orders",
                "status": "success"
            },
            {
                "unique_id": "model.shop.customers",
                "status": "error",
                "message": "relation \"raw.customers\" does not exist"
            }
        ]
    });
    std::fs::write(&path, serde_json::to_string_pretty(&data)?)?;
    Ok(path)
}

#[tokio::test]
async fn test_results_flow_through_store_and_alert() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_run_results(temp_dir.path(), "inv-1", "fail")?;

    let results = parse_run_results(&path);
    assert_eq!(results.len(), 3, "successful models are not recorded");

    let store = InMemoryResultStore::new();
    let summary = record_results(&store, &results).await?;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 2);

    let unique = store
        .get("test.shop.unique_customers_id.c3d4")
        .await?
        .expect("row stored");
    assert_eq!(unique.status, TestStatus::Fail);
    assert_eq!(unique.test_name.as_deref(), Some("unique_customers_id"));
    assert_eq!(unique.rows_affected, Some(2));
    assert_eq!(unique.invocation_id.as_deref(), Some("inv-1"));

    let failures = store.failures(10).await?;
    assert_eq!(failures.len(), 2);

    let counts = store.count_by_status().await?;
    assert_eq!(counts.get("pass"), Some(&1));
    assert_eq!(counts.get("fail"), Some(&1));
    assert_eq!(counts.get("error"), Some(&1));
    Ok(())
}

#[tokio::test]
async fn test_rerun_updates_existing_rows() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = InMemoryResultStore::new();

    let first = parse_run_results(&write_run_results(temp_dir.path(), "inv-1", "fail")?);
    record_results(&store, &first).await?;

    let second = parse_run_results(&write_run_results(temp_dir.path(), "inv-2", "pass")?);
    let summary = record_results(&store, &second).await?;
    assert_eq!(summary.failed, 1, "only the model error remains");

    let unique = store
        .get("test.shop.unique_customers_id.c3d4")
        .await?
        .expect("row stored");
    assert_eq!(unique.status, TestStatus::Pass);
    assert_eq!(
        unique.invocation_id.as_deref(),
        Some("inv-1"),
        "invocation id is not part of the upsert"
    );
    assert_eq!(store.count_by_status().await?.values().sum::<i64>(), 3);
    Ok(())
}

#[test]
fn test_missing_results_file_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let results = parse_run_results(&temp_dir.path().join("run_results.json"));
    assert!(results.is_empty());

    let summary = alert_on_failures(&results);
    assert!(!summary.has_failures());
    assert_eq!(summary.message(), "All DBT tests passed or were skipped.");
}

fn live_settings() -> Option<PostgresSettings> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(PostgresSettings {
        host: "localhost".to_string(),
        port: 5432,
        user: "postgres".to_string(),
        password: String::new(),
        database: "data_warehouse".to_string(),
        url: Some(url),
    })
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL (DATABASE_URL)"]
async fn test_postgres_store_upsert() -> Result<()> {
    let Some(settings) = live_settings() else {
        return Ok(());
    };
    let pool = storage::connect(&settings).await?;
    storage::initialize_postgres(&pool).await?;
    let store = PostgresResultStore::new(pool);

    let temp_dir = TempDir::new()?;
    let results = parse_run_results(&write_run_results(temp_dir.path(), "live-1", "fail")?);
    store.upsert_all(&results).await?;
    store.upsert_all(&results).await?;

    let row = store
        .get("test.shop.unique_customers_id.c3d4")
        .await?
        .expect("row stored");
    assert_eq!(row.status, TestStatus::Fail);
    assert!(store.insert(&row).await.is_err(), "duplicate result_id");
    Ok(())
}
