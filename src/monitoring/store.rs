//! Persistence for dbt test results

use super::{DbtTestResult, TestStatus};
use crate::error::WarehouseError;
use async_trait::async_trait;
use eyre::{Result, eyre};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Storage for [`DbtTestResult`] rows keyed by `result_id`
#[async_trait]
pub trait TestResultStore: Send + Sync {
    /// Plain insert, a duplicate `result_id` is an error
    async fn insert(&self, result: &DbtTestResult) -> Result<()>;

    /// Insert or update every row in one transaction
    ///
    /// On conflict the status, execution time, failure details, affected rows
    /// and run timestamp are replaced.
    async fn upsert_all(&self, results: &[DbtTestResult]) -> Result<usize>;

    async fn get(&self, result_id: &str) -> Result<Option<DbtTestResult>>;

    /// Most recent `fail`/`error` rows first
    async fn failures(&self, limit: usize) -> Result<Vec<DbtTestResult>>;

    async fn count_by_status(&self) -> Result<BTreeMap<String, i64>>;
}

fn duplicate_key(result_id: &str) -> eyre::Report {
    WarehouseError::Database(format!(
        "duplicate key value violates unique constraint: result_id '{}' already exists",
        result_id
    ))
    .into()
}

/// Process-local store, mainly for tests and dry runs
#[derive(Default)]
pub struct InMemoryResultStore {
    rows: Mutex<HashMap<String, DbtTestResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, DbtTestResult>>> {
        self.rows
            .lock()
            .map_err(|_| eyre!("result store lock poisoned"))
    }
}

#[async_trait]
impl TestResultStore for InMemoryResultStore {
    async fn insert(&self, result: &DbtTestResult) -> Result<()> {
        let mut rows = self.rows()?;
        if rows.contains_key(&result.result_id) {
            return Err(duplicate_key(&result.result_id));
        }
        rows.insert(result.result_id.clone(), result.clone());
        Ok(())
    }

    async fn upsert_all(&self, results: &[DbtTestResult]) -> Result<usize> {
        let mut rows = self.rows()?;
        for result in results {
            match rows.get_mut(&result.result_id) {
                Some(existing) => {
                    existing.status = result.status;
                    existing.execution_time = result.execution_time;
                    existing.failure_details = result.failure_details.clone();
                    existing.rows_affected = result.rows_affected;
                    existing.run_timestamp = result.run_timestamp;
                }
                None => {
                    rows.insert(result.result_id.clone(), result.clone());
                }
            }
        }
        Ok(results.len())
    }

    async fn get(&self, result_id: &str) -> Result<Option<DbtTestResult>> {
        Ok(self.rows()?.get(result_id).cloned())
    }

    async fn failures(&self, limit: usize) -> Result<Vec<DbtTestResult>> {
        let mut failed: Vec<DbtTestResult> = self
            .rows()?
            .values()
            .filter(|r| r.status.is_failure())
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.run_timestamp.cmp(&a.run_timestamp));
        failed.truncate(limit);
        Ok(failed)
    }

    async fn count_by_status(&self) -> Result<BTreeMap<String, i64>> {
        let mut counts = BTreeMap::new();
        for row in self.rows()?.values() {
            *counts.entry(row.status.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// Collapse rows sharing a `result_id`, the last one wins
///
/// A single `ON CONFLICT DO UPDATE` statement cannot touch the same row twice.
fn dedupe_last(results: &[DbtTestResult]) -> Vec<&DbtTestResult> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&DbtTestResult> = Vec::with_capacity(results.len());
    for result in results {
        match position.get(result.result_id.as_str()) {
            Some(&i) => unique[i] = result,
            None => {
                position.insert(result.result_id.as_str(), unique.len());
                unique.push(result);
            }
        }
    }
    unique
}

const COLUMNS: &str = "result_id, invocation_id, test_unique_id, test_name, test_type, \
    model_name, column_name, status, execution_time, failure_details, rows_affected, run_timestamp";

/// Store backed by `monitoring.dbt_test_results`
pub struct PostgresResultStore {
    pool: PgPool,
}

impl PostgresResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the monitoring schema and table when missing
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in super::RESULTS_DDL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(WarehouseError::from)?;
        }
        Ok(())
    }

    fn push_values<'r>(
        builder: &mut QueryBuilder<'_, Postgres>,
        results: impl IntoIterator<Item = &'r DbtTestResult>,
    ) {
        builder.push_values(results, |mut row, r| {
            row.push_bind(r.result_id.clone())
                .push_bind(r.invocation_id.clone())
                .push_bind(r.test_unique_id.clone())
                .push_bind(r.test_name.clone())
                .push_bind(r.test_type.clone())
                .push_bind(r.model_name.clone())
                .push_bind(r.column_name.clone())
                .push_bind(r.status.as_str())
                .push_bind(r.execution_time)
                .push_bind(r.failure_details.clone())
                .push_bind(r.rows_affected)
                .push_bind(r.run_timestamp);
        });
    }

    fn from_row(row: &PgRow) -> Result<DbtTestResult> {
        let status: String = row.try_get("status").map_err(WarehouseError::from)?;
        Ok(DbtTestResult {
            result_id: row.try_get("result_id").map_err(WarehouseError::from)?,
            invocation_id: row.try_get("invocation_id").map_err(WarehouseError::from)?,
            test_unique_id: row.try_get("test_unique_id").map_err(WarehouseError::from)?,
            test_name: row.try_get("test_name").map_err(WarehouseError::from)?,
            test_type: row.try_get("test_type").map_err(WarehouseError::from)?,
            model_name: row.try_get("model_name").map_err(WarehouseError::from)?,
            column_name: row.try_get("column_name").map_err(WarehouseError::from)?,
            status: status.parse::<TestStatus>()?,
            execution_time: row.try_get("execution_time").map_err(WarehouseError::from)?,
            failure_details: row.try_get("failure_details").map_err(WarehouseError::from)?,
            rows_affected: row.try_get("rows_affected").map_err(WarehouseError::from)?,
            run_timestamp: row.try_get("run_timestamp").map_err(WarehouseError::from)?,
        })
    }
}

#[async_trait]
impl TestResultStore for PostgresResultStore {
    async fn insert(&self, result: &DbtTestResult) -> Result<()> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("INSERT INTO monitoring.dbt_test_results ({}) ", COLUMNS));
        Self::push_values(&mut builder, std::slice::from_ref(result));

        builder.build().execute(&self.pool).await.map_err(|e| {
            let unique = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if unique {
                duplicate_key(&result.result_id)
            } else {
                WarehouseError::from(e).into()
            }
        })?;
        Ok(())
    }

    async fn upsert_all(&self, results: &[DbtTestResult]) -> Result<usize> {
        if results.is_empty() {
            log::info!("No test results to log.");
            return Ok(0);
        }

        let unique = dedupe_last(results);
        let mut tx = self.pool.begin().await.map_err(WarehouseError::from)?;
        // keep each statement well under the bind parameter limit
        for chunk in unique.chunks(500) {
            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO monitoring.dbt_test_results ({}) ",
                COLUMNS
            ));
            Self::push_values(&mut builder, chunk.iter().copied());
            builder.push(
                " ON CONFLICT (result_id) DO UPDATE SET \
                 status = EXCLUDED.status, \
                 execution_time = EXCLUDED.execution_time, \
                 failure_details = EXCLUDED.failure_details, \
                 rows_affected = EXCLUDED.rows_affected, \
                 run_timestamp = EXCLUDED.run_timestamp",
            );
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(WarehouseError::from)?;
        }
        tx.commit().await.map_err(WarehouseError::from)?;

        log::info!("Successfully logged {} test results to the database.", results.len());
        Ok(results.len())
    }

    async fn get(&self, result_id: &str) -> Result<Option<DbtTestResult>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM monitoring.dbt_test_results WHERE result_id = $1",
            COLUMNS
        ))
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(WarehouseError::from)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn failures(&self, limit: usize) -> Result<Vec<DbtTestResult>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM monitoring.dbt_test_results \
             WHERE status IN ('fail', 'error') \
             ORDER BY run_timestamp DESC LIMIT $1",
            COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(WarehouseError::from)?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn count_by_status(&self) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM monitoring.dbt_test_results GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(WarehouseError::from)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let status: String = row.try_get("status").map_err(WarehouseError::from)?;
            let n: i64 = row.try_get("n").map_err(WarehouseError::from)?;
            counts.insert(status, n);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = InMemoryResultStore::new();
        let row = DbtTestResult::new("test.shop.not_null_id", TestStatus::Pass);

        store.insert(&row).await.unwrap();
        let err = store.insert(&row).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WarehouseError>(),
            Some(WarehouseError::Database(msg)) if msg.contains("duplicate key")
        ));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryResultStore::new();
        let mut row = DbtTestResult::new("test.shop.not_null_customers_id.x1", TestStatus::Fail);
        row.invocation_id = Some("inv".into());
        row.test_name = Some("not_null_customers_id".into());
        row.model_name = Some("shop".into());
        row.execution_time = Some(1.5);
        row.failure_details = Some("2 rows".into());
        row.rows_affected = Some(2);

        store.insert(&row).await.unwrap();
        assert_eq!(store.get(&row.result_id).await.unwrap(), Some(row));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_updates_mutable_columns() {
        let store = InMemoryResultStore::new();
        let mut row = DbtTestResult::new("test.a.b.c", TestStatus::Fail);
        row.test_name = Some("b".into());
        store.upsert_all(&[row.clone()]).await.unwrap();

        let mut rerun = row.clone();
        rerun.status = TestStatus::Pass;
        rerun.test_name = Some("ignored".into());
        rerun.rows_affected = Some(0);
        store.upsert_all(&[rerun]).await.unwrap();

        let stored = store.get("test.a.b.c").await.unwrap().unwrap();
        assert_eq!(stored.status, TestStatus::Pass);
        assert_eq!(stored.rows_affected, Some(0));
        // identity columns keep their first value
        assert_eq!(stored.test_name.as_deref(), Some("b"));
    }

    #[test]
    fn test_dedupe_keeps_last_row_in_first_position() {
        let first = DbtTestResult::new("test.a.b.c", TestStatus::Fail);
        let other = DbtTestResult::new("test.a.d.e", TestStatus::Pass);
        let mut rerun = first.clone();
        rerun.status = TestStatus::Pass;
        rerun.rows_affected = Some(0);

        let rows = [first, other, rerun];
        let unique = dedupe_last(&rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].result_id, "test.a.b.c");
        assert_eq!(unique[0].status, TestStatus::Pass);
        assert_eq!(unique[0].rows_affected, Some(0));
        assert_eq!(unique[1].result_id, "test.a.d.e");
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_one_batch_last_wins() {
        let store = InMemoryResultStore::new();
        let first = DbtTestResult::new("test.a.b.c", TestStatus::Fail);
        let mut second = first.clone();
        second.status = TestStatus::Pass;
        store.upsert_all(&[first, second]).await.unwrap();

        let stored = store.get("test.a.b.c").await.unwrap().unwrap();
        assert_eq!(stored.status, TestStatus::Pass);
        assert_eq!(store.count_by_status().await.unwrap().values().sum::<i64>(), 1);
    }

    #[tokio::test]
    async fn test_failures_and_counts() {
        let store = InMemoryResultStore::new();
        let mut old = DbtTestResult::new("test.a.old.1", TestStatus::Error);
        old.run_timestamp = Utc::now() - Duration::hours(1);
        let new = DbtTestResult::new("test.a.new.1", TestStatus::Fail);
        let ok = DbtTestResult::new("test.a.ok.1", TestStatus::Pass);
        store.upsert_all(&[old, new, ok]).await.unwrap();

        let failures = store.failures(10).await.unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].result_id, "test.a.new.1");
        assert_eq!(store.failures(1).await.unwrap().len(), 1);

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.get("fail"), Some(&1));
        assert_eq!(counts.get("error"), Some(&1));
        assert_eq!(counts.get("pass"), Some(&1));
    }
}
