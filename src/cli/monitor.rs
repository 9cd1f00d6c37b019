//! `dw monitor` helpers

use super::storage::storage_status;
use crate::config::{PostgresSettings, Settings};
use crate::error::WarehouseError;
use crate::monitoring::{
    DbtTestResult, FailureSummary, PostgresResultStore, TestResultStore, alert_on_failures,
    parse_run_results,
};
use crate::orchestration::run_results_path;
use crate::storage;
use crate::workflow::{ExecutionEvent, WorkflowStatus, read_history};
use clap::ValueEnum;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum JobStatusFilter {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[default]
    All,
}

impl JobStatusFilter {
    pub fn status(&self) -> Option<WorkflowStatus> {
        match self {
            Self::Pending => Some(WorkflowStatus::Pending),
            Self::Running => Some(WorkflowStatus::Running),
            Self::Completed => Some(WorkflowStatus::Completed),
            Self::Failed => Some(WorkflowStatus::Failed),
            Self::Cancelled => Some(WorkflowStatus::Cancelled),
            Self::All => None,
        }
    }
}

/// Storage plus the on-disk pieces the toolkit depends on
pub async fn system_status(settings: &Settings) -> bool {
    println!("Checking data warehouse system status...\n");
    let storage = storage_status(settings).await;

    println!("\nProject Layout:");
    let layout = [
        ("Data directory", &settings.data_dir),
        ("dbt project", &settings.dbt_project_dir),
        ("Dagster home", &settings.dagster_home),
        ("Workflows", &settings.workflows_dir),
    ];
    let mut healthy = storage.all_healthy();
    for (label, path) in layout {
        if path.exists() {
            println!("{} {}: {}", "✅".green(), label, path.display().bright_black());
        } else {
            healthy = false;
            println!("{} {}: missing {}", "⚠️".yellow(), label, path.display().bright_black());
        }
    }
    println!("\nFor more detailed component status, use: dw storage status");
    healthy
}

/// Pick the `run_results.json` to read
///
/// An explicit path wins, then `<target_dir>/run_results.json`, then the
/// configured dbt project's target directory.
pub fn resolve_results_path(
    settings: &Settings,
    results_path: Option<PathBuf>,
    target_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = results_path {
        if !path.exists() {
            return Err(WarehouseError::Configuration(format!(
                "Results file does not exist: {}",
                path.display()
            ))
            .into());
        }
        return Ok(path);
    }
    if let Some(dir) = target_dir {
        let path = dir.join("run_results.json");
        if !path.exists() {
            return Err(WarehouseError::Configuration(format!(
                "Could not find run_results.json in target directory: {}",
                dir.display()
            ))
            .into());
        }
        return Ok(path);
    }
    Ok(run_results_path(&settings.dbt_project_dir))
}

/// Upsert parsed rows and emit the alert line
///
/// The alert is emitted even when the upsert fails; the store error is
/// returned afterwards.
pub async fn record_results(
    store: &dyn TestResultStore,
    results: &[DbtTestResult],
) -> Result<FailureSummary> {
    log::info!("Logging {} result(s) to database...", results.len());
    let stored = store.upsert_all(results).await;
    if let Err(e) = &stored {
        log::error!("Failed to log test results to the database: {:#}", e);
    }
    let summary = alert_on_failures(results);
    stored?;
    Ok(summary)
}

fn postgres_settings(settings: &Settings, db_url: Option<String>) -> PostgresSettings {
    let mut postgres = settings.postgres.clone();
    if db_url.is_some() {
        postgres.url = db_url;
    }
    postgres
}

/// Parse dbt results, store them in `monitoring.dbt_test_results` and alert
pub async fn log_dbt_results(
    settings: &Settings,
    results_path: Option<PathBuf>,
    target_dir: Option<PathBuf>,
    db_url: Option<String>,
) -> Result<FailureSummary> {
    let path = resolve_results_path(settings, results_path, target_dir)?;
    log::info!("Parsing results from: {}", path.display());
    let results = parse_run_results(&path);

    let pool = match storage::connect(&postgres_settings(settings, db_url)).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to connect to the monitoring database: {:#}", e);
            alert_on_failures(&results);
            return Err(e);
        }
    };
    let store = PostgresResultStore::new(pool);
    if let Err(e) = store.ensure_schema().await {
        log::warn!("Could not ensure monitoring schema exists: {:#}", e);
    }
    record_results(&store, &results).await
}

pub async fn show_failures(settings: &Settings, limit: usize) -> Result<Vec<DbtTestResult>> {
    let pool = storage::connect(&settings.postgres).await?;
    let failures = PostgresResultStore::new(pool).failures(limit).await?;

    if failures.is_empty() {
        println!("{}", "No failing dbt tests recorded".green());
    }
    for result in &failures {
        println!(
            "{} {} {} {}",
            result.run_timestamp.format("%Y-%m-%d %H:%M:%S").bright_black(),
            result.status.as_str().red(),
            result.test_name.as_deref().unwrap_or(&result.result_id),
            result
                .model_name
                .as_deref()
                .map(|m| format!("({})", m))
                .unwrap_or_default()
                .cyan()
        );
        if let Some(details) = &result.failure_details {
            println!("    {}", details.bright_black());
        }
    }
    Ok(failures)
}

pub fn list_jobs(settings: &Settings, filter: JobStatusFilter, limit: usize) -> Result<Vec<ExecutionEvent>> {
    let path = settings.workflow_runs_path();
    let events = read_history(&path, filter.status(), limit)?;

    if events.is_empty() {
        println!("No workflow runs recorded in {}", path.display());
    }
    for event in &events {
        let status = match event.status {
            WorkflowStatus::Completed => event.status.as_str().green().to_string(),
            WorkflowStatus::Failed => event.status.as_str().red().to_string(),
            WorkflowStatus::Cancelled => event.status.as_str().yellow().to_string(),
            _ => event.status.as_str().cyan().to_string(),
        };
        let detail = event
            .metadata
            .get("error")
            .or_else(|| event.metadata.get("loaded"))
            .map(|v| v.to_string())
            .unwrap_or_default();
        println!(
            "{} {:<32} {:<10} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S").bright_black(),
            event.workflow_id,
            status,
            detail
        );
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{InMemoryResultStore, TestStatus, capture::capture};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn settings(root: &std::path::Path) -> Settings {
        let map = HashMap::from([("DATA_WAREHOUSE_ROOT", root.display().to_string())]);
        Settings::from_lookup(|k| map.get(k).cloned()).unwrap()
    }

    #[test]
    fn test_resolve_results_path() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());

        assert_eq!(
            resolve_results_path(&settings, None, None).unwrap(),
            dir.path().join("dbt/target/run_results.json")
        );
        let explicit = dir.path().join("a.json");
        std::fs::write(&explicit, "{}").unwrap();
        assert_eq!(
            resolve_results_path(&settings, Some(explicit.clone()), Some("/nope".into())).unwrap(),
            explicit
        );

        let err = resolve_results_path(&settings, None, Some(dir.path().to_path_buf())).unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 2);

        std::fs::write(dir.path().join("run_results.json"), "{}").unwrap();
        assert!(resolve_results_path(&settings, None, Some(dir.path().to_path_buf())).is_ok());
    }

    // serial with the alert capture tests, this emits an alert line
    #[tokio::test]
    #[serial_test::serial]
    async fn test_record_results_upserts_and_summarizes() {
        let store = InMemoryResultStore::new();
        let results = vec![
            DbtTestResult::new("test.shop.a.1", TestStatus::Pass),
            DbtTestResult::new("test.shop.b.2", TestStatus::Fail),
        ];
        let summary = record_results(&store, &results).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);

        // second run of the same invocation updates in place
        let summary = record_results(&store, &results).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(store.count_by_status().await.unwrap()["fail"], 1);
    }

    #[test]
    fn test_missing_explicit_results_path() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let err = resolve_results_path(&settings, Some(dir.path().join("absent.json")), None)
            .unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 2);
        assert!(err.to_string().contains("absent.json"));
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl TestResultStore for BrokenStore {
        async fn insert(&self, _: &DbtTestResult) -> Result<()> {
            Err(WarehouseError::Database("connection reset".into()).into())
        }

        async fn upsert_all(&self, _: &[DbtTestResult]) -> Result<usize> {
            Err(WarehouseError::Database("connection reset".into()).into())
        }

        async fn get(&self, _: &str) -> Result<Option<DbtTestResult>> {
            Ok(None)
        }

        async fn failures(&self, _: usize) -> Result<Vec<DbtTestResult>> {
            Ok(Vec::new())
        }

        async fn count_by_status(&self) -> Result<std::collections::BTreeMap<String, i64>> {
            Ok(Default::default())
        }
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_alert_survives_failed_upsert() {
        let logger = capture();
        let results = vec![DbtTestResult::new("test.shop.b.2", TestStatus::Fail)];

        let err = record_results(&BrokenStore, &results).await.unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 4);

        let critical = logger.critical();
        assert_eq!(critical.len(), 1);
        assert!(critical[0].1.contains("1 DBT tests failed or errored"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_alert_survives_unreachable_database() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let path = dir.path().join("run_results.json");
        std::fs::write(
            &path,
            r#"{"metadata": {"invocation_id": "inv-9"},
                "results": [{"unique_id": "test.shop.unique_id.x1", "status": "fail"}]}"#,
        )
        .unwrap();

        let logger = capture();
        let outcome = log_dbt_results(
            &settings,
            Some(path),
            None,
            Some("postgresql://u:p@127.0.0.1:1/x".into()),
        )
        .await;
        assert!(outcome.is_err());

        let critical = logger.critical();
        assert_eq!(critical.len(), 1);
        assert!(critical[0].1.contains("1 DBT tests failed or errored"));
    }

    #[test]
    fn test_db_url_override() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let pg = postgres_settings(&settings, Some("postgresql://u:p@db/mon".into()));
        assert_eq!(pg.connection_url(), "postgresql://u:p@db/mon");
        assert_eq!(
            postgres_settings(&settings, None).connection_url(),
            settings.postgres.connection_url()
        );
    }
}
