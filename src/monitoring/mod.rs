//! dbt test result monitoring
//!
//! `run_results.json` artifacts are parsed into [`DbtTestResult`] rows, stored in
//! `monitoring.dbt_test_results` and summarized into a single alert line.

mod alert;
mod results;
mod store;

#[cfg(test)]
pub(crate) use alert::capture;
pub use alert::{ALERT_TARGET, FailureSummary, alert_on_failures};
pub use results::{DbtTestResult, TestStatus, parse_run_results, parse_run_results_value};
pub use store::{InMemoryResultStore, PostgresResultStore, TestResultStore};

/// DDL for the monitoring table and its indexes
pub const RESULTS_DDL: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS monitoring",
    r#"CREATE TABLE IF NOT EXISTS monitoring.dbt_test_results (
    result_id VARCHAR PRIMARY KEY,
    invocation_id VARCHAR,
    test_unique_id VARCHAR,
    test_name VARCHAR,
    test_type VARCHAR,
    model_name VARCHAR,
    column_name VARCHAR,
    status VARCHAR NOT NULL,
    execution_time REAL,
    failure_details TEXT,
    rows_affected INTEGER,
    run_timestamp TIMESTAMP WITH TIME ZONE NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_dbt_test_results_status ON monitoring.dbt_test_results (status)",
    "CREATE INDEX IF NOT EXISTS idx_dbt_test_results_model_name ON monitoring.dbt_test_results (model_name)",
    "CREATE INDEX IF NOT EXISTS idx_dbt_test_results_run_timestamp ON monitoring.dbt_test_results (run_timestamp)",
];
