//! Parsing of dbt `run_results.json`

use crate::error::WarehouseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

/// Outcome of a dbt node as reported in `run_results.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
    Skipped,
    Warn,
    Success,
    #[serde(rename = "runtime error")]
    RuntimeError,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Warn => "warn",
            Self::Success => "success",
            Self::RuntimeError => "runtime error",
        }
    }

    /// Statuses counted as failures by the alert
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Error)
    }
}

impl FromStr for TestStatus {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "error" => Ok(Self::Error),
            "skipped" => Ok(Self::Skipped),
            "warn" => Ok(Self::Warn),
            "success" => Ok(Self::Success),
            "runtime error" => Ok(Self::RuntimeError),
            other => Err(WarehouseError::Validation(format!(
                "unknown dbt status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `monitoring.dbt_test_results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbtTestResult {
    pub result_id: String,
    pub invocation_id: Option<String>,
    pub test_unique_id: Option<String>,
    pub test_name: Option<String>,
    pub test_type: Option<String>,
    pub model_name: Option<String>,
    pub column_name: Option<String>,
    pub status: TestStatus,
    pub execution_time: Option<f32>,
    pub failure_details: Option<String>,
    pub rows_affected: Option<i32>,
    pub run_timestamp: DateTime<Utc>,
}

impl DbtTestResult {
    /// Minimal row, mostly for tests and manual inserts
    pub fn new(result_id: impl Into<String>, status: TestStatus) -> Self {
        let result_id = result_id.into();
        Self {
            test_unique_id: Some(result_id.clone()),
            result_id,
            invocation_id: None,
            test_name: None,
            test_type: None,
            model_name: None,
            column_name: None,
            status,
            execution_time: None,
            failure_details: None,
            rows_affected: None,
            run_timestamp: Utc::now(),
        }
    }
}

/// Parse a `run_results.json` file
///
/// A missing or malformed file is logged and yields no results.
pub fn parse_run_results(path: &Path) -> Vec<DbtTestResult> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Results file not found: {} ({})", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(data) => parse_run_results_value(&data),
        Err(e) => {
            log::error!("Error decoding JSON from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Extract test rows from an already decoded `run_results.json`
///
/// Every node that errored, and every `test.` node regardless of outcome,
/// becomes a row.
pub fn parse_run_results_value(data: &Value) -> Vec<DbtTestResult> {
    let invocation_id = data
        .pointer("/metadata/invocation_id")
        .and_then(Value::as_str)
        .map(String::from);
    let run_timestamp = data
        .pointer("/metadata/generated_at")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let Some(results) = data.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|result| {
            let unique_id = result.get("unique_id").and_then(Value::as_str).unwrap_or("");
            let raw_status = result.get("status").and_then(Value::as_str).unwrap_or("");
            if raw_status != "error" && !unique_id.starts_with("test.") {
                return None;
            }
            if unique_id.is_empty() {
                log::warn!("Skipping result without unique_id (status {})", raw_status);
                return None;
            }
            let status = match raw_status.parse::<TestStatus>() {
                Ok(status) => status,
                Err(e) => {
                    log::warn!("Skipping {}: {}", unique_id, e);
                    return None;
                }
            };

            let parts: Vec<&str> = unique_id.split('.').collect();
            let test_name = (parts.len() > 1).then(|| parts[parts.len() - 2].to_string());
            let model_name = (parts.len() > 3).then(|| parts[parts.len() - 3].to_string());

            Some(DbtTestResult {
                result_id: unique_id.to_string(),
                invocation_id: invocation_id.clone(),
                test_unique_id: Some(unique_id.to_string()),
                test_name,
                test_type: result
                    .pointer("/adapter_response/test_type")
                    .and_then(Value::as_str)
                    .map(String::from),
                model_name,
                column_name: result
                    .get("column_name")
                    .and_then(Value::as_str)
                    .map(String::from),
                status,
                execution_time: result
                    .pointer("/timing/0/elapsed")
                    .and_then(Value::as_f64)
                    .map(|t| t as f32),
                failure_details: result
                    .get("message")
                    .and_then(Value::as_str)
                    .map(String::from),
                rows_affected: result
                    .get("failures")
                    .and_then(Value::as_i64)
                    .and_then(|n| i32::try_from(n).ok()),
                run_timestamp,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({
            "metadata": {
                "invocation_id": "inv-1",
                "generated_at": "2024-05-01T10:00:00.000000Z"
            },
            "results": [
                {
                    "unique_id": "test.shop.not_null_customers_id.abc123",
                    "status": "fail",
                    "timing": [{"name": "execute", "elapsed": 0.25}],
                    "message": "Got 2 results, configured to fail if != 0",
                    "failures": 2
                },
                {
                    "unique_id": "model.shop.customers",
                    "status": "success",
                    "timing": [],
                    "message": "SELECT 10"
                },
                {
                    "unique_id": "model.shop.orders",
                    "status": "error",
                    "timing": [],
                    "message": "relation does not exist"
                },
                {
                    "unique_id": "test.shop.unique_orders_id.def456",
                    "status": "pass",
                    "failures": 0
                }
            ]
        })
    }

    #[test]
    fn test_parse_names_and_filtering() {
        let results = parse_run_results_value(&sample());
        assert_eq!(results.len(), 3);

        let failed = &results[0];
        assert_eq!(failed.result_id, "test.shop.not_null_customers_id.abc123");
        assert_eq!(failed.test_name.as_deref(), Some("not_null_customers_id"));
        assert_eq!(failed.model_name.as_deref(), Some("shop"));
        assert_eq!(failed.status, TestStatus::Fail);
        assert_eq!(failed.execution_time, Some(0.25));
        assert_eq!(failed.rows_affected, Some(2));
        assert_eq!(failed.invocation_id.as_deref(), Some("inv-1"));
        assert_eq!(failed.run_timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let errored = &results[1];
        assert_eq!(errored.result_id, "model.shop.orders");
        assert_eq!(errored.status, TestStatus::Error);
        assert_eq!(errored.test_name.as_deref(), Some("shop"));
        assert_eq!(errored.model_name, None);
        assert_eq!(errored.execution_time, None);

        let passed = &results[2];
        assert_eq!(passed.test_name.as_deref(), Some("unique_orders_id"));
        assert_eq!(passed.model_name.as_deref(), Some("shop"));
        assert_eq!(passed.status, TestStatus::Pass);
        assert_eq!(passed.rows_affected, Some(0));
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = TempDir::new().unwrap();
        assert!(parse_run_results(&dir.path().join("run_results.json")).is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(parse_run_results(&bad).is_empty());
    }

    #[test]
    fn test_parse_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_results.json");
        std::fs::write(&path, sample().to_string()).unwrap();
        assert_eq!(parse_run_results(&path).len(), 3);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&TestStatus::RuntimeError).unwrap(),
            "\"runtime error\""
        );
        assert_eq!("FAIL".parse::<TestStatus>().unwrap(), TestStatus::Fail);
        assert!("exploded".parse::<TestStatus>().is_err());
    }
}
