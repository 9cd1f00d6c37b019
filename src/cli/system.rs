//! `dw version`, `dw info` and `dw doctor`

use crate::config::Settings;
use owo_colors::OwoColorize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Variables `doctor` expects to be set explicitly
pub const REQUIRED_VARIABLES: &[&str] = &[
    "POSTGRES_HOST",
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "MINIO_ACCESS_KEY",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub missing_variables: Vec<&'static str>,
    pub data_dir_exists: bool,
}

impl DoctorReport {
    pub fn healthy(&self) -> bool {
        self.missing_variables.is_empty() && self.data_dir_exists
    }
}

pub fn version(settings: &Settings) {
    println!("Data Warehouse version: {}", VERSION);
    println!("Environment: {}", settings.environment);
}

pub fn info(settings: &Settings) {
    println!("{}", "Data Warehouse Configuration:".bold());
    println!("Environment: {}", settings.environment);
    println!("Data Directory: {}", settings.data_dir.display());
    println!("Log Level: {}", settings.log_level);
    println!("PostgreSQL Database: {}", settings.postgres.database);
    println!("DuckDB Path: {}", settings.duckdb_path.display());
    println!("MinIO: {}:{}", settings.minio.host, settings.minio.port);
    println!("dbt Project: {} (target {})", settings.dbt_project_dir.display(), settings.dbt_target);
    println!("Dagster Home: {}", settings.dagster_home.display());
    println!("Workflows: {}", settings.workflows_dir.display());
}

/// Check required variables through `lookup` and the data directory
pub fn diagnose<F>(settings: &Settings, lookup: F) -> DoctorReport
where
    F: Fn(&str) -> Option<String>,
{
    DoctorReport {
        missing_variables: REQUIRED_VARIABLES
            .iter()
            .copied()
            .filter(|var| lookup(*var).is_none_or(|v| v.trim().is_empty()))
            .collect(),
        data_dir_exists: settings.data_dir.is_dir(),
    }
}

pub fn doctor(settings: &Settings) -> DoctorReport {
    println!("Running diagnostic checks...");
    let report = diagnose(settings, |key| std::env::var(key).ok());

    println!("Checking environment variables...");
    if report.missing_variables.is_empty() {
        println!("{}", "Environment variables: OK".green());
    } else {
        println!(
            "{}",
            format!(
                "Warning: Missing environment variables: {}",
                report.missing_variables.join(", ")
            )
            .yellow()
        );
    }

    println!("Checking data directory...");
    if report.data_dir_exists {
        println!(
            "{}",
            format!("Data directory: OK ({})", settings.data_dir.display()).green()
        );
    } else {
        println!(
            "{}",
            format!(
                "Warning: Data directory does not exist: {}",
                settings.data_dir.display()
            )
            .yellow()
        );
    }

    println!("\nRun 'dw storage status' for detailed storage connection status.");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_diagnose() {
        let dir = TempDir::new().unwrap();
        let env = HashMap::from([
            ("DATA_WAREHOUSE_ROOT", dir.path().display().to_string()),
            ("POSTGRES_HOST", "db".to_string()),
            ("POSTGRES_USER", "dw".to_string()),
            ("POSTGRES_PASSWORD", " ".to_string()),
        ]);
        let lookup = |k: &str| env.get(k).cloned();
        let settings = Settings::from_lookup(lookup).unwrap();

        let report = diagnose(&settings, lookup);
        assert_eq!(
            report.missing_variables,
            vec!["POSTGRES_PASSWORD", "MINIO_ACCESS_KEY"]
        );
        assert!(!report.data_dir_exists);
        assert!(!report.healthy());

        std::fs::create_dir_all(&settings.data_dir).unwrap();
        assert!(diagnose(&settings, lookup).data_dir_exists);
    }
}
