//! Environment driven settings
//!
//! Values come from process environment variables (after the CLI sources a
//! dotenv file). Every setting has a default so a bare checkout works against a
//! local docker-compose stack.

use crate::error::WarehouseError;
use eyre::Result;
use std::path::PathBuf;
use std::str::FromStr;

/// dbt target profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbtTarget {
    Dev,
    Prod,
}

impl FromStr for DbtTarget {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(WarehouseError::Configuration(format!(
                "DBT_TARGET must be 'dev' or 'prod', got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DbtTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Prod => write!(f, "prod"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Full connection URL, takes precedence over the individual parts
    pub url: Option<String>,
}

impl PostgresSettings {
    /// Connection URL for sqlx
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinioSettings {
    pub host: String,
    pub port: u16,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub secure: bool,
}

impl MinioSettings {
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// All warehouse settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub environment: String,
    pub postgres: PostgresSettings,
    pub minio: MinioSettings,
    pub duckdb_path: PathBuf,
    pub dbt_project_dir: PathBuf,
    pub dbt_profiles_dir: PathBuf,
    pub dbt_target: DbtTarget,
    pub dagster_home: PathBuf,
    pub dagster_module: String,
    pub workflows_dir: PathBuf,
    pub log_level: String,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = match get("DATA_WAREHOUSE_ROOT") {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir()?,
        };
        let path_or = |key: &str, default: PathBuf| get(key).map(PathBuf::from).unwrap_or(default);

        let data_dir = path_or("DATA_DIR", root.join("data"));

        let postgres = PostgresSettings {
            host: get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(get("POSTGRES_PORT"), "POSTGRES_PORT", 5432)?,
            user: get("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
            password: get("POSTGRES_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
            database: get("POSTGRES_DB").unwrap_or_else(|| "data_warehouse".to_string()),
            url: get("DATABASE_URL"),
        };

        let minio = MinioSettings {
            host: get("MINIO_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(get("MINIO_PORT"), "MINIO_PORT", 9000)?,
            access_key: get("MINIO_ACCESS_KEY"),
            secret_key: get("MINIO_SECRET_KEY"),
            secure: parse_bool(get("MINIO_SECURE"), "MINIO_SECURE")?,
        };

        let dbt_target = match get("DBT_TARGET") {
            Some(target) => target.parse()?,
            None => DbtTarget::Dev,
        };

        Ok(Self {
            duckdb_path: path_or("DUCKDB_PATH", data_dir.join("warehouse.db")),
            dbt_project_dir: path_or("DBT_PROJECT_DIR", root.join("dbt")),
            dbt_profiles_dir: path_or("DBT_PROFILES_DIR", root.join("dbt").join("config")),
            dagster_home: path_or("DAGSTER_HOME", root.join("dagster_home")),
            workflows_dir: path_or("WORKFLOWS_DIR", root.join("workflows")),
            dagster_module: get("DAGSTER_MODULE")
                .unwrap_or_else(|| "data_warehouse.orchestration.dagster".to_string()),
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_level: get("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            dbt_target,
            postgres,
            minio,
            data_dir,
            root,
        })
    }

    /// Path of the workflow run history file
    pub fn workflow_runs_path(&self) -> PathBuf {
        self.data_dir.join("workflow_runs.ndjson")
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| {
            WarehouseError::Configuration(format!("{} has an invalid value: '{}'", key, v)).into()
        }),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &str) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(WarehouseError::Configuration(format!(
                "{} must be a boolean, got '{}'",
                key, v
            ))
            .into()),
        },
    }
}
