//! Health checks for the storage backends

use super::{connect, server_version};
use crate::config::{MinioSettings, PostgresSettings};
use std::path::Path;
use std::time::Duration;

/// Buckets the object store must provide
pub const REQUIRED_BUCKETS: &[&str] = &["raw", "processed", "tmp", "export"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub healthy: bool,
    pub detail: String,
}

impl ComponentStatus {
    fn ok(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            healthy: true,
            detail: detail.into(),
        }
    }

    fn down(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            healthy: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageStatus {
    pub postgres: ComponentStatus,
    pub minio: ComponentStatus,
    pub duckdb: ComponentStatus,
}

impl StorageStatus {
    pub async fn check(
        postgres: &PostgresSettings,
        minio: &MinioSettings,
        duckdb_path: &Path,
    ) -> Self {
        Self {
            postgres: postgres_status(postgres).await,
            minio: minio_status(minio).await,
            duckdb: duckdb_status(duckdb_path),
        }
    }

    pub fn components(&self) -> [&ComponentStatus; 3] {
        [&self.postgres, &self.minio, &self.duckdb]
    }

    pub fn all_healthy(&self) -> bool {
        self.components().iter().all(|c| c.healthy)
    }
}

pub async fn postgres_status(settings: &PostgresSettings) -> ComponentStatus {
    let pool = match connect(settings).await {
        Ok(pool) => pool,
        Err(e) => return ComponentStatus::down("PostgreSQL", e.to_string()),
    };
    let status = match server_version(&pool).await {
        Ok(version) => ComponentStatus::ok("PostgreSQL", version),
        Err(e) => ComponentStatus::down("PostgreSQL", e.to_string()),
    };
    pool.close().await;
    status
}

/// MinIO liveness probe
pub async fn minio_status(settings: &MinioSettings) -> ComponentStatus {
    let url = format!("{}/minio/health/live", settings.endpoint());
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => return ComponentStatus::down("MinIO", e.to_string()),
    };

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => ComponentStatus::ok(
            "MinIO",
            format!(
                "{} live, required buckets: {}",
                settings.endpoint(),
                REQUIRED_BUCKETS.join(", ")
            ),
        ),
        Ok(response) => ComponentStatus::down(
            "MinIO",
            format!("{} returned {}", url, response.status()),
        ),
        Err(e) => ComponentStatus::down("MinIO", e.to_string()),
    }
}

pub fn duckdb_status(path: &Path) -> ComponentStatus {
    match std::fs::metadata(path) {
        Ok(meta) => ComponentStatus::ok(
            "DuckDB",
            format!("{} ({} bytes)", path.display(), meta.len()),
        ),
        Err(_) => ComponentStatus::down("DuckDB", format!("{} not found", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_duckdb_status() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warehouse.db");
        assert!(!duckdb_status(&path).healthy);

        std::fs::write(&path, b"1234").unwrap();
        let status = duckdb_status(&path);
        assert!(status.healthy);
        assert!(status.detail.ends_with("(4 bytes)"));
    }

    #[tokio::test]
    async fn test_minio_unreachable() {
        // bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let settings = MinioSettings {
            host: "127.0.0.1".into(),
            port,
            access_key: None,
            secret_key: None,
            secure: false,
        };
        assert!(!minio_status(&settings).await.healthy);
    }
}
