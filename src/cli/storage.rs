//! `dw storage` helpers

use super::confirm;
use crate::config::Settings;
use crate::storage::{self, REQUIRED_BUCKETS, StorageStatus};
use eyre::{Context, Result};
use owo_colors::OwoColorize;

/// Create the data directory and the PostgreSQL schemas
///
/// Returns false when the user declined a forced re-initialization.
pub async fn init_storage(settings: &Settings, force: bool, assume_yes: bool) -> Result<bool> {
    log::info!("Initializing storage components...");
    std::fs::create_dir_all(&settings.data_dir).with_context(|| {
        format!("Failed to create data directory {}", settings.data_dir.display())
    })?;

    if force
        && !confirm(
            "This will recreate all storage components and may result in data loss. Continue?",
            assume_yes,
        )?
    {
        log::warn!("Storage initialization cancelled");
        return Ok(false);
    }

    std::fs::create_dir_all(settings.data_dir.join("raw"))?;
    let pool = storage::connect(&settings.postgres).await?;
    storage::initialize_postgres(&pool).await?;
    pool.close().await;

    log::info!(
        "Object storage at {} must provide buckets: {}",
        settings.minio.endpoint(),
        REQUIRED_BUCKETS.join(", ")
    );
    log::info!("{}", "Storage initialized successfully!".green());
    Ok(true)
}

/// Print the status of every storage backend
pub async fn storage_status(settings: &Settings) -> StorageStatus {
    log::info!("Checking storage status...");
    let status =
        StorageStatus::check(&settings.postgres, &settings.minio, &settings.duckdb_path).await;

    println!("Storage Status:");
    for component in status.components() {
        if component.healthy {
            println!("{} {}: Connected", "✅".green(), component.name.green());
        } else {
            println!("{} {}: Unavailable", "❌".red(), component.name.red());
        }
        println!("   {}", component.detail.bright_black());
    }
    status
}
