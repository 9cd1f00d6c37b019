//! Date-partitioned NDJSON raw zone
//!
//! Layout: `<data_dir>/raw/<source>/<YYYY-MM-DD>.ndjson`. Loads on the same
//! day append to the same file.

use super::NdjsonWriter;
use crate::error::WarehouseError;
use crate::etl::{Loader, Record};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use eyre::Result;
use std::path::{Path, PathBuf};

pub struct RawZone {
    root: PathBuf,
    source: String,
}

impl RawZone {
    pub fn new(data_dir: impl AsRef<Path>, source: &str) -> Result<Self> {
        if source.is_empty()
            || !source
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(
                WarehouseError::Validation(format!("invalid raw zone source '{}'", source)).into(),
            );
        }
        Ok(Self {
            root: data_dir.as_ref().join("raw"),
            source: source.to_string(),
        })
    }

    /// Partition file for a given day
    pub fn partition_path(&self, day: NaiveDate) -> PathBuf {
        self.root
            .join(&self.source)
            .join(format!("{}.ndjson", day.format("%Y-%m-%d")))
    }

    /// Partition file for today (UTC)
    pub fn today(&self) -> PathBuf {
        self.partition_path(Utc::now().date_naive())
    }

    /// Existing partition files, oldest first
    pub fn partitions(&self) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(&self.source);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "ndjson"))
            .collect();
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl Loader for RawZone {
    type Item = Record;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        let path = self.today();
        NdjsonWriter::appending(&path).append(&items)?;
        log::info!("Appended {} records to {}", items.len(), path.display());
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NdjsonReader;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_partition_layout() {
        let zone = RawZone::new("/data", "customers").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            zone.partition_path(day),
            PathBuf::from("/data/raw/customers/2024-03-09.ndjson")
        );
    }

    #[test]
    fn test_rejects_path_like_source() {
        assert!(RawZone::new("/data", "../etc").is_err());
        assert!(RawZone::new("/data", "").is_err());
    }

    #[tokio::test]
    async fn test_same_day_appends() {
        let dir = TempDir::new().unwrap();
        let zone = RawZone::new(dir.path(), "orders").unwrap();

        zone.load(vec![json!({"id": 1})]).await.unwrap();
        zone.load(vec![json!({"id": 2}), json!({"id": 3})]).await.unwrap();

        let partitions = zone.partitions().unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(NdjsonReader::new(&partitions[0]).read().unwrap().len(), 3);
    }
}
