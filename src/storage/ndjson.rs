//! NDJSON (Newline Delimited JSON) files for the file raw layer

use crate::etl::{Extractor, ExtractorMetadata, Loader, Record};
use async_trait::async_trait;
use eyre::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Read records from an NDJSON file
pub struct NdjsonReader {
    path: PathBuf,
}

impl NdjsonReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read every non-blank line as a JSON value
    pub fn read(&self) -> Result<Vec<Record>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read NDJSON file: {}", self.path.display()))?;
        parse_lines(&content)
    }
}

pub(crate) fn parse_lines(content: &str) -> Result<Vec<Record>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse JSON on line {}", n + 1))
        })
        .collect()
}

impl Extractor for NdjsonReader {
    type Item = Record;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        self.read()
    }

    fn metadata(&self) -> ExtractorMetadata {
        ExtractorMetadata::new("ndjson").with("path", self.path.display())
    }
}

/// Write records to an NDJSON file
pub struct NdjsonWriter {
    path: PathBuf,
    append: bool,
}

impl NdjsonWriter {
    /// Writer that replaces the file on every load
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            append: false,
        }
    }

    /// Writer that appends to the file on every load
    pub fn appending(path: impl AsRef<Path>) -> Self {
        Self {
            append: true,
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write records as NDJSON, replacing the file
    pub fn write(&self, items: &[Record]) -> Result<()> {
        self.ensure_parent()?;
        let mut content = String::new();
        for item in items {
            content.push_str(&serde_json::to_string(item)?);
            content.push('\n');
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))
    }

    /// Append records to the file, creating it when missing
    pub fn append(&self, items: &[Record]) -> Result<()> {
        self.ensure_parent()?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open NDJSON file: {}", self.path.display()))?;

        for item in items {
            writeln!(file, "{}", serde_json::to_string(item)?)?;
        }
        Ok(())
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Loader for NdjsonWriter {
    type Item = Record;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        if self.append {
            self.append(&items)?;
        } else {
            self.write(&items)?;
        }
        log::debug!("Wrote {} records to {}", items.len(), self.path.display());
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_read_write() {
        let temp = NamedTempFile::new().unwrap();
        let writer = NdjsonWriter::new(temp.path());

        let data = vec![json!({"a": 1}), json!({"b": 2})];
        writer.write(&data).unwrap();

        let read_data = NdjsonReader::new(temp.path()).read().unwrap();
        assert_eq!(data, read_data);
    }

    #[tokio::test]
    async fn test_appending_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.ndjson");
        let writer = NdjsonWriter::appending(&path);

        writer.load(vec![json!({"a": 1})]).await.unwrap();
        writer.load(vec![json!({"b": 2})]).await.unwrap();

        let data = NdjsonReader::new(&path).extract().await.unwrap();
        assert_eq!(data, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = parse_lines("{\"a\":1}\n\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
