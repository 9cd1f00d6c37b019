//! File sources: CSV, JSON and NDJSON

use crate::error::WarehouseError;
use crate::etl::{Extractor, ExtractorMetadata, Record};
use crate::storage::NdjsonReader;
use eyre::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
    Ndjson,
}

impl FileFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
            Self::Ndjson => write!(f, "ndjson"),
        }
    }
}

/// Reads every record out of a single file
///
/// CSV rows become objects keyed by the header row with string values. A JSON
/// file may hold an array of records or one object.
pub struct FileExtractor {
    path: PathBuf,
    format: Option<FileFormat>,
}

impl FileExtractor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Result<FileFormat> {
        self.format
            .or_else(|| FileFormat::from_path(&self.path))
            .ok_or_else(|| {
                WarehouseError::Validation(format!(
                    "cannot determine file format of {}",
                    self.path.display()
                ))
                .into()
            })
    }

    /// Read the file synchronously
    pub fn read(&self) -> Result<Vec<Record>> {
        if !self.path.exists() {
            return Err(WarehouseError::Extractor(format!(
                "file not found: {}",
                self.path.display()
            ))
            .into());
        }
        log::info!("Reading {} file: {}", self.format()?, self.path.display());
        match self.format()? {
            FileFormat::Csv => read_csv(&self.path),
            FileFormat::Json => read_json(&self.path),
            FileFormat::Ndjson => NdjsonReader::new(&self.path).read(),
        }
    }
}

fn read_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for (n, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Failed to read CSV row {}", n + 1))?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        records.push(Value::Object(object));
    }
    Ok(records)
}

fn read_json(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file: {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        _ => Err(WarehouseError::Validation(format!(
            "{} must contain an array or an object",
            path.display()
        ))
        .into()),
    }
}

impl Extractor for FileExtractor {
    type Item = Record;

    async fn validate_source(&self) -> Result<()> {
        if !self.path.is_file() {
            return Err(WarehouseError::Validation(format!(
                "source file does not exist: {}",
                self.path.display()
            ))
            .into());
        }
        self.format().map(|_| ())
    }

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        self.read()
    }

    fn metadata(&self) -> ExtractorMetadata {
        let meta = ExtractorMetadata::new("file").with("path", self.path.display());
        match self.format() {
            Ok(format) => meta.with("format", format),
            Err(_) => meta,
        }
    }
}

/// Access to the files in a data directory
pub struct FileClient {
    data_dir: PathBuf,
}

impl FileClient {
    /// The directory is created when missing
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.exists() {
            log::warn!("Data directory does not exist: {}", data_dir.display());
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create {}", data_dir.display()))?;
            log::info!("Created data directory: {}", data_dir.display());
        }
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Files directly inside the data directory, optionally by extension
    pub fn list_files(&self, extension: Option<&str>) -> Result<Vec<PathBuf>> {
        let wanted = extension.map(|e| e.trim_start_matches('.').to_lowercase());
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| match &wanted {
                Some(ext) => p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.to_lowercase() == *ext),
                None => true,
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Extractor for a file in the data directory
    pub fn extractor(&self, filename: &str) -> FileExtractor {
        FileExtractor::new(self.data_dir.join(filename))
    }

    /// Write records as CSV with the union of their keys as header
    pub fn save_csv(&self, filename: &str, records: &[Record]) -> Result<PathBuf> {
        let path = self.data_dir.join(filename);
        let columns: BTreeSet<&str> = records
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|obj| obj.keys().map(String::as_str))
            .collect();

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        writer.write_record(&columns)?;
        for record in records {
            let row: Vec<String> = columns
                .iter()
                .map(|col| match record.get(*col) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect();
            writer.write_record(&row)?;
        }
        writer.flush()?;
        log::info!("Saved {} rows to {}", records.len(), path.display());
        Ok(path)
    }
}
