//! `dw ingestion` helpers

use crate::client::{ApiClient, Auth, ClientOptions};
use crate::config::Settings;
use crate::error::WarehouseError;
use crate::etl::{Extractor, Pipeline, PipelineReport, Record};
use crate::sources::{ApiExtractor, FileExtractor, FileFormat, PostgresExtractor};
use crate::storage::{self, PostgresLoader, RawZone};
use crate::transform::LoadStamp;
use clap::ValueEnum;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IngestionSource {
    Csv,
    Json,
    Ndjson,
    Postgres,
    Api,
}

impl IngestionSource {
    fn file_format(&self) -> Option<FileFormat> {
        match self {
            Self::Csv => Some(FileFormat::Csv),
            Self::Json => Some(FileFormat::Json),
            Self::Ndjson => Some(FileFormat::Ndjson),
            Self::Postgres | Self::Api => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IngestionTarget {
    #[default]
    Postgres,
    Ndjson,
}

/// Arguments of `dw ingestion run`
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub source: IngestionSource,
    pub file: Option<PathBuf>,
    pub table: Option<String>,
    pub endpoint: Option<String>,
    pub records_key: Option<String>,
    pub target: IngestionTarget,
    /// Raw table or raw zone name, derived from the source when absent
    pub name: Option<String>,
}

impl IngestionRequest {
    pub fn new(source: IngestionSource) -> Self {
        Self {
            source,
            file: None,
            table: None,
            endpoint: None,
            records_key: None,
            target: IngestionTarget::default(),
            name: None,
        }
    }

    fn missing(&self, option: &str) -> eyre::Report {
        WarehouseError::Configuration(format!(
            "--{} option is required for {:?} ingestion",
            option, self.source
        ))
        .into()
    }

    fn file(&self) -> Result<&Path> {
        self.file.as_deref().ok_or_else(|| self.missing("file"))
    }

    fn table(&self) -> Result<&str> {
        self.table.as_deref().ok_or_else(|| self.missing("table"))
    }

    fn endpoint(&self) -> Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| self.missing("endpoint"))
    }

    /// Check the source specific option is present
    pub fn validate(&self) -> Result<()> {
        match self.source {
            IngestionSource::Csv | IngestionSource::Json | IngestionSource::Ndjson => {
                self.file().map(|_| ())
            }
            IngestionSource::Postgres => self.table().map(|_| ()),
            IngestionSource::Api => self.endpoint().map(|_| ()),
        }
    }

    /// Destination name for the loaded records
    pub fn destination_name(&self) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(sanitize_name(name));
        }
        let derived = match self.source {
            IngestionSource::Csv | IngestionSource::Json | IngestionSource::Ndjson => self
                .file()?
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("file")
                .to_string(),
            IngestionSource::Postgres => {
                let table = self.table()?;
                table.rsplit('.').next().unwrap_or(table).to_string()
            }
            IngestionSource::Api => {
                let (_, path) = split_endpoint(self.endpoint()?)?;
                path.split(['?', '/'])
                    .find(|s| !s.is_empty())
                    .unwrap_or("api")
                    .to_string()
            }
        };
        Ok(sanitize_name(&derived))
    }
}

/// Turn an arbitrary label into a safe table or directory name
pub fn sanitize_name(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Split a full endpoint URL into a base URL and the last path segment
///
/// `https://api.example.com/v1/customers?active=true` becomes
/// `https://api.example.com/v1/` and `customers?active=true`.
pub fn split_endpoint(endpoint: &str) -> Result<(Url, String)> {
    let url = Url::parse(endpoint).map_err(|e| {
        WarehouseError::Configuration(format!("--endpoint must be a full URL ({}): {}", e, endpoint))
    })?;
    let (dir, last) = url.path().rsplit_once('/').unwrap_or(("", url.path()));
    let mut path = last.to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    let mut base = url.clone();
    base.set_path(&format!("{}/", dir));
    base.set_query(None);
    base.set_fragment(None);
    Ok((base, path))
}

pub fn list_sources() {
    println!("Available data sources:");
    for source in IngestionSource::value_variants() {
        if let Some(value) = source.to_possible_value() {
            println!("- {}", value.get_name().cyan());
        }
    }
}

/// Extract from the requested source into the raw layer
pub async fn run_ingestion(settings: &Settings, request: &IngestionRequest) -> Result<PipelineReport> {
    request.validate()?;
    let name = request.destination_name()?;
    log::info!(
        "Ingesting {:?} into {} {}",
        request.source,
        match request.target {
            IngestionTarget::Postgres => "raw table",
            IngestionTarget::Ndjson => "raw zone",
        },
        name.bright_black()
    );

    let report = match request.source {
        IngestionSource::Csv | IngestionSource::Json | IngestionSource::Ndjson => {
            let mut extractor = FileExtractor::new(request.file()?);
            if let Some(format) = request.source.file_format() {
                extractor = extractor.with_format(format);
            }
            load_into(settings, extractor, &name, request.target).await?
        }
        IngestionSource::Postgres => {
            let pool = storage::connect(&settings.postgres).await?;
            let extractor = PostgresExtractor::new(pool, request.table()?)?;
            load_into(settings, extractor, &name, request.target).await?
        }
        IngestionSource::Api => {
            let (base, path) = split_endpoint(request.endpoint()?)?;
            let auth = Auth::bearer(std::env::var("API_KEY").ok());
            let client = ApiClient::try_new(base, auth, ClientOptions::default())?;
            let mut extractor = ApiExtractor::new(client, path);
            if let Some(key) = &request.records_key {
                extractor = extractor.records_key(key.clone());
            }
            load_into(settings, extractor, &name, request.target).await?
        }
    };

    log::info!(
        "✓ Ingested {} of {} record(s) into {}",
        report.loaded,
        report.extracted,
        name
    );
    Ok(report)
}

async fn load_into<E>(
    settings: &Settings,
    extractor: E,
    name: &str,
    target: IngestionTarget,
) -> Result<PipelineReport>
where
    E: Extractor<Item = Record>,
{
    let stamp = LoadStamp::new(name);
    match target {
        IngestionTarget::Postgres => {
            let pool = storage::connect(&settings.postgres).await?;
            let loader = PostgresLoader::new(pool, name)?;
            Pipeline::new(extractor, stamp, loader).run_with_report().await
        }
        IngestionTarget::Ndjson => {
            let zone = RawZone::new(&settings.data_dir, name)?;
            Pipeline::new(extractor, stamp, zone).run_with_report().await
        }
    }
}
