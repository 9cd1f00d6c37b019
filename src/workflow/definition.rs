//! Declarative workflow definitions
//!
//! A YAML file describes one source, an ordered list of transforms and one
//! target:
//!
//! ```yaml
//! name: customers
//! domain: crm
//! source:
//!   type: api
//!   base_url: https://crm.example.com/api
//!   endpoint: customers
//!   records_key: customers
//!   api_key_env: CRM_API_KEY
//! transforms:
//!   - type: normalize
//!     trim: true
//!     title_case: [name]
//!   - type: deduplicate
//!     key: id
//!   - type: stamp
//! target:
//!   type: postgres
//!   table: customers
//! ```

use super::{Workflow, WorkflowConfig, WorkflowContext, WorkflowValidator};
use crate::client::{ApiClient, Auth, ClientOptions};
use crate::config::Settings;
use crate::error::WarehouseError;
use crate::etl::{Extractor, ExtractorMetrics, Loader, Record, Transformer, TransformerChain};
use crate::sources::{
    ApiExtractor, FileExtractor, FileFormat, NightscoutCollection, NightscoutExtractor,
    PostgresExtractor,
};
use crate::storage::{self, NdjsonWriter, PostgresLoader};
use crate::transform::{
    Deduplicator, FieldDropper, FieldNormalizer, LoadStamp, NightscoutTransformer,
};
use async_trait::async_trait;
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    Api {
        base_url: String,
        endpoint: String,
        records_key: Option<String>,
        api_key_env: Option<String>,
    },
    File {
        path: PathBuf,
        format: Option<FileFormat>,
    },
    Postgres {
        table: String,
    },
    Nightscout {
        base_url: String,
        api_secret_env: Option<String>,
        #[serde(default)]
        collection: NightscoutCollection,
        #[serde(default = "default_lookback")]
        lookback_hours: i64,
        #[serde(default = "default_record_limit")]
        record_limit: u32,
    },
}

fn default_lookback() -> i64 {
    NightscoutExtractor::DEFAULT_LOOKBACK_HOURS
}

fn default_record_limit() -> u32 {
    NightscoutExtractor::DEFAULT_RECORD_LIMIT
}

impl SourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::File { .. } => "file",
            Self::Postgres { .. } => "postgres",
            Self::Nightscout { .. } => "nightscout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformSpec {
    DropFields {
        fields: Vec<String>,
    },
    Deduplicate {
        key: String,
    },
    Normalize {
        #[serde(default)]
        trim: bool,
        #[serde(default)]
        title_case: Vec<String>,
        #[serde(default)]
        digits_only: Vec<String>,
    },
    Stamp {
        #[serde(default)]
        source: Option<String>,
    },
    Nightscout,
}

impl TransformSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DropFields { .. } => "drop_fields",
            Self::Deduplicate { .. } => "deduplicate",
            Self::Normalize { .. } => "normalize",
            Self::Stamp { .. } => "stamp",
            Self::Nightscout => "nightscout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSpec {
    Postgres { table: String },
    Ndjson { path: PathBuf },
}

impl TargetSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Ndjson { .. } => "ndjson",
        }
    }
}

/// Parsed workflow file, before validation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub domain: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub source: Option<SourceSpec>,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    pub target: Option<TargetSpec>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_enabled() -> bool {
    true
}

impl WorkflowDefinition {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| WarehouseError::Validation(format!("invalid workflow definition: {}", e)).into())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Config for this definition, `fallback_domain` applies when none is declared
    pub fn config(&self, fallback_domain: &str) -> Result<WorkflowConfig> {
        WorkflowConfig {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            domain: self
                .domain
                .clone()
                .unwrap_or_else(|| fallback_domain.to_string()),
            enabled: self.enabled,
        }
        .validated()
    }
}

/// Settings and lazily opened connections shared by defined workflows
pub struct WorkflowResources {
    settings: Settings,
    pool: OnceCell<PgPool>,
    metrics: Arc<ExtractorMetrics>,
}

impl WorkflowResources {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            pool: OnceCell::new(),
            metrics: Arc::new(ExtractorMetrics::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<ExtractorMetrics> {
        &self.metrics
    }

    /// Connect on first use
    pub async fn pool(&self) -> Result<PgPool> {
        self.pool
            .get_or_try_init(|| storage::connect(&self.settings.postgres))
            .await
            .cloned()
    }

    /// Relative paths live under the data directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.settings.data_dir.join(path)
        }
    }
}

/// A [`Workflow`] built from a [`WorkflowDefinition`]
pub struct DefinedWorkflow {
    config: WorkflowConfig,
    source: SourceSpec,
    transforms: Vec<TransformSpec>,
    target: TargetSpec,
    resources: Arc<WorkflowResources>,
}

impl DefinedWorkflow {
    pub fn new(
        definition: WorkflowDefinition,
        fallback_domain: &str,
        resources: Arc<WorkflowResources>,
    ) -> Result<Self> {
        WorkflowValidator::validate(&definition)?;
        let config = definition.config(fallback_domain)?;
        let missing = |what: &str| {
            WarehouseError::Validation(format!("workflow '{}' has no {}", config.name, what))
        };
        let source = definition.source.ok_or_else(|| missing("source"))?;
        let target = definition.target.ok_or_else(|| missing("target"))?;
        Ok(Self {
            config,
            source,
            transforms: definition.transforms,
            target,
            resources,
        })
    }

    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    async fn run_extractor<E>(&self, extractor: E) -> Result<Vec<Record>>
    where
        E: Extractor<Item = Record>,
    {
        let name = extractor.metadata().name;
        extractor.validate_source().await?;
        match extractor.extract().await {
            Ok(records) => {
                self.resources.metrics().record_success(&name, records.len());
                Ok(records)
            }
            Err(e) => {
                self.resources.metrics().record_failure(&name);
                Err(e)
            }
        }
    }

    fn chain(&self) -> TransformerChain {
        let mut chain = TransformerChain::new();
        for spec in &self.transforms {
            match spec {
                TransformSpec::DropFields { fields } => chain.push(FieldDropper::new(fields.clone())),
                TransformSpec::Deduplicate { key } => chain.push(Deduplicator::new(key.clone())),
                TransformSpec::Normalize {
                    trim,
                    title_case,
                    digits_only,
                } => chain.push(
                    FieldNormalizer::new()
                        .trim(*trim)
                        .title_case(title_case.clone())
                        .digits_only(digits_only.clone()),
                ),
                TransformSpec::Stamp { source } => chain.push(LoadStamp::new(
                    source.clone().unwrap_or_else(|| self.config.name.clone()),
                )),
                TransformSpec::Nightscout => chain.push(NightscoutTransformer),
            }
        }
        chain
    }
}

fn env_secret(var: &Option<String>) -> Option<String> {
    var.as_ref().and_then(|name| std::env::var(name).ok())
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw)
        .map_err(|e| WarehouseError::Validation(format!("invalid URL '{}': {}", raw, e)).into())
}

#[async_trait]
impl Workflow for DefinedWorkflow {
    fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    async fn extract(&self, ctx: &mut WorkflowContext) -> Result<()> {
        let records = match &self.source {
            SourceSpec::Api {
                base_url,
                endpoint,
                records_key,
                api_key_env,
            } => {
                let client = ApiClient::try_new(
                    parse_url(base_url)?,
                    Auth::bearer(env_secret(api_key_env)),
                    ClientOptions::default(),
                )?;
                let mut extractor = ApiExtractor::new(client, endpoint.clone());
                if let Some(key) = records_key {
                    extractor = extractor.records_key(key.clone());
                }
                self.run_extractor(extractor).await?
            }
            SourceSpec::File { path, format } => {
                let mut extractor = FileExtractor::new(self.resources.resolve(path));
                if let Some(format) = format {
                    extractor = extractor.with_format(*format);
                }
                self.run_extractor(extractor).await?
            }
            SourceSpec::Postgres { table } => {
                let pool = self.resources.pool().await?;
                self.run_extractor(PostgresExtractor::new(pool, table)?).await?
            }
            SourceSpec::Nightscout {
                base_url,
                api_secret_env,
                collection,
                lookback_hours,
                record_limit,
            } => {
                let extractor = NightscoutExtractor::try_new(
                    parse_url(base_url)?,
                    env_secret(api_secret_env),
                    *collection,
                )?
                .lookback_hours(*lookback_hours)
                .record_limit(*record_limit);
                self.run_extractor(extractor).await?
            }
        };

        ctx.metadata.insert("source".into(), json!(self.source.kind()));
        ctx.metadata.insert("extracted".into(), json!(records.len()));
        ctx.records = records;
        Ok(())
    }

    async fn transform(&self, ctx: &mut WorkflowContext) -> Result<()> {
        let records = std::mem::take(&mut ctx.records);
        ctx.records = self.chain().transform_many(records)?;
        ctx.metadata.insert("transformed".into(), json!(ctx.records.len()));
        Ok(())
    }

    async fn load(&self, ctx: &mut WorkflowContext) -> Result<()> {
        let records = std::mem::take(&mut ctx.records);
        let count = records.len();
        ctx.loaded = match &self.target {
            TargetSpec::Postgres { table } => {
                let pool = self.resources.pool().await?;
                PostgresLoader::new(pool, table)?.load(records).await?
            }
            TargetSpec::Ndjson { path } => {
                NdjsonWriter::appending(self.resources.resolve(path))
                    .load(records)
                    .await?
            }
        };
        log::debug!("{} loaded {} of {} records", self.id(), ctx.loaded, count);
        ctx.metadata.insert("target".into(), json!(self.target.kind()));
        ctx.metadata.insert("loaded".into(), json!(ctx.loaded));
        Ok(())
    }
}
