//! Data Warehouse
//!
//! ELT toolkit for a PostgreSQL warehouse: extractors feed a raw layer, dbt
//! transforms it and dbt test results are tracked in a monitoring schema.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod etl;
pub mod monitoring;
pub mod orchestration;
pub mod sources;
pub mod storage;
pub mod transform;
pub mod workflow;

// Re-exports for convenience
pub use client::{ApiClient, Auth, ClientOptions};
pub use config::Settings;
pub use error::WarehouseError;
pub use etl::{
    Extractor, IdentityTransformer, Loader, Pipeline, PipelineReport, Record, Transformer,
};
pub use monitoring::{DbtTestResult, TestStatus, parse_run_results};
pub use storage::{NdjsonReader, NdjsonWriter, PostgresLoader, RawZone};
