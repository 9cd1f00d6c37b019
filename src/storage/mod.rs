//! Raw-layer storage
//!
//! This module handles:
//! - NDJSON file reading/writing and the dated raw zone on disk
//! - PostgreSQL connections, schema initialization and the JSONB raw loader
//! - Health checks for PostgreSQL, MinIO and DuckDB

mod identifier;
mod ndjson;
mod postgres;
mod raw_zone;
mod status;

pub use identifier::{quote_identifier, validate_identifier};
pub use ndjson::{NdjsonReader, NdjsonWriter};
pub use postgres::{PostgresLoader, connect, initialize_postgres, server_version};
pub use raw_zone::RawZone;
pub use status::{
    ComponentStatus, REQUIRED_BUCKETS, StorageStatus, duckdb_status, minio_status, postgres_status,
};
