//! PostgreSQL connection, schema setup and the JSONB raw-layer loader

use super::quote_identifier;
use crate::config::PostgresSettings;
use crate::error::WarehouseError;
use crate::etl::{Loader, Record};
use crate::monitoring;
use async_trait::async_trait;
use eyre::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder, Row};
use std::time::Duration;

const WAREHOUSE_DDL: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS warehouse",
    "CREATE SCHEMA IF NOT EXISTS raw",
    "CREATE SCHEMA IF NOT EXISTS monitoring",
    r#"CREATE TABLE IF NOT EXISTS warehouse.datasets (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        schema JSONB,
        tags JSONB,
        metadata JSONB
    )"#,
    r#"CREATE TABLE IF NOT EXISTS warehouse.partitions (
        id SERIAL PRIMARY KEY,
        dataset_id INTEGER NOT NULL REFERENCES warehouse.datasets(id),
        partition_key VARCHAR(255) NOT NULL,
        min_value VARCHAR(255),
        max_value VARCHAR(255),
        row_count INTEGER,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        storage_location VARCHAR(255),
        storage_type VARCHAR(50),
        metadata JSONB
    )"#,
];

/// Open a connection pool
pub async fn connect(settings: &PostgresSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&settings.connection_url())
        .await
        .map_err(|e| {
            WarehouseError::Database(format!(
                "failed to connect to {}:{}: {}",
                settings.host, settings.port, e
            ))
        })?;
    log::debug!("Connected to PostgreSQL at {}:{}", settings.host, settings.port);
    Ok(pool)
}

/// `SELECT version()`
pub async fn server_version(pool: &PgPool) -> Result<String> {
    let row = sqlx::query("SELECT version() AS version")
        .fetch_one(pool)
        .await
        .map_err(WarehouseError::from)?;
    Ok(row.try_get::<String, _>("version").map_err(WarehouseError::from)?)
}

/// Create the warehouse, raw and monitoring schemas with their tables
pub async fn initialize_postgres(pool: &PgPool) -> Result<()> {
    let statements = WAREHOUSE_DDL
        .iter()
        .chain(monitoring::RESULTS_DDL.iter());

    for statement in statements {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            WarehouseError::Database(format!("failed to initialize PostgreSQL: {}", e))
        })?;
    }
    log::info!("PostgreSQL schemas and tables initialized");
    Ok(())
}

/// Loads records into a `raw.<table>` JSONB table
///
/// Each record becomes one row. All batches of a load share one transaction,
/// so a failure leaves the table untouched.
pub struct PostgresLoader {
    pool: PgPool,
    table: String,
    batch_size: usize,
}

impl PostgresLoader {
    /// Unqualified table names land in the `raw` schema
    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        let qualified = if table.contains('.') {
            table.to_string()
        } else {
            format!("raw.{}", table)
        };
        Ok(Self {
            pool,
            table: quote_identifier(&qualified)?,
            batch_size: 100,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Quoted, schema-qualified target table
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_table(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id BIGSERIAL PRIMARY KEY, \
                payload JSONB NOT NULL, \
                loaded_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            self.table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(WarehouseError::from)?;
        Ok(())
    }
}

#[async_trait]
impl Loader for PostgresLoader {
    type Item = Record;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        self.ensure_table().await?;

        let mut tx = self.pool.begin().await.map_err(WarehouseError::from)?;
        let mut written = 0u64;
        for chunk in items.chunks(self.batch_size) {
            let mut builder =
                QueryBuilder::<sqlx::Postgres>::new(format!("INSERT INTO {} (payload) ", self.table));
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(Json(record.clone()));
            });
            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| WarehouseError::Loader(format!("insert into {}: {}", self.table, e)))?;
            written += result.rows_affected();
            log::debug!("Inserted batch of {} into {}", chunk.len(), self.table);
        }
        tx.commit().await.map_err(WarehouseError::from)?;

        log::info!("Loaded {} records into {}", written, self.table);
        Ok(written as usize)
    }
}
