use crate::error::WarehouseError;
use crate::etl::{Extractor, ExtractorMetadata, Record};
use crate::storage::quote_identifier;
use eyre::Result;
use sqlx::{PgPool, Row};

/// Reads every row of a table as a JSON object
pub struct PostgresExtractor {
    pool: PgPool,
    table: String,
}

impl PostgresExtractor {
    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        // validate up front so a bad name never reaches the database
        quote_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    fn query(&self) -> Result<String> {
        Ok(format!(
            "SELECT row_to_json(t) AS record FROM {} t",
            quote_identifier(&self.table)?
        ))
    }
}

impl Extractor for PostgresExtractor {
    type Item = Record;

    async fn validate_source(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(WarehouseError::from)?;
        Ok(())
    }

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        let rows = sqlx::query(&self.query()?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WarehouseError::Extractor(format!("reading {}: {}", self.table, e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Record, _>("record")
                    .map_err(|e| WarehouseError::from(e).into())
            })
            .collect()
    }

    fn metadata(&self) -> ExtractorMetadata {
        ExtractorMetadata::new("postgres").with("table", &self.table)
    }
}
