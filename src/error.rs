//! Error taxonomy for the data warehouse
//!
//! Library code returns [`eyre::Result`] and wraps a [`WarehouseError`] when the
//! failure has a category the CLI cares about. `main` downcasts the report to
//! pick an exit code.

use thiserror::Error;

/// Categorized warehouse failures
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Extraction failed: {0}")]
    Extractor(String),

    #[error("Transformation failed: {0}")]
    Transformer(String),

    #[error("Load failed: {0}")]
    Loader(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Workflow discovery failed: {0}")]
    Discovery(String),
}

impl WarehouseError {
    /// Process exit code for this category
    ///
    /// Usage problems exit 2, validation 3, database 4, storage 5 and every
    /// other warehouse failure 6. Uncategorized errors exit 10 (see [`exit_code`]).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Validation(_) => 3,
            Self::Database(_) => 4,
            Self::Storage(_) => 5,
            _ => 6,
        }
    }

    /// Short label used when printing the error to the terminal
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Database(_) => "Database Error",
            Self::Storage(_) => "Storage Error",
            _ => "Error",
        }
    }
}

impl From<sqlx::Error> for WarehouseError {
    fn from(err: sqlx::Error) -> Self {
        WarehouseError::Database(err.to_string())
    }
}

/// Exit code for an arbitrary report
pub fn exit_code(report: &eyre::Report) -> i32 {
    match report.downcast_ref::<WarehouseError>() {
        Some(err) => err.exit_code(),
        None => 10,
    }
}
