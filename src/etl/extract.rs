//! Extractor trait for pulling records out of source systems

use eyre::Result;
use std::collections::BTreeMap;
use std::future::Future;

/// Descriptive information about an extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorMetadata {
    pub name: String,
    pub details: BTreeMap<String, String>,
}

impl ExtractorMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            details: BTreeMap::new(),
        }
    }

    /// Add a detail entry
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Extractor trait for extracting records from a source
///
/// Implementors cover HTTP APIs, files and database tables.
///
/// # Example
/// ```no_run
/// use data_warehouse::etl::Extractor;
/// use eyre::Result;
///
/// struct StaticExtractor(Vec<i64>);
///
/// impl Extractor for StaticExtractor {
///     type Item = i64;
///
///     async fn extract(&self) -> Result<Vec<Self::Item>> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (network, I/O, parsing, etc.)
    fn extract(&self) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;

    /// Check that the source is reachable before extracting
    fn validate_source(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Describe this extractor
    fn metadata(&self) -> ExtractorMetadata {
        let name = std::any::type_name::<Self>();
        ExtractorMetadata::new(name.rsplit("::").next().unwrap_or(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl Extractor for Nothing {
        type Item = ();
        async fn extract(&self) -> Result<Vec<()>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_defaults() {
        assert!(Nothing.validate_source().await.is_ok());
        assert_eq!(Nothing.metadata().name, "Nothing");
        assert!(Nothing.metadata().details.is_empty());
    }

    #[test]
    fn test_metadata_builder() {
        let meta = ExtractorMetadata::new("api").with("lookback_hours", 24);
        assert_eq!(meta.details.get("lookback_hours").map(String::as_str), Some("24"));
    }
}
