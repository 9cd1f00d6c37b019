//! Loader trait for writing records to the raw layer

use async_trait::async_trait;
use eyre::Result;

/// Loader trait for loading data to a destination
///
/// # Example
/// ```no_run
/// use data_warehouse::etl::Loader;
/// use async_trait::async_trait;
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// #[async_trait]
/// impl Loader for CountingLoader {
///     type Item = serde_json::Value;
///
///     async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
///         Ok(items.len())
///     }
/// }
/// ```
#[async_trait]
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send;

    /// Load items to the destination
    ///
    /// Returns the number of items written
    async fn load(&self, items: Vec<Self::Item>) -> Result<usize>;
}
