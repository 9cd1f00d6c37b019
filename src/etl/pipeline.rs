//! Pipeline orchestration for ELT runs

use super::{Extractor, ExtractorMetrics, Loader, Transformer};
use eyre::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counts from one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub extractor: String,
    pub extracted: usize,
    pub transformed: usize,
    pub loaded: usize,
    pub elapsed: Duration,
}

/// Pipeline that runs Extract, Transform and Load in sequence
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer type (must transform from E::Item)
/// - `L`: Loader type (must load T::Output)
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
    metrics: Arc<ExtractorMetrics>,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    L: Loader<Item = T::Output>,
{
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
            metrics: Arc::new(ExtractorMetrics::new()),
        }
    }

    /// Share a metrics registry across pipelines
    pub fn with_metrics(mut self, metrics: Arc<ExtractorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ExtractorMetrics> {
        &self.metrics
    }

    /// Run the pipeline, returning the number of records loaded
    pub async fn run(&self) -> Result<usize> {
        Ok(self.run_with_report().await?.loaded)
    }

    /// Run the pipeline and report per-stage counts
    ///
    /// The source is validated first. An empty extraction skips transform and
    /// load entirely.
    pub async fn run_with_report(&self) -> Result<PipelineReport> {
        let started = Instant::now();
        let name = self.extractor.metadata().name;
        log::info!("Starting ELT pipeline for {}", name);

        self.extractor.validate_source().await?;

        log::debug!("Extracting from source...");
        let items = match self.extractor.extract().await {
            Ok(items) => {
                self.metrics.record_success(&name, items.len());
                items
            }
            Err(e) => {
                self.metrics.record_failure(&name);
                log::error!("Extraction with {} failed: {}", name, e);
                return Err(e);
            }
        };
        log::info!("Extracted {} items", items.len());

        let mut report = PipelineReport {
            extracted: items.len(),
            extractor: name,
            ..Default::default()
        };

        if items.is_empty() {
            log::warn!("No items extracted, pipeline complete");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        log::debug!("Transforming items...");
        let transformed = self.transformer.transform_many(items)?;
        report.transformed = transformed.len();
        log::info!("Transformed {} items", report.transformed);

        log::debug!("Loading to destination...");
        report.loaded = self.loader.load(transformed).await?;
        report.elapsed = started.elapsed();
        log::info!(
            "Loaded {} items in {:.2}s",
            report.loaded,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockExtractor(Vec<i32>);

    impl Extractor for MockExtractor {
        type Item = i32;
        async fn extract(&self) -> Result<Vec<Self::Item>> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;

    impl Extractor for FailingExtractor {
        type Item = i32;
        async fn extract(&self) -> Result<Vec<Self::Item>> {
            Err(eyre::eyre!("source unavailable"))
        }
    }

    struct UnreachableSource;

    impl Extractor for UnreachableSource {
        type Item = i32;
        async fn validate_source(&self) -> Result<()> {
            Err(eyre::eyre!("connection refused"))
        }
        async fn extract(&self) -> Result<Vec<Self::Item>> {
            panic!("extract must not run after failed validation");
        }
    }

    struct DoubleTransformer;

    impl Transformer for DoubleTransformer {
        type Input = i32;
        type Output = i32;
        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            Ok(input * 2)
        }
    }

    struct SumLoader(Arc<Mutex<i32>>);

    #[async_trait]
    impl Loader for SumLoader {
        type Item = i32;
        async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
            *self.0.lock().unwrap() = items.iter().sum();
            Ok(items.len())
        }
    }

    #[tokio::test]
    async fn test_pipeline() {
        let result = Arc::new(Mutex::new(0));
        let pipeline = Pipeline::new(
            MockExtractor(vec![1, 2, 3]),
            DoubleTransformer,
            SumLoader(result.clone()),
        );

        let report = pipeline.run_with_report().await.unwrap();
        assert_eq!(report.extractor, "MockExtractor");
        assert_eq!(report.extracted, 3);
        assert_eq!(report.transformed, 3);
        assert_eq!(report.loaded, 3);
        assert_eq!(*result.lock().unwrap(), 12);
        assert_eq!(pipeline.metrics().snapshot().records, 3);
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let result = Arc::new(Mutex::new(-1));
        let pipeline = Pipeline::new(
            MockExtractor(vec![]),
            DoubleTransformer,
            SumLoader(result.clone()),
        );

        assert_eq!(pipeline.run().await.unwrap(), 0);
        // loader never ran
        assert_eq!(*result.lock().unwrap(), -1);
    }

    #[tokio::test]
    async fn test_extract_failure_counts() {
        let metrics = Arc::new(ExtractorMetrics::new());
        let pipeline = Pipeline::new(
            FailingExtractor,
            DoubleTransformer,
            SumLoader(Arc::new(Mutex::new(0))),
        )
        .with_metrics(metrics.clone());

        assert!(pipeline.run().await.is_err());
        assert!(pipeline.run().await.is_err());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.runs, 2);
    }

    #[tokio::test]
    async fn test_validation_aborts() {
        let pipeline = Pipeline::new(
            UnreachableSource,
            DoubleTransformer,
            SumLoader(Arc::new(Mutex::new(0))),
        );
        let err = pipeline.run().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(pipeline.metrics().snapshot().runs, 0);
    }
}
