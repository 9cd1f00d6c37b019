//! Transformer trait for reshaping records

use super::Record;
use eyre::Result;

/// Transformer trait for transforming data items
///
/// # Example
/// ```no_run
/// use data_warehouse::etl::Transformer;
/// use eyre::Result;
///
/// struct Uppercase;
///
/// impl Transformer for Uppercase {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.to_uppercase())
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform a batch of items
    ///
    /// Batch-level transformers (deduplication) override this.
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}

/// Identity transformer that passes items through unchanged
pub struct IdentityTransformer<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for IdentityTransformer<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> IdentityTransformer<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + Sync> Transformer for IdentityTransformer<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}

type RecordTransformer = Box<dyn Transformer<Input = Record, Output = Record>>;

/// Ordered list of record transformers applied batch by batch
#[derive(Default)]
pub struct TransformerChain {
    steps: Vec<RecordTransformer>,
}

impl TransformerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T>(&mut self, step: T)
    where
        T: Transformer<Input = Record, Output = Record> + 'static,
    {
        self.steps.push(Box::new(step));
    }

    pub fn with<T>(mut self, step: T) -> Self
    where
        T: Transformer<Input = Record, Output = Record> + 'static,
    {
        self.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transformer for TransformerChain {
    type Input = Record;
    type Output = Record;

    fn transform(&self, input: Record) -> Result<Record> {
        self.steps
            .iter()
            .try_fold(input, |record, step| step.transform(record))
    }

    fn transform_many(&self, inputs: Vec<Record>) -> Result<Vec<Record>> {
        self.steps
            .iter()
            .try_fold(inputs, |records, step| step.transform_many(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AddField(&'static str);

    impl Transformer for AddField {
        type Input = Record;
        type Output = Record;

        fn transform(&self, mut input: Record) -> Result<Record> {
            if let Some(obj) = input.as_object_mut() {
                obj.insert(self.0.to_string(), json!(true));
            }
            Ok(input)
        }
    }

    #[test]
    fn test_identity_transformer() {
        let transformer = IdentityTransformer::<i32>::new();
        let input = vec![1, 2, 3];
        let output = transformer.transform_many(input.clone()).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = TransformerChain::new().with(AddField("a")).with(AddField("b"));
        assert_eq!(chain.len(), 2);

        let out = chain.transform_many(vec![json!({"id": 1})]).unwrap();
        assert_eq!(out, vec![json!({"id": 1, "a": true, "b": true})]);
    }

    #[test]
    fn test_empty_chain_is_passthrough() {
        let chain = TransformerChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.transform(json!({"x": 1})).unwrap(), json!({"x": 1}));
    }
}
