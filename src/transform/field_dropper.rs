//! Field dropper transformer
//!
//! Removes top-level fields that should not reach the warehouse, such as
//! secrets or bulky blobs.

use crate::etl::{Record, Transformer};
use eyre::Result;

/// Transformer that drops specified fields from objects
///
/// # Example
/// ```
/// use data_warehouse::transform::FieldDropper;
/// use data_warehouse::etl::Transformer;
/// use serde_json::json;
///
/// let dropper = FieldDropper::new(["password", "_internal"]);
/// let output = dropper
///     .transform(json!({"id": 1, "password": "x", "_internal": {}}))
///     .unwrap();
/// assert_eq!(output, json!({"id": 1}));
/// ```
pub struct FieldDropper {
    fields: Vec<String>,
}

impl FieldDropper {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Transformer for FieldDropper {
    type Input = Record;
    type Output = Record;

    fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
        if let Some(obj) = input.as_object_mut() {
            for field in &self.fields {
                obj.remove(field);
            }
        }
        Ok(input)
    }
}
