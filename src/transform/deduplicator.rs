//! Batch-level deduplication by key field

use crate::etl::{Record, Transformer};
use eyre::Result;
use std::collections::HashMap;

/// Keeps the last record seen for each key value
///
/// Output order follows the first appearance of each key. Records without the
/// key field are never merged.
pub struct Deduplicator {
    key: String,
}

impl Deduplicator {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Transformer for Deduplicator {
    type Input = Record;
    type Output = Record;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }

    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        let before = inputs.len();
        let mut slots: Vec<Record> = Vec::with_capacity(before);
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in inputs {
            let key = record
                .get(&self.key)
                .filter(|v| !v.is_null())
                .map(|v| v.to_string());
            match key {
                Some(key) => match index.get(&key) {
                    Some(&slot) => slots[slot] = record,
                    None => {
                        index.insert(key, slots.len());
                        slots.push(record);
                    }
                },
                None => slots.push(record),
            }
        }

        if slots.len() < before {
            log::debug!(
                "Dropped {} duplicate records on '{}'",
                before - slots.len(),
                self.key
            );
        }
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keeps_last_in_first_position() {
        let dedupe = Deduplicator::new("id");
        let out = dedupe
            .transform_many(vec![
                json!({"id": 1, "v": "a"}),
                json!({"id": 2, "v": "b"}),
                json!({"id": 1, "v": "c"}),
                json!({"v": "no key"}),
                json!({"v": "no key"}),
            ])
            .unwrap();
        assert_eq!(
            out,
            vec![
                json!({"id": 1, "v": "c"}),
                json!({"id": 2, "v": "b"}),
                json!({"v": "no key"}),
                json!({"v": "no key"}),
            ]
        );
    }

    #[test]
    fn test_key_type_matters() {
        // "1" and 1 are different values
        let out = Deduplicator::new("id")
            .transform_many(vec![json!({"id": 1}), json!({"id": "1"})])
            .unwrap();
        assert_eq!(out.len(), 2);
    }
}
