//! Load metadata stamp
//!
//! Adds `_loaded_at` and `_source` so raw rows can be traced back to a run.

use crate::etl::{Record, Transformer};
use chrono::{DateTime, SecondsFormat, Utc};
use eyre::Result;
use serde_json::Value;

pub struct LoadStamp {
    source: String,
    loaded_at: String,
}

impl LoadStamp {
    /// Stamp with the current time
    pub fn new(source: impl Into<String>) -> Self {
        Self::at(source, Utc::now())
    }

    /// Stamp with a fixed time, every record in the batch shares it
    pub fn at(source: impl Into<String>, loaded_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            loaded_at: loaded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl Transformer for LoadStamp {
    type Input = Record;
    type Output = Record;

    fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
        if let Some(obj) = input.as_object_mut() {
            obj.insert("_loaded_at".to_string(), Value::String(self.loaded_at.clone()));
            obj.insert("_source".to_string(), Value::String(self.source.clone()));
        }
        Ok(input)
    }
}
