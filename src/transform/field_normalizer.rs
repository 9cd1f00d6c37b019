//! String cleanup for contact-style fields

use crate::etl::{Record, Transformer};
use eyre::Result;
use serde_json::Value;

/// Normalizes string fields
///
/// - `trim`: strip surrounding whitespace from every top-level string
/// - `title_case`: `"ada LOVELACE"` becomes `"Ada Lovelace"`
/// - `digits_only`: keep only ASCII digits, for phone numbers
#[derive(Default)]
pub struct FieldNormalizer {
    trim: bool,
    title_case: Vec<String>,
    digits_only: Vec<String>,
}

impl FieldNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn title_case<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.title_case = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn digits_only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.digits_only = fields.into_iter().map(Into::into).collect();
        self
    }
}

fn to_title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl Transformer for FieldNormalizer {
    type Input = Record;
    type Output = Record;

    fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
        let Some(obj) = input.as_object_mut() else {
            return Ok(input);
        };

        if self.trim {
            for value in obj.values_mut() {
                if let Value::String(s) = value {
                    let trimmed = s.trim();
                    if trimmed.len() != s.len() {
                        *s = trimmed.to_string();
                    }
                }
            }
        }
        for field in &self.title_case {
            if let Some(Value::String(s)) = obj.get_mut(field) {
                *s = to_title_case(s);
            }
        }
        for field in &self.digits_only {
            if let Some(Value::String(s)) = obj.get_mut(field) {
                s.retain(|c| c.is_ascii_digit());
            }
        }
        Ok(input)
    }
}
