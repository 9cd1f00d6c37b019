//! Nightscout record normalization
//!
//! Entries (CGM readings) get snake_case keys and an mmol/L value. Treatments
//! are reduced to the fields that matter for their event type.

use crate::etl::{Record, Transformer};
use eyre::Result;
use serde_json::{Map, Value, json};

const MGDL_PER_MMOL: f64 = 18.0;

pub struct NightscoutTransformer;

fn number(record: &Map<String, Value>, key: &str) -> f64 {
    match record.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn integer(record: &Map<String, Value>, key: &str) -> i64 {
    number(record, key) as i64
}

fn field(record: &Map<String, Value>, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

impl NightscoutTransformer {
    fn is_entry(record: &Map<String, Value>) -> bool {
        record.contains_key("sgv")
    }

    fn is_treatment(record: &Map<String, Value>) -> bool {
        record.contains_key("eventType")
    }

    fn transform_entry(mut entry: Map<String, Value>) -> Map<String, Value> {
        for (from, to) in [("_id", "id"), ("sysTime", "sys_time"), ("utcOffset", "utc_offset")] {
            if let Some(value) = entry.remove(from) {
                entry.insert(to.to_string(), value);
            }
        }
        if let Some(sgv) = entry.get("sgv").and_then(Value::as_f64) {
            let mmol = (sgv / MGDL_PER_MMOL * 10.0).round() / 10.0;
            entry.insert("sgv_mmol".to_string(), json!(mmol));
        }
        entry
    }

    fn transform_treatment(treatment: Map<String, Value>) -> Map<String, Value> {
        let kind = treatment
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();

        let mut out = Map::new();
        out.insert("id".into(), field(&treatment, "_id"));
        out.insert("type".into(), json!(kind));
        out.insert("created_at".into(), field(&treatment, "created_at"));
        out.insert("enteredBy".into(), field(&treatment, "enteredBy"));
        out.insert("notes".into(), field(&treatment, "notes"));

        match kind.as_str() {
            "bolus" => {
                out.insert("insulin".into(), json!(number(&treatment, "insulin")));
                out.insert("duration".into(), json!(integer(&treatment, "duration")));
            }
            "carbs" => {
                out.insert("carbs".into(), json!(number(&treatment, "carbs")));
            }
            "combo bolus" => {
                out.insert("insulin".into(), json!(number(&treatment, "insulin")));
                out.insert("carbs".into(), json!(number(&treatment, "carbs")));
            }
            "temp basal" => {
                out.insert("rate".into(), json!(number(&treatment, "rate")));
                out.insert("duration".into(), json!(integer(&treatment, "duration")));
                out.insert("percent".into(), json!(integer(&treatment, "percent")));
                out.insert("absolute".into(), json!(number(&treatment, "absolute")));
            }
            "site change" | "sensor change" => {
                out.insert("device".into(), field(&treatment, "device"));
            }
            "announcement" => {}
            "exercise" => {
                out.insert("duration".into(), json!(integer(&treatment, "duration")));
            }
            _ => {
                for (key, value) in treatment {
                    if key != "_id" && !out.contains_key(&key) {
                        out.insert(key, value);
                    }
                }
            }
        }
        out
    }
}

impl Transformer for NightscoutTransformer {
    type Input = Record;
    type Output = Record;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(match input {
            Value::Object(obj) if Self::is_entry(&obj) => Value::Object(Self::transform_entry(obj)),
            Value::Object(obj) if Self::is_treatment(&obj) => {
                Value::Object(Self::transform_treatment(obj))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry() {
        let out = NightscoutTransformer
            .transform(json!({
                "_id": "e1",
                "sgv": 100,
                "sysTime": "2024-01-01T00:00:00Z",
                "utcOffset": 60,
                "direction": "Flat"
            }))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "id": "e1",
                "sgv": 100,
                "sys_time": "2024-01-01T00:00:00Z",
                "utc_offset": 60,
                "direction": "Flat",
                "sgv_mmol": 5.6
            })
        );
    }

    #[test]
    fn test_bolus_and_temp_basal() {
        let bolus = NightscoutTransformer
            .transform(json!({"_id": "t1", "eventType": "Bolus", "insulin": "2.5", "extra": 1}))
            .unwrap();
        assert_eq!(bolus["type"], "bolus");
        assert_eq!(bolus["insulin"], 2.5);
        assert_eq!(bolus["duration"], 0);
        assert!(bolus.get("extra").is_none());

        let basal = NightscoutTransformer
            .transform(json!({"eventType": "Temp Basal", "rate": 0.8, "duration": 30, "percent": -20}))
            .unwrap();
        assert_eq!(basal["type"], "temp basal");
        assert_eq!(basal["rate"], 0.8);
        assert_eq!(basal["duration"], 30);
        assert_eq!(basal["percent"], -20);
        assert_eq!(basal["absolute"], 0.0);
    }

    #[test]
    fn test_unknown_treatment_copies_fields() {
        let out = NightscoutTransformer
            .transform(json!({"_id": "t9", "eventType": "Note", "glucose": 140, "units": "mg/dl"}))
            .unwrap();
        assert_eq!(out["id"], "t9");
        assert_eq!(out["type"], "note");
        assert_eq!(out["glucose"], 140);
        assert_eq!(out["units"], "mg/dl");
        assert_eq!(out["eventType"], "Note");
        assert!(out.get("_id").is_none());
    }

    #[test]
    fn test_other_records_unchanged() {
        let status = json!({"_id": "d1", "uploaderBattery": 80});
        assert_eq!(NightscoutTransformer.transform(status.clone()).unwrap(), status);
    }
}
