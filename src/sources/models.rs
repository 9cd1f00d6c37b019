//! Typed views of Nightscout records

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single CGM glucose reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub timestamp: DateTime<Utc>,
    /// mg/dL
    pub glucose: f64,
    pub device: String,
    /// `sgv`, `mbg`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub direction: Option<String>,
    pub noise: Option<i64>,
    pub filtered: Option<f64>,
    pub unfiltered: Option<f64>,
    pub rssi: Option<i64>,
}

impl GlucoseReading {
    /// Build a reading from a raw Nightscout entry
    ///
    /// `date` (epoch milliseconds) is preferred over `dateString`. Entries
    /// without a glucose value or timestamp yield `None`.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let glucose = entry.get("sgv").or_else(|| entry.get("mbg"))?.as_f64()?;
        let timestamp = entry
            .get("date")
            .and_then(Value::as_i64)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .or_else(|| {
                entry
                    .get("dateString")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
            })?;

        let text = |key: &str| entry.get(key).and_then(Value::as_str).map(String::from);
        Some(Self {
            timestamp,
            glucose,
            device: text("device").unwrap_or_else(|| "unknown".to_string()),
            kind: text("type").unwrap_or_else(|| "sgv".to_string()),
            direction: text("direction"),
            noise: entry.get("noise").and_then(Value::as_i64),
            filtered: entry.get("filtered").and_then(Value::as_f64),
            unfiltered: entry.get("unfiltered").and_then(Value::as_f64),
            rssi: entry.get("rssi").and_then(Value::as_i64),
        })
    }
}

/// Readings over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseData {
    pub readings: Vec<GlucoseReading>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub device_info: Map<String, Value>,
}

impl GlucoseData {
    /// Collect readings from raw entries, sorted by time
    ///
    /// Returns `None` when no entry holds a usable reading.
    pub fn from_entries(entries: &[Value]) -> Option<Self> {
        let mut readings: Vec<GlucoseReading> =
            entries.iter().filter_map(GlucoseReading::from_entry).collect();
        if readings.is_empty() {
            return None;
        }
        readings.sort_by_key(|r| r.timestamp);

        let mut device_info = Map::new();
        for reading in &readings {
            let count = device_info
                .entry(reading.device.clone())
                .or_insert(Value::from(0u64));
            *count = Value::from(count.as_u64().unwrap_or(0) + 1);
        }

        Some(Self {
            start_time: readings[0].timestamp,
            end_time: readings[readings.len() - 1].timestamp,
            readings,
            device_info,
        })
    }
}
