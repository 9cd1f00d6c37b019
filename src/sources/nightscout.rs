//! Nightscout CGM API extractor

use super::GlucoseData;
use crate::client::{ApiClient, Auth, ClientOptions};
use crate::error::WarehouseError;
use crate::etl::{Extractor, ExtractorMetadata, Record};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use eyre::Result;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Nightscout REST collections under `/api/v1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightscoutCollection {
    #[default]
    Entries,
    Treatments,
    #[serde(rename = "devicestatus")]
    DeviceStatus,
    Profile,
}

impl NightscoutCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entries => "entries",
            Self::Treatments => "treatments",
            Self::DeviceStatus => "devicestatus",
            Self::Profile => "profile",
        }
    }

    /// Field used for the date window, profiles are not windowed
    fn date_field(&self) -> Option<&'static str> {
        match self {
            Self::Entries => Some("dateString"),
            Self::Treatments | Self::DeviceStatus => Some("created_at"),
            Self::Profile => None,
        }
    }
}

pub struct NightscoutExtractor {
    client: ApiClient,
    collection: NightscoutCollection,
    lookback_hours: i64,
    record_limit: u32,
}

impl NightscoutExtractor {
    pub const DEFAULT_RECORD_LIMIT: u32 = 10_000;
    pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

    /// The secret, when given, is sent in the `api-secret` header
    pub fn try_new(
        base_url: Url,
        api_secret: Option<String>,
        collection: NightscoutCollection,
    ) -> Result<Self> {
        let auth = match api_secret {
            Some(secret) if !secret.is_empty() => Auth::ApiKey {
                header: "api-secret".to_string(),
                value: secret,
            },
            _ => Auth::None,
        };
        Ok(Self {
            client: ApiClient::try_new(base_url, auth, ClientOptions::default())?,
            collection,
            lookback_hours: Self::DEFAULT_LOOKBACK_HOURS,
            record_limit: Self::DEFAULT_RECORD_LIMIT,
        })
    }

    pub fn lookback_hours(mut self, hours: i64) -> Self {
        self.lookback_hours = hours;
        self
    }

    pub fn record_limit(mut self, limit: u32) -> Self {
        self.record_limit = limit;
        self
    }

    pub fn path(&self) -> String {
        format!("api/v1/{}.json", self.collection.as_str())
    }

    /// Query parameters for a window ending at `now`
    pub fn query_params(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let start = now - Duration::hours(self.lookback_hours);
        let iso = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self.collection.date_field() {
            Some("dateString") => {
                params.push(("find[dateString][$gte]", iso(start)));
                params.push(("find[dateString][$lte]", iso(now)));
            }
            Some(_) => {
                params.push(("find[created_at][$gte]", iso(start)));
                params.push(("find[created_at][$lte]", iso(now)));
            }
            None => {}
        }
        params.push(("count", self.record_limit.to_string()));
        params
    }

    /// Fetch entries and fold them into [`GlucoseData`]
    pub async fn glucose_data(&self) -> Result<Option<GlucoseData>> {
        if self.collection != NightscoutCollection::Entries {
            return Err(WarehouseError::Validation(
                "glucose data can only be built from the entries collection".to_string(),
            )
            .into());
        }
        let entries = self.extract().await?;
        Ok(GlucoseData::from_entries(&entries))
    }
}

impl Extractor for NightscoutExtractor {
    type Item = Record;

    async fn validate_source(&self) -> Result<()> {
        self.client.get_json("api/v1/status.json", &[]).await?;
        Ok(())
    }

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        let params = self.query_params(Utc::now());
        log::info!(
            "Extracting Nightscout {} for the last {}h (limit: {} records)",
            self.collection.as_str(),
            self.lookback_hours,
            self.record_limit
        );

        let response = self
            .client
            .get_json(&self.path(), &params)
            .await
            .map_err(|e| {
                WarehouseError::Extractor(format!(
                    "Failed to extract data from Nightscout API: {}",
                    e
                ))
            })?;
        match response {
            Value::Array(records) => {
                log::info!("Extracted {} {}", records.len(), self.collection.as_str());
                Ok(records)
            }
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }

    fn metadata(&self) -> ExtractorMetadata {
        ExtractorMetadata::new("nightscout")
            .with("nightscout_base_url", self.client.url())
            .with("collection", self.collection.as_str())
            .with("lookback_hours", self.lookback_hours)
            .with("record_limit", self.record_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor(collection: NightscoutCollection) -> NightscoutExtractor {
        NightscoutExtractor::try_new(
            Url::parse("https://cgm.example.com").unwrap(),
            Some("secret".into()),
            collection,
        )
        .unwrap()
    }

    #[test]
    fn test_entries_params() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
        let params = extractor(NightscoutCollection::Entries).query_params(now);
        assert_eq!(
            params,
            vec![
                ("find[dateString][$gte]", "2024-06-01T12:00:00.000Z".to_string()),
                ("find[dateString][$lte]", "2024-06-02T12:00:00.000Z".to_string()),
                ("count", "10000".to_string()),
            ]
        );
    }

    #[test]
    fn test_treatment_params() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
        let params = extractor(NightscoutCollection::Treatments)
            .lookback_hours(2)
            .record_limit(50)
            .query_params(now);
        assert_eq!(params[0].0, "find[created_at][$gte]");
        assert_eq!(params[0].1, "2024-06-02T10:00:00.000Z");
        assert_eq!(params[2], ("count", "50".to_string()));
    }

    #[test]
    fn test_profile_has_no_window() {
        let params = extractor(NightscoutCollection::Profile).query_params(Utc::now());
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_metadata_and_path() {
        let ex = extractor(NightscoutCollection::DeviceStatus);
        assert_eq!(ex.path(), "api/v1/devicestatus.json");
        let meta = ex.metadata();
        assert_eq!(meta.details["nightscout_base_url"], "https://cgm.example.com/");
        assert_eq!(meta.details["lookback_hours"], "24");
    }
}
