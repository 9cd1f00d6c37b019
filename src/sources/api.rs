use crate::client::ApiClient;
use crate::error::WarehouseError;
use crate::etl::{Extractor, ExtractorMetadata, Record};
use eyre::Result;
use serde_json::Value;

/// Pulls an array of records from a JSON endpoint
///
/// With a `records_key` the records are read from that member of the response
/// object (`{"customers": [...]}`), otherwise the response must be an array.
pub struct ApiExtractor {
    client: ApiClient,
    endpoint: String,
    records_key: Option<String>,
    query: Vec<(String, String)>,
}

impl ApiExtractor {
    pub fn new(client: ApiClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            records_key: None,
            query: Vec::new(),
        }
    }

    pub fn records_key(mut self, key: impl Into<String>) -> Self {
        self.records_key = Some(key.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    fn unwrap_records(&self, response: Value) -> Result<Vec<Record>> {
        let shape_error = |what: &str| -> eyre::Report {
            WarehouseError::Validation(format!(
                "invalid {} data format: {}",
                self.endpoint, what
            ))
            .into()
        };

        match (&self.records_key, response) {
            (Some(key), Value::Object(mut obj)) => match obj.remove(key) {
                Some(Value::Array(items)) => Ok(items),
                Some(_) => Err(shape_error(&format!("'{}' is not an array", key))),
                None => Err(shape_error(&format!("missing '{}'", key))),
            },
            (Some(_), _) => Err(shape_error("expected an object")),
            (None, Value::Array(items)) => Ok(items),
            (None, _) => Err(shape_error("expected an array")),
        }
    }
}

impl Extractor for ApiExtractor {
    type Item = Record;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        log::info!("Fetching {} from {}", self.endpoint, self.client.url());
        let query: Vec<(&str, String)> = self
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        let response = self.client.get_json(&self.endpoint, &query).await?;
        self.unwrap_records(response)
    }

    fn metadata(&self) -> ExtractorMetadata {
        let meta = ExtractorMetadata::new("api")
            .with("base_url", self.client.url())
            .with("endpoint", &self.endpoint);
        match &self.records_key {
            Some(key) => meta.with("records_key", key),
            None => meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Auth, ClientOptions};
    use serde_json::json;
    use url::Url;

    fn extractor(records_key: Option<&str>) -> ApiExtractor {
        let client = ApiClient::try_new(
            Url::parse("http://localhost:1/api").unwrap(),
            Auth::None,
            ClientOptions::default(),
        )
        .unwrap();
        let extractor = ApiExtractor::new(client, "customers");
        match records_key {
            Some(key) => extractor.records_key(key),
            None => extractor,
        }
    }

    #[test]
    fn test_records_key() {
        let records = extractor(Some("customers"))
            .unwrap_records(json!({"customers": [{"id": 1}, {"id": 2}], "page": 1}))
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_bare_array() {
        let records = extractor(None).unwrap_records(json!([{"id": 1}])).unwrap();
        assert_eq!(records, vec![json!({"id": 1})]);
    }

    #[test]
    fn test_bad_shapes() {
        assert!(extractor(Some("customers")).unwrap_records(json!({"orders": []})).is_err());
        assert!(extractor(Some("customers")).unwrap_records(json!({"customers": {}})).is_err());
        let err = extractor(None).unwrap_records(json!({"id": 1})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WarehouseError>(),
            Some(WarehouseError::Validation(_))
        ));
    }

    #[test]
    fn test_metadata() {
        let meta = extractor(Some("customers")).metadata();
        assert_eq!(meta.name, "api");
        assert_eq!(meta.details["endpoint"], "customers");
        assert_eq!(meta.details["base_url"], "http://localhost:1/api/");
    }
}
