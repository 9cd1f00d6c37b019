use crate::error::WarehouseError;
use eyre::Result;
use serde::{Deserialize, Serialize};

/// Identity and switches shared by every workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub domain: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_enabled() -> bool {
    true
}

impl WorkflowConfig {
    /// Build a validated config, the name is lowercased
    pub fn new(name: &str, domain: &str) -> Result<Self> {
        Self {
            name: name.to_string(),
            version: default_version(),
            description: String::new(),
            domain: domain.to_string(),
            enabled: true,
        }
        .validated()
    }

    /// Check the name and version, normalizing the name to lowercase
    pub fn validated(mut self) -> Result<Self> {
        validate_name(&self.name)?;
        if self.domain.trim().is_empty() || self.domain.contains(char::is_whitespace) {
            return Err(WarehouseError::Validation(format!(
                "Workflow domain '{}' must be a single word",
                self.domain
            ))
            .into());
        }
        semver::Version::parse(&self.version).map_err(|e| {
            WarehouseError::Validation(format!("Invalid workflow version '{}': {}", self.version, e))
        })?;
        self.name = self.name.to_lowercase();
        Ok(self)
    }

    /// `domain.name`
    pub fn id(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(WarehouseError::Validation("Workflow name cannot be empty".to_string()).into());
    }
    if name.contains(' ') {
        return Err(WarehouseError::Validation(format!(
            "Workflow name cannot contain spaces: '{}'",
            name
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_lowercased() {
        let config = WorkflowConfig::new("Daily_Glucose", "nightscout").unwrap();
        assert_eq!(config.name, "daily_glucose");
        assert_eq!(config.id(), "nightscout.daily_glucose");
        assert_eq!(config.version, "0.1.0");
        assert!(config.enabled);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(WorkflowConfig::new("", "crm").is_err());
        assert!(WorkflowConfig::new("   ", "crm").is_err());
        assert!(WorkflowConfig::new("daily load", "crm").is_err());
        assert!(WorkflowConfig::new("daily", "").is_err());

        let mut config = WorkflowConfig::new("daily", "crm").unwrap();
        config.version = "one".into();
        assert!(config.validated().is_err());
    }
}
