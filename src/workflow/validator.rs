use super::config::validate_name;
use super::definition::{SourceSpec, TargetSpec, TransformSpec, WorkflowDefinition};
use crate::error::WarehouseError;
use crate::storage::validate_identifier;
use eyre::Result;

/// Static checks on a workflow definition before it is registered
pub struct WorkflowValidator;

impl WorkflowValidator {
    /// Every problem found, empty when the definition is valid
    pub fn problems(definition: &WorkflowDefinition) -> Vec<String> {
        let mut problems = Vec::new();
        let mut check = |result: Result<()>| {
            if let Err(e) = result {
                problems.push(e.to_string());
            }
        };

        check(validate_name(&definition.name));
        check(
            semver::Version::parse(&definition.version)
                .map(|_| ())
                .map_err(|e| eyre::eyre!("invalid version '{}': {}", definition.version, e)),
        );
        if let Some(domain) = &definition.domain {
            check(validate_identifier(domain).map_err(|_| eyre::eyre!("invalid domain '{}'", domain)));
        }

        match &definition.source {
            None => problems.push("a source is required".to_string()),
            Some(SourceSpec::File { path, .. }) if path.as_os_str().is_empty() => {
                problems.push("file source needs a path".to_string())
            }
            Some(SourceSpec::Postgres { table }) => {
                if let Err(e) = validate_identifier(table) {
                    problems.push(e.to_string());
                }
            }
            Some(SourceSpec::Api { endpoint, .. }) if endpoint.trim().is_empty() => {
                problems.push("api source needs an endpoint".to_string())
            }
            Some(_) => {}
        }

        let nightscout_source = matches!(definition.source, Some(SourceSpec::Nightscout { .. }));
        for (i, transform) in definition.transforms.iter().enumerate() {
            match transform {
                TransformSpec::Deduplicate { key } if key.trim().is_empty() => {
                    problems.push(format!("transform {} (deduplicate) needs a key", i + 1))
                }
                TransformSpec::DropFields { fields } if fields.is_empty() => {
                    problems.push(format!("transform {} (drop_fields) lists no fields", i + 1))
                }
                TransformSpec::Nightscout if !nightscout_source => problems.push(format!(
                    "transform {} (nightscout) needs a nightscout source",
                    i + 1
                )),
                _ => {}
            }
        }

        match &definition.target {
            None => problems.push("a target is required".to_string()),
            Some(TargetSpec::Postgres { table }) => {
                if let Err(e) = validate_identifier(table) {
                    problems.push(e.to_string());
                }
            }
            Some(TargetSpec::Ndjson { .. }) => {}
        }

        problems
    }

    pub fn validate(definition: &WorkflowDefinition) -> Result<()> {
        let problems = Self::problems(definition);
        if problems.is_empty() {
            Ok(())
        } else {
            let name = if definition.name.is_empty() {
                "<unnamed>"
            } else {
                &definition.name
            };
            Err(WarehouseError::Validation(format!(
                "workflow '{}': {}",
                name,
                problems.join("; ")
            ))
            .into())
        }
    }
}
