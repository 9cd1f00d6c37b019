//! Markdown reference pages for workflow definitions

use super::LocatedDefinition;
use super::definition::{SourceSpec, TargetSpec, TransformSpec};
use eyre::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

fn describe_source(source: &SourceSpec) -> String {
    match source {
        SourceSpec::Api {
            base_url, endpoint, ..
        } => format!("API `{}/{}`", base_url.trim_end_matches('/'), endpoint),
        SourceSpec::File { path, format } => match format {
            Some(format) => format!("{} file `{}`", format, path.display()),
            None => format!("file `{}`", path.display()),
        },
        SourceSpec::Postgres { table } => format!("PostgreSQL table `{}`", table),
        SourceSpec::Nightscout {
            base_url,
            collection,
            lookback_hours,
            ..
        } => format!(
            "Nightscout `{}` from `{}`, last {}h",
            collection.as_str(),
            base_url,
            lookback_hours
        ),
    }
}

fn describe_transform(transform: &TransformSpec) -> String {
    match transform {
        TransformSpec::DropFields { fields } => format!("drop fields: {}", fields.join(", ")),
        TransformSpec::Deduplicate { key } => format!("deduplicate on `{}`", key),
        TransformSpec::Normalize {
            trim,
            title_case,
            digits_only,
        } => {
            let mut parts = Vec::new();
            if *trim {
                parts.push("trim strings".to_string());
            }
            if !title_case.is_empty() {
                parts.push(format!("title case {}", title_case.join(", ")));
            }
            if !digits_only.is_empty() {
                parts.push(format!("digits only {}", digits_only.join(", ")));
            }
            format!("normalize ({})", parts.join("; "))
        }
        TransformSpec::Stamp { source } => match source {
            Some(source) => format!("stamp load metadata as `{}`", source),
            None => "stamp load metadata".to_string(),
        },
        TransformSpec::Nightscout => "Nightscout field mapping".to_string(),
    }
}

fn describe_target(target: &TargetSpec) -> String {
    match target {
        TargetSpec::Postgres { table } => format!("PostgreSQL table `{}`", table),
        TargetSpec::Ndjson { path } => format!("NDJSON file `{}`", path.display()),
    }
}

/// Render one page covering every definition, grouped by domain
pub fn render_markdown(definitions: &[LocatedDefinition]) -> String {
    let mut by_domain: BTreeMap<&str, Vec<&LocatedDefinition>> = BTreeMap::new();
    for located in definitions {
        by_domain.entry(located.domain()).or_default().push(located);
    }

    let mut out = String::from("# Workflows\n");
    if by_domain.is_empty() {
        out.push_str("\nNo workflows defined.\n");
        return out;
    }

    for (domain, mut entries) in by_domain {
        entries.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));
        let _ = write!(out, "\n## {}\n", domain);
        for located in entries {
            let def = &located.definition;
            let _ = write!(out, "\n### {}.{}\n\n", domain, def.name.to_lowercase());
            if !def.description.is_empty() {
                let _ = writeln!(out, "{}\n", def.description);
            }
            let _ = writeln!(out, "| | |\n|---|---|");
            let _ = writeln!(out, "| Version | {} |", def.version);
            let _ = writeln!(out, "| Enabled | {} |", if def.enabled { "yes" } else { "no" });
            if let Some(source) = &def.source {
                let _ = writeln!(out, "| Source | {} |", describe_source(source));
            }
            if let Some(target) = &def.target {
                let _ = writeln!(out, "| Target | {} |", describe_target(target));
            }
            let _ = writeln!(out, "| File | `{}` |", located.path.display());

            if !def.transforms.is_empty() {
                out.push_str("\nTransforms:\n\n");
                for (i, transform) in def.transforms.iter().enumerate() {
                    let _ = writeln!(out, "{}. {}", i + 1, describe_transform(transform));
                }
            }
        }
    }
    out
}

/// Write `workflows.md` into `output_dir`
pub fn write_markdown(definitions: &[LocatedDefinition], output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let path = output_dir.join("workflows.md");
    std::fs::write(&path, render_markdown(definitions))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowDefinition;
    use tempfile::TempDir;

    fn located(dir_domain: &str, yaml: &str) -> LocatedDefinition {
        LocatedDefinition {
            path: PathBuf::from(format!("workflows/{}/x.yml", dir_domain)),
            directory_domain: dir_domain.to_string(),
            definition: WorkflowDefinition::from_yaml(yaml).unwrap(),
        }
    }

    #[test]
    fn test_render() {
        let defs = vec![
            located(
                "health",
                "name: glucose\ndescription: CGM readings\nsource:\n  type: nightscout\n  base_url: https://ns.example.com\ntransforms:\n  - type: nightscout\n  - type: deduplicate\n    key: _id\ntarget:\n  type: postgres\n  table: nightscout_entries\n",
            ),
            located(
                "misc",
                "name: customers\ndomain: crm\nenabled: false\nsource:\n  type: api\n  base_url: https://crm.example.com/api/\n  endpoint: customers\ntarget:\n  type: ndjson\n  path: out/customers.ndjson\n",
            ),
        ];
        let md = render_markdown(&defs);

        let crm = md.find("## crm").unwrap();
        let health = md.find("## health").unwrap();
        assert!(crm < health);
        assert!(md.contains("### health.glucose"));
        assert!(md.contains("CGM readings"));
        assert!(md.contains("| Source | Nightscout `entries` from `https://ns.example.com`, last 24h |"));
        assert!(md.contains("2. deduplicate on `_id`"));
        assert!(md.contains("| Source | API `https://crm.example.com/api/customers` |"));
        assert!(md.contains("| Enabled | no |"));
    }

    #[test]
    fn test_write_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_markdown(&[], &dir.path().join("docs")).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("No workflows defined."));
    }
}
