//! Finds workflow definitions on disk and keeps the registry in sync
//!
//! Layout: `<workflows_dir>/<domain>/<name>.yml`. Files and directories whose
//! names start with `_` or `.` are ignored. A definition's own `domain` wins
//! over its directory, and files at the top level fall back to
//! [`DEFAULT_DOMAIN`].

use super::{DefinedWorkflow, WorkflowDefinition, WorkflowRegistry, WorkflowResources};
use crate::error::WarehouseError;
use eyre::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_DOMAIN: &str = "default";

/// A parsed definition and where it came from
#[derive(Debug, Clone)]
pub struct LocatedDefinition {
    pub path: PathBuf,
    /// Domain implied by the directory layout
    pub directory_domain: String,
    pub definition: WorkflowDefinition,
}

impl LocatedDefinition {
    pub fn domain(&self) -> &str {
        self.definition
            .domain
            .as_deref()
            .unwrap_or(&self.directory_domain)
    }
}

/// Outcome of one discovery pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl DiscoveryReport {
    pub fn changed(&self) -> bool {
        !self.registered.is_empty() || !self.removed.is_empty()
    }
}

pub struct WorkflowDiscovery {
    root: PathBuf,
    resources: Arc<WorkflowResources>,
    mtimes: HashMap<PathBuf, SystemTime>,
    ids: HashMap<PathBuf, String>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('_') || name.starts_with('.'))
}

fn is_definition(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl WorkflowDiscovery {
    pub fn new(root: impl AsRef<Path>, resources: Arc<WorkflowResources>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            resources,
            mtimes: HashMap::new(),
            ids: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Definition files under the root, sorted by path
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(WarehouseError::Discovery(format!(
                "workflows directory not found: {}",
                self.root.display()
            ))
            .into());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.map_err(|e| WarehouseError::Discovery(e.to_string()))?;
            if entry.file_type().is_file() && is_definition(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn directory_domain(&self, path: &Path) -> String {
        path.parent()
            .filter(|parent| *parent != self.root)
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            .unwrap_or(DEFAULT_DOMAIN)
            .to_string()
    }

    fn locate(&self, path: &Path) -> Result<LocatedDefinition> {
        Ok(LocatedDefinition {
            path: path.to_path_buf(),
            directory_domain: self.directory_domain(path),
            definition: WorkflowDefinition::from_path(path)?,
        })
    }

    /// Parse every definition, collecting failures instead of stopping
    pub fn definitions(&self) -> Result<(Vec<LocatedDefinition>, Vec<(PathBuf, String)>)> {
        let mut found = Vec::new();
        let mut errors = Vec::new();
        for path in self.scan()? {
            match self.locate(&path) {
                Ok(located) => found.push(located),
                Err(e) => errors.push((path, format!("{:#}", e))),
            }
        }
        Ok((found, errors))
    }

    /// True when a file was added, removed or modified since the last pass
    pub fn has_changes(&self) -> Result<bool> {
        let files = self.scan()?;
        if files.len() != self.mtimes.len() {
            return Ok(true);
        }
        Ok(files
            .iter()
            .any(|path| self.mtimes.get(path).copied() != modified(path)))
    }

    /// Register new and modified definitions, drop deleted ones
    pub fn discover(&mut self, registry: &mut WorkflowRegistry) -> Result<DiscoveryReport> {
        let files = self.scan()?;
        let mut report = DiscoveryReport::default();

        let gone: Vec<PathBuf> = self
            .mtimes
            .keys()
            .filter(|path| !files.contains(path))
            .cloned()
            .collect();
        for path in gone {
            self.mtimes.remove(&path);
            if let Some(id) = self.ids.remove(&path)
                && registry.unregister(&id).is_some()
            {
                log::info!("Removed workflow {} ({} deleted)", id, path.display());
                report.removed.push(id);
            }
        }

        for path in files {
            let mtime = modified(&path);
            if mtime.is_some() && self.mtimes.get(&path).copied() == mtime {
                report.unchanged += 1;
                continue;
            }
            if let Some(mtime) = mtime {
                self.mtimes.insert(path.clone(), mtime);
            }

            match self.build(&path) {
                Ok(workflow) => {
                    let id = registry.register(workflow);
                    if let Some(previous) = self.ids.insert(path.clone(), id.clone())
                        && previous != id
                        && registry.unregister(&previous).is_some()
                    {
                        report.removed.push(previous);
                    }
                    report.registered.push(id);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {:#}", path.display(), e);
                    // an invalid edit retires the version registered from this file
                    if let Some(previous) = self.ids.remove(&path)
                        && registry.unregister(&previous).is_some()
                    {
                        log::info!("Removed workflow {} ({} is invalid)", previous, path.display());
                        report.removed.push(previous);
                    }
                    report.errors.push((path, format!("{:#}", e)));
                }
            }
        }

        log::debug!(
            "Discovery: {} registered, {} removed, {} unchanged, {} errors",
            report.registered.len(),
            report.removed.len(),
            report.unchanged,
            report.errors.len()
        );
        Ok(report)
    }

    fn build(&self, path: &Path) -> Result<Arc<DefinedWorkflow>> {
        let located = self.locate(path)?;
        let domain = located.directory_domain.clone();
        Ok(Arc::new(DefinedWorkflow::new(
            located.definition,
            &domain,
            self.resources.clone(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::tests::resources;
    use std::fs;
    use tempfile::TempDir;

    fn definition(name: &str) -> String {
        format!(
            "name: {}\nsource:\n  type: file\n  path: in/{}.csv\ntarget:\n  type: ndjson\n  path: out/{}.ndjson\n",
            name, name, name
        )
    }

    fn layout() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("workflows");
        fs::create_dir_all(root.join("crm")).unwrap();
        fs::create_dir_all(root.join("_drafts")).unwrap();
        fs::create_dir_all(root.join("health")).unwrap();
        fs::write(root.join("crm/customers.yml"), definition("customers")).unwrap();
        fs::write(root.join("crm/_old_customers.yml"), definition("old")).unwrap();
        fs::write(root.join("crm/notes.txt"), "not a workflow").unwrap();
        fs::write(root.join("_drafts/draft.yml"), definition("draft")).unwrap();
        fs::write(root.join("health/glucose.yaml"), definition("glucose")).unwrap();
        fs::write(root.join("adhoc.yml"), definition("adhoc")).unwrap();
        dir
    }

    #[test]
    fn test_scan_skips_private_files() {
        let dir = layout();
        let discovery = WorkflowDiscovery::new(dir.path().join("workflows"), resources(dir.path()));
        let names: Vec<String> = discovery
            .scan()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["adhoc.yml", "customers.yml", "glucose.yaml"]);
    }

    #[test]
    fn test_discover_registers_by_domain() {
        let dir = layout();
        let mut discovery =
            WorkflowDiscovery::new(dir.path().join("workflows"), resources(dir.path()));
        let mut registry = WorkflowRegistry::new();

        let report = discovery.discover(&mut registry).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(
            registry.ids(),
            vec!["crm.customers", "default.adhoc", "health.glucose"]
        );

        let again = discovery.discover(&mut registry).unwrap();
        assert!(!again.changed());
        assert_eq!(again.unchanged, 3);
        assert!(!discovery.has_changes().unwrap());
    }

    #[test]
    fn test_rediscover_on_change() {
        let dir = layout();
        let root = dir.path().join("workflows");
        let mut discovery = WorkflowDiscovery::new(&root, resources(dir.path()));
        let mut registry = WorkflowRegistry::new();
        discovery.discover(&mut registry).unwrap();

        // rename inside the file and push the mtime forward
        let path = root.join("crm/customers.yml");
        fs::write(&path, definition("clients")).unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        fs::remove_file(root.join("adhoc.yml")).unwrap();
        assert!(discovery.has_changes().unwrap());

        let report = discovery.discover(&mut registry).unwrap();
        assert_eq!(report.registered, vec!["crm.clients"]);
        assert_eq!(report.removed.len(), 2);
        assert!(report.removed.contains(&"default.adhoc".to_string()));
        assert!(report.removed.contains(&"crm.customers".to_string()));
        assert_eq!(registry.ids(), vec!["crm.clients", "health.glucose"]);
    }

    #[test]
    fn test_invalid_file_reported() {
        let dir = layout();
        let root = dir.path().join("workflows");
        fs::write(root.join("crm/broken.yml"), "name: [unclosed").unwrap();
        let mut discovery = WorkflowDiscovery::new(&root, resources(dir.path()));
        let mut registry = WorkflowRegistry::new();

        let report = discovery.discover(&mut registry).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].0.ends_with("crm/broken.yml"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_invalid_edit_unregisters_previous_version() {
        let dir = layout();
        let root = dir.path().join("workflows");
        let mut discovery = WorkflowDiscovery::new(&root, resources(dir.path()));
        let mut registry = WorkflowRegistry::new();
        discovery.discover(&mut registry).unwrap();

        let path = root.join("crm/customers.yml");
        fs::write(&path, "name: [unclosed").unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let report = discovery.discover(&mut registry).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.removed, vec!["crm.customers"]);
        assert_eq!(registry.ids(), vec!["default.adhoc", "health.glucose"]);

        // unchanged invalid file is not reported twice
        let again = discovery.discover(&mut registry).unwrap();
        assert!(again.removed.is_empty());
        assert!(again.errors.is_empty());
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let discovery = WorkflowDiscovery::new(dir.path().join("nope"), resources(dir.path()));
        let err = discovery.scan().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WarehouseError>(),
            Some(WarehouseError::Discovery(_))
        ));
    }
}
